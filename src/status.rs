//! Status code helpers.
//!
//! Status codes travel as plain `u16` because that is what the host puts on
//! the wire. Use [`http::StatusCode::as_u16`] for the named constants:
//!
//! ```rust
//! use lambstack::{Patch, StatusCode};
//!
//! Patch::new().status(StatusCode::CREATED.as_u16());
//! Patch::new().status(201);
//! ```

use http::StatusCode;

/// Canonical reason phrase for `code`, e.g. `"Internal Server Error"` for 500.
///
/// Unregistered codes yield `"Unknown Error"` so an error body is never empty.
pub fn reason(code: u16) -> &'static str {
    StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown Error")
}
