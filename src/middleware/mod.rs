//! Built-in steps.
//!
//! Each function here returns a ready [`Step`](crate::Step). All of them are
//! plain steps, so they keep running after an early response:
//!
//! - [`cookies::parse`] / [`cookies::serialize`] - request and response
//!   cookies; every [`Stack`](crate::Stack) installs both around its chain.
//! - [`cors`] - CORS response headers from a [`CorsConfig`].
//! - [`helmet`] - a fixed set of security headers.
//! - [`validate::request`] / [`validate::response`] - JSON Schema checks.

pub mod cookies;
pub mod validate;

mod cors;
mod helmet;

pub use cors::{CorsConfig, cors};
pub use helmet::helmet;
