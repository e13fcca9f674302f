//! Security headers.

use crate::chain::Step;
use crate::headers::{
    STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS, X_DNS_PREFETCH_CONTROL, X_DOWNLOAD_OPTIONS,
    X_FRAME_OPTIONS, X_XSS_PROTECTION,
};

const HEADERS: [(&str, &str); 6] = [
    (X_DNS_PREFETCH_CONTROL,    "off"),
    (X_FRAME_OPTIONS,           "sameorigin"),
    (X_DOWNLOAD_OPTIONS,        "noopen"),
    (X_CONTENT_TYPE_OPTIONS,    "nosniff"),
    (X_XSS_PROTECTION,          "1; mode=block"),
    (STRICT_TRANSPORT_SECURITY, "max-age=5184000"),
];

/// A step that sets a fixed set of security headers, overwriting earlier
/// values.
pub fn helmet() -> Step {
    Step::from_fn(|_, _, response| {
        for (name, value) in HEADERS {
            response.set_header(name, value);
        }
        Ok(())
    })
}
