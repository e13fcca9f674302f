//! Header names and case folding.
//!
//! Every header map that passes through the stack is folded to lower-case
//! keys, the way HTTP/2 puts them on the wire. Lookups downstream can then
//! compare names with a plain `==`.

use std::collections::BTreeMap;

/// Single-value header map, as delivered and returned by the host.
pub type Headers = BTreeMap<String, String>;

/// Multi-value header map. Used for headers that repeat, such as `set-cookie`.
pub type MultiValueHeaders = BTreeMap<String, Vec<String>>;

// ── Common ────────────────────────────────────────────────────────────────────

pub const ACCEPT: &str = "accept";
pub const ALLOW: &str = "allow";
pub const CACHE_CONTROL: &str = "cache-control";
pub const CONTENT_LENGTH: &str = "content-length";
pub const CONTENT_TYPE: &str = "content-type";
pub const COOKIE: &str = "cookie";
pub const LOCATION: &str = "location";
pub const ORIGIN: &str = "origin";
pub const SET_COOKIE: &str = "set-cookie";
pub const VARY: &str = "vary";

// ── CORS ──────────────────────────────────────────────────────────────────────

pub const ACCESS_CONTROL_ALLOW_CREDENTIALS: &str = "access-control-allow-credentials";
pub const ACCESS_CONTROL_ALLOW_HEADERS: &str = "access-control-allow-headers";
pub const ACCESS_CONTROL_ALLOW_METHODS: &str = "access-control-allow-methods";
pub const ACCESS_CONTROL_ALLOW_ORIGIN: &str = "access-control-allow-origin";
pub const ACCESS_CONTROL_EXPOSE_HEADERS: &str = "access-control-expose-headers";
pub const ACCESS_CONTROL_REQUEST_HEADERS: &str = "access-control-request-headers";
pub const ACCESS_CONTROL_REQUEST_METHODS: &str = "access-control-request-methods";
pub const ACCESS_CONTROL_MAX_AGE: &str = "access-control-max-age";

// ── Security ──────────────────────────────────────────────────────────────────

pub const X_DNS_PREFETCH_CONTROL: &str = "x-dns-prefetch-control";
pub const X_FRAME_OPTIONS: &str = "x-frame-options";
pub const X_DOWNLOAD_OPTIONS: &str = "x-download-options";
pub const X_CONTENT_TYPE_OPTIONS: &str = "x-content-type-options";
pub const X_XSS_PROTECTION: &str = "x-xss-protection";
pub const STRICT_TRANSPORT_SECURITY: &str = "strict-transport-security";

/// Returns a copy of `headers` with every key lower-cased.
///
/// Values are untouched and header names are not validated. Generic over the
/// value type so the same function folds both [`Headers`] and
/// [`MultiValueHeaders`].
///
/// If two keys collide after folding (`Host` and `host`), the raw-cased one
/// wins. Maps are folded after every write, so a raw-cased key is always
/// newer than its lower-case twin.
pub fn normalize<V>(headers: BTreeMap<String, V>) -> BTreeMap<String, V> {
    let (raw, mut folded): (BTreeMap<_, _>, BTreeMap<_, _>) = headers
        .into_iter()
        .partition(|(name, _)| name.bytes().any(|b| b.is_ascii_uppercase()));

    for (name, value) in raw {
        folded.insert(name.to_ascii_lowercase(), value);
    }
    folded
}

/// `true` if every key in `headers` is already lower-case.
pub(crate) fn is_normalized<V>(headers: &BTreeMap<String, V>) -> bool {
    headers.keys().all(|k| !k.bytes().any(|b| b.is_ascii_uppercase()))
}
