//! `Cookie` / `Set-Cookie` header codec (RFC 6265).
//!
//! Values are percent-encoded for every byte that may not appear in a
//! cookie-octet, and decoded again on [`parse`], so any string survives the
//! round trip:
//!
//! ```rust
//! use lambstack::cookie::{self, CookieOptions};
//!
//! let line = cookie::serialize("greeting", "hi; there", &CookieOptions::new().secure()).unwrap();
//! assert_eq!(line, "greeting=hi%3B%20there; Secure");
//!
//! let jar = cookie::parse("greeting=hi%3B%20there");
//! assert_eq!(jar["greeting"], "hi; there");
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// Bytes that must be escaped in a cookie value. Non-ASCII is always escaped.
const COOKIE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b',')
    .add(b';')
    .add(b'\\')
    .add(b'%');

/// Separators that may not appear in a cookie name (RFC 2616 token).
const NAME_SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={} \t";

/// The `SameSite` attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax    => "Lax",
            Self::None   => "None",
        }
    }
}

/// Attributes appended to a `Set-Cookie` line.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CookieOptions {
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    /// Lifetime in seconds.
    pub max_age: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl CookieOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}

/// Failure to build a `Set-Cookie` line.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CookieError {
    #[error("invalid cookie name `{0}`")]
    InvalidName(String),

    #[error("invalid cookie {attribute} `{value}`")]
    InvalidAttribute { attribute: &'static str, value: String },
}

/// Parses a `Cookie` request header into name/value pairs.
///
/// Pairs without `=` are ignored. When a name repeats, the first occurrence
/// wins. Surrounding double quotes are stripped and values percent-decoded.
pub fn parse(header: &str) -> BTreeMap<String, String> {
    let mut jar = BTreeMap::new();

    for pair in header.split(';') {
        let Some((name, value)) = pair.split_once('=') else { continue };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }

        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);

        jar.entry(name.to_owned())
            .or_insert_with(|| percent_decode_str(value).decode_utf8_lossy().into_owned());
    }

    jar
}

/// Renders one `Set-Cookie` header line.
pub fn serialize(name: &str, value: &str, options: &CookieOptions) -> Result<String, CookieError> {
    if !is_token(name) {
        return Err(CookieError::InvalidName(name.to_owned()));
    }

    let mut line = format!("{name}={}", utf8_percent_encode(value, COOKIE_VALUE));

    // Writing to a String cannot fail.
    if let Some(max_age) = options.max_age {
        let _ = write!(line, "; Max-Age={max_age}");
    }
    if let Some(domain) = &options.domain {
        check_attribute("domain", domain)?;
        let _ = write!(line, "; Domain={domain}");
    }
    if let Some(path) = &options.path {
        check_attribute("path", path)?;
        let _ = write!(line, "; Path={path}");
    }
    if let Some(expires) = options.expires {
        let _ = write!(line, "; Expires={}", expires.format("%a, %d %b %Y %H:%M:%S GMT"));
    }
    if options.http_only {
        line.push_str("; HttpOnly");
    }
    if options.secure {
        line.push_str("; Secure");
    }
    if let Some(same_site) = options.same_site {
        let _ = write!(line, "; SameSite={}", same_site.as_str());
    }

    Ok(line)
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_graphic() && !NAME_SEPARATORS.contains(&b))
}

fn check_attribute(attribute: &'static str, value: &str) -> Result<(), CookieError> {
    if value.bytes().any(|b| b == b';' || b.is_ascii_control()) {
        return Err(CookieError::InvalidAttribute { attribute, value: value.to_owned() });
    }
    Ok(())
}
