//! Unified error type.

use std::fmt;

use serde_json::Value;

use crate::headers::Headers;

/// The error type returned by middleware steps and method handlers.
///
/// Two kinds of failure exist. An [`HttpError`] is intentional: it carries the
/// status, message and headers the client should see. Everything else is
/// [`Error::Internal`]: an unexpected failure that always renders as a bare
/// 500 with no detail.
///
/// Both convert with `?`:
///
/// ```rust
/// use lambstack::{Error, HttpError};
///
/// fn check(token: Option<&str>) -> Result<(), Error> {
///     let token = token.ok_or_else(|| HttpError::new(401))?;
///     let _n: u32 = token.parse().map_err(anyhow::Error::from)?;
///     Ok(())
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A deliberate HTTP failure.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Any other failure. Never shown to the client.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    /// Wraps any error as an internal one.
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }

    /// The status this error renders with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Http(e) => e.status_code,
            Self::Internal(_) => 500,
        }
    }
}

// ── Message ───────────────────────────────────────────────────────────────────

/// Error message: plain text or a structured JSON payload.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Text(String),
    Structured(Value),
}

impl Message {
    /// `true` for an empty string or a JSON `null`.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Structured(v) => v.is_null(),
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Structured(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for Message {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<Value> for Message {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => Self::Text(s),
            other => Self::Structured(other),
        }
    }
}

// ── HttpError ─────────────────────────────────────────────────────────────────

/// An intentional HTTP failure.
///
/// `expose` defaults to `true` for 4xx and `false` for 5xx: server errors show
/// only their reason phrase unless explicitly overridden.
///
/// ```rust
/// use lambstack::HttpError;
///
/// let err = HttpError::new(400)
///     .with_message("missing field `name`")
///     .with_header("x-reason", "validation");
/// assert!(err.exposed());
/// assert!(!HttpError::new(503).exposed());
/// ```
#[derive(Clone, Debug, thiserror::Error)]
#[error("HTTP {status_code}: {message}")]
pub struct HttpError {
    status_code: u16,
    message: Message,
    expose: bool,
    headers: Headers,
}

impl HttpError {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            message: Message::default(),
            expose: status_code < 500,
            headers: Headers::new(),
        }
    }

    /// `400 Bad Request` with a message.
    pub fn bad_request(message: impl Into<Message>) -> Self {
        Self::new(400).with_message(message)
    }

    /// `422 Unprocessable Content` with a message.
    pub fn unprocessable(message: impl Into<Message>) -> Self {
        Self::new(422).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<Message>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_expose(mut self, expose: bool) -> Self {
        self.expose = expose;
        self
    }

    /// Adds a header to the error response. The name is lower-cased.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn status_code(&self) -> u16 { self.status_code }
    pub fn message(&self) -> &Message { &self.message }
    pub fn exposed(&self) -> bool { self.expose }
    pub fn headers(&self) -> &Headers { &self.headers }
}

impl Default for HttpError {
    fn default() -> Self {
        Self::new(500)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn client_errors_are_exposed_by_default() {
        let err = HttpError::new(400);
        assert_eq!(err.status_code(), 400);
        assert!(err.exposed());
        assert!(err.message().is_empty());
        assert!(err.headers().is_empty());
    }

    #[test]
    fn server_errors_are_hidden_by_default() {
        assert!(!HttpError::new(500).exposed());
        assert!(!HttpError::new(500).with_message("foo").exposed());
        assert_eq!(HttpError::default().status_code(), 500);
    }

    #[test]
    fn expose_can_be_overridden() {
        assert!(!HttpError::new(400).with_message("foo").with_expose(false).exposed());
        assert!(HttpError::new(502).with_expose(true).exposed());
    }

    #[test]
    fn structured_messages_are_kept() {
        let err = HttpError::new(400).with_message(json!({ "foo": true }));
        assert_eq!(err.message(), &Message::Structured(json!({ "foo": true })));
    }

    #[test]
    fn header_names_are_folded() {
        let err = HttpError::new(400).with_header("Foo", "bar");
        assert_eq!(err.headers().get("foo").map(String::as_str), Some("bar"));
    }

    #[test]
    fn conversions_pick_the_right_variant() {
        let http: Error = HttpError::new(404).into();
        assert_eq!(http.status_code(), 404);

        let internal: Error = anyhow::anyhow!("boom").into();
        assert_eq!(internal.status_code(), 500);
        assert_eq!(internal.to_string(), "boom");
    }
}
