//! The response accumulator, the [`Patch`] fragments merged into it, and the
//! wire-ready [`ProxyResponse`] it serializes to.
//!
//! Every step of a chain sees the same [`Response`]. A step may write to it
//! directly, return a [`Patch`] to be merged, or both. Once the chain is done,
//! [`Response::serialize`] collapses the body shorthands into one string and
//! fills in `content-type` and `content-length`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cookie::CookieOptions;
use crate::headers::{self, CONTENT_LENGTH, CONTENT_TYPE, Headers, LOCATION, MultiValueHeaders};

// ── ContentType ───────────────────────────────────────────────────────────────

/// Content types inferred from the body shorthands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Html,  // text/html; charset=utf-8
    Json,  // application/json; charset=utf-8
    Text,  // text/plain; charset=utf-8
    Xml,   // application/xml; charset=utf-8
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "text/html; charset=utf-8",
            Self::Json => "application/json; charset=utf-8",
            Self::Text => "text/plain; charset=utf-8",
            Self::Xml  => "application/xml; charset=utf-8",
        }
    }
}

/// Which field the serialized body came from, in precedence order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum BodyKind {
    Literal,
    Html,
    Json,
    Xml,
    Empty,
}

impl BodyKind {
    fn content_type(self) -> ContentType {
        match self {
            Self::Html => ContentType::Html,
            Self::Json => ContentType::Json,
            Self::Xml => ContentType::Xml,
            Self::Literal | Self::Empty => ContentType::Text,
        }
    }
}

// ── Cookies ───────────────────────────────────────────────────────────────────

/// A cookie waiting to be rendered into `set-cookie` by the cookie
/// serialization step. String values are sent verbatim, anything else as JSON.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingCookie {
    pub value: Value,
    pub options: CookieOptions,
}

// ── Response ──────────────────────────────────────────────────────────────────

/// The accumulator threaded through one chain execution.
///
/// At most one body field ends up on the wire. Precedence is literal
/// [`body`](Self::body), then [`html`](Self::html), [`json`](Self::json),
/// [`xml`](Self::xml). Presence decides, not content: `html: Some("")` beats
/// a `json` value and produces an empty body.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status_code: u16,
    pub headers: Headers,
    pub multi_value_headers: MultiValueHeaders,
    pub body: Option<String>,
    pub html: Option<String>,
    pub json: Option<Value>,
    pub xml: Option<String>,
    pub is_base64_encoded: bool,
    pub cookies: BTreeMap<String, PendingCookie>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status_code: 200,
            headers: Headers::new(),
            multi_value_headers: MultiValueHeaders::new(),
            body: None,
            html: None,
            json: None,
            xml: None,
            is_base64_encoded: false,
            cookies: BTreeMap::new(),
        }
    }
}

impl Response {
    /// A default response with `patch` applied.
    pub fn from_patch(patch: Patch) -> Self {
        let mut res = Self::default();
        res.merge(patch);
        res
    }

    /// Folds header names to lower case. Idempotent.
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    pub(crate) fn normalize(&mut self) {
        if !headers::is_normalized(&self.headers) {
            self.headers = headers::normalize(std::mem::take(&mut self.headers));
        }
        if !headers::is_normalized(&self.multi_value_headers) {
            self.multi_value_headers = headers::normalize(std::mem::take(&mut self.multi_value_headers));
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header, folding the name to lower case.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Merges a fragment into the accumulator.
    ///
    /// - status, base64 flag and each body field: the patch wins when set;
    /// - headers and cookies: key-wise union, the patch wins per key;
    /// - multi-value headers: patch values are appended to the existing list
    ///   for that key, skipping values already present verbatim.
    ///
    /// Header names from the patch are folded to lower case on the way in.
    pub fn merge(&mut self, patch: Patch) {
        let Patch {
            status_code,
            headers,
            multi_value_headers,
            body,
            html,
            json,
            xml,
            is_base64_encoded,
            cookies,
        } = patch;

        if let Some(code) = status_code {
            self.status_code = code;
        }
        if let Some(flag) = is_base64_encoded {
            self.is_base64_encoded = flag;
        }
        if body.is_some() {
            self.body = body;
        }
        if html.is_some() {
            self.html = html;
        }
        if json.is_some() {
            self.json = json;
        }
        if xml.is_some() {
            self.xml = xml;
        }

        for (name, value) in headers {
            self.headers.insert(name.to_ascii_lowercase(), value);
        }
        for (name, values) in multi_value_headers {
            let existing = self.multi_value_headers.entry(name.to_ascii_lowercase()).or_default();
            for value in values {
                if !existing.contains(&value) {
                    existing.push(value);
                }
            }
        }
        self.cookies.extend(cookies);
    }

    /// Produces the wire response.
    ///
    /// An explicit `content-type` header is never overridden. Content headers
    /// are only added for a non-empty body; `content-length` counts UTF-8
    /// bytes.
    pub fn serialize(self) -> ProxyResponse {
        let Response {
            status_code,
            mut headers,
            multi_value_headers,
            body,
            html,
            json,
            xml,
            is_base64_encoded,
            ..
        } = self.normalized();

        let (kind, body) = match (body, html, json, xml) {
            (Some(body), ..) => (BodyKind::Literal, body),
            (None, Some(html), ..) => (BodyKind::Html, html),
            (None, None, Some(json), _) => (BodyKind::Json, render_json(json)),
            (None, None, None, Some(xml)) => (BodyKind::Xml, xml),
            (None, None, None, None) => (BodyKind::Empty, String::new()),
        };

        if !body.is_empty() {
            headers
                .entry(CONTENT_TYPE.to_owned())
                .or_insert_with(|| kind.content_type().as_str().to_owned());
            headers.insert(CONTENT_LENGTH.to_owned(), body.len().to_string());
        }

        ProxyResponse { is_base64_encoded, status_code, headers, multi_value_headers, body }
    }
}

/// JSON strings go out as-is; every other value as compact JSON text.
fn render_json(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

// ── Patch ─────────────────────────────────────────────────────────────────────

/// A partial response. Unset fields leave the accumulator alone when merged.
///
/// ```rust
/// use lambstack::Patch;
/// use serde_json::json;
///
/// Patch::new()
///     .status(201)
///     .header("location", "/users/42")
///     .json(json!({ "id": 42 }));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Patch {
    pub status_code: Option<u16>,
    pub headers: Headers,
    pub multi_value_headers: MultiValueHeaders,
    pub body: Option<String>,
    pub html: Option<String>,
    pub json: Option<Value>,
    pub xml: Option<String>,
    pub is_base64_encoded: Option<bool>,
    pub cookies: BTreeMap<String, PendingCookie>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` when merging this patch would change nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn status(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Appends one value to a multi-value header.
    pub fn multi_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.multi_value_headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    /// Literal body, sent as `text/plain` unless a content-type is set.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn json(mut self, json: impl Into<Value>) -> Self {
        self.json = Some(json.into());
        self
    }

    pub fn xml(mut self, xml: impl Into<String>) -> Self {
        self.xml = Some(xml.into());
        self
    }

    pub fn base64(mut self, encoded: bool) -> Self {
        self.is_base64_encoded = Some(encoded);
        self
    }

    /// Queues a cookie for the `set-cookie` header.
    pub fn cookie(mut self, name: &str, value: impl Into<Value>, options: CookieOptions) -> Self {
        self.cookies.insert(name.to_owned(), PendingCookie { value: value.into(), options });
        self
    }

    /// Drops every body field, keeping status and headers.
    pub(crate) fn without_body(mut self) -> Self {
        self.body = None;
        self.html = None;
        self.json = None;
        self.xml = None;
        self
    }
}

/// A redirect: the given status plus a `location` header.
pub fn redirect(code: u16, location: &str) -> Patch {
    Patch::new().status(code).header(LOCATION, location)
}

// ── IntoPatch ─────────────────────────────────────────────────────────────────

/// Conversion of a step's or handler's return value into an optional patch.
///
/// `()` and `None` mean "no early response". Strings become a literal body,
/// JSON values the `json` shorthand.
pub trait IntoPatch {
    fn into_patch(self) -> Option<Patch>;
}

impl IntoPatch for Patch {
    fn into_patch(self) -> Option<Patch> { Some(self) }
}

impl IntoPatch for Option<Patch> {
    fn into_patch(self) -> Option<Patch> { self }
}

impl IntoPatch for () {
    fn into_patch(self) -> Option<Patch> { None }
}

impl IntoPatch for &'static str {
    fn into_patch(self) -> Option<Patch> { Some(Patch::new().body(self)) }
}

impl IntoPatch for String {
    fn into_patch(self) -> Option<Patch> { Some(Patch::new().body(self)) }
}

impl IntoPatch for Value {
    fn into_patch(self) -> Option<Patch> { Some(Patch::new().json(self)) }
}

// ── ProxyResponse ─────────────────────────────────────────────────────────────

/// The wire response handed back to the host.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub is_base64_encoded: bool,
    pub status_code: u16,
    pub headers: Headers,
    pub multi_value_headers: MultiValueHeaders,
    pub body: String,
}

impl ProxyResponse {
    /// Header lookup. Names are already lower-case on a serialized response.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}
