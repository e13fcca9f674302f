//! Incoming invocation: the request [`Event`] and its [`Context`].

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::headers::{self, CONTENT_TYPE, Headers, MultiValueHeaders};

/// An incoming HTTP request, in the shape the serverless host delivers it.
///
/// Deserializes from the host's camelCase JSON (`httpMethod`,
/// `multiValueHeaders`, `queryStringParameters`, ...). `null` maps are read
/// as empty.
///
/// The last three fields never come from the host. [`json`](Self::json) is
/// filled by [`Event::normalized`], [`cookies`](Self::cookies) by the cookie
/// parsing step, and [`extensions`](Self::extensions) is free for middleware
/// to hand typed values to later steps:
///
/// ```rust
/// use lambstack::Event;
///
/// #[derive(Clone)]
/// struct UserId(u64);
///
/// let mut event = Event::new("GET", "/me");
/// event.extensions.insert(UserId(7));
/// assert_eq!(event.extensions.get::<UserId>().map(|u| u.0), Some(7));
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Event {
    pub http_method: String,
    pub path: String,
    #[serde(deserialize_with = "nullable")]
    pub headers: Headers,
    #[serde(deserialize_with = "nullable")]
    pub multi_value_headers: MultiValueHeaders,
    #[serde(deserialize_with = "nullable")]
    pub query_string_parameters: BTreeMap<String, String>,
    #[serde(deserialize_with = "nullable")]
    pub multi_value_query_string_parameters: BTreeMap<String, Vec<String>>,
    pub body: Option<String>,
    pub is_base64_encoded: bool,

    /// The body parsed as JSON, when the content-type says it is JSON.
    #[serde(skip)]
    pub json: Option<Value>,
    /// Request cookies. Values that held valid JSON objects are parsed.
    #[serde(skip)]
    pub cookies: BTreeMap<String, Value>,
    #[serde(skip)]
    pub extensions: http::Extensions,
}

impl Event {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            http_method: method.to_owned(),
            path: path.to_owned(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_owned(), value.to_owned());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Folds header names to lower case and parses a JSON body.
    ///
    /// The body is parsed only when `content-type` mentions `json`. A body
    /// that fails to parse leaves [`json`](Self::json) unset; it is not an
    /// error. This never fails.
    pub fn normalized(mut self) -> Self {
        self.headers = headers::normalize(std::mem::take(&mut self.headers));
        self.multi_value_headers = headers::normalize(std::mem::take(&mut self.multi_value_headers));

        let is_json = self.headers
            .get(CONTENT_TYPE)
            .is_some_and(|t| t.to_ascii_lowercase().contains("json"));

        if let (true, Some(body)) = (is_json, self.body.as_deref()) {
            match serde_json::from_str(body) {
                Ok(value) => self.json = Some(value),
                Err(e) => debug!(error = %e, "request body is not valid JSON, leaving it raw"),
            }
        }

        self
    }
}

/// Invocation metadata, plus the error being handled during recovery.
///
/// Deserializes from the host's camelCase context object. Only
/// [`error`](Self::error) is written by the stack itself.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Context {
    #[serde(alias = "awsRequestId")]
    pub request_id: String,
    pub function_name: String,
    pub function_version: String,
    #[serde(rename = "memoryLimitInMB")]
    pub memory_limit_in_mb: u32,
    pub invoked_function_arn: String,
    /// Invocation deadline, in milliseconds since the Unix epoch.
    pub deadline_ms: Option<u64>,

    /// The error that sent the stack into recovery.
    #[serde(skip)]
    pub error: Option<Error>,
    #[serde(skip)]
    pub extensions: http::Extensions,
}

impl Context {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self { request_id: request_id.into(), ..Self::default() }
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn normalizes_header_names() {
        let mut event = Event::new("GET", "/").with_header("X-Request-Id", "abc");
        event.multi_value_headers.insert("Accept".into(), vec!["text/html".into()]);

        let event = event.normalized();
        assert_eq!(event.headers.get("x-request-id").map(String::as_str), Some("abc"));
        assert!(event.multi_value_headers.contains_key("accept"));
    }

    #[test]
    fn parses_json_body() {
        let event = Event::new("POST", "/")
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"foo":true}"#)
            .normalized();
        assert_eq!(event.json, Some(json!({ "foo": true })));
    }

    #[test]
    fn malformed_json_is_swallowed() {
        let event = Event::new("POST", "/")
            .with_header("content-type", "application/json")
            .with_body("{nope")
            .normalized();
        assert_eq!(event.json, None);
        assert_eq!(event.body.as_deref(), Some("{nope"));
    }

    #[test]
    fn non_json_content_type_is_not_parsed() {
        let event = Event::new("POST", "/")
            .with_header("content-type", "text/plain")
            .with_body(r#"{"foo":true}"#)
            .normalized();
        assert_eq!(event.json, None);
    }

    #[test]
    fn header_lookup_ignores_case() {
        let event = Event::new("GET", "/").with_header("Accept", "text/html");
        assert_eq!(event.header("accept"), Some("text/html"));
        assert_eq!(event.header("ACCEPT"), Some("text/html"));
        assert_eq!(event.header("origin"), None);
    }

    #[test]
    fn deserializes_host_shape_with_nulls() {
        let event: Event = serde_json::from_value(json!({
            "httpMethod": "GET",
            "path": "/users",
            "headers": { "Host": "example.com" },
            "multiValueHeaders": null,
            "queryStringParameters": null,
            "multiValueQueryStringParameters": { "id": ["1", "2"] },
            "body": null,
            "isBase64Encoded": false,
            "requestContext": {}
        }))
        .unwrap();

        assert_eq!(event.http_method, "GET");
        assert_eq!(event.header("host"), Some("example.com"));
        assert!(event.query_string_parameters.is_empty());
        assert_eq!(event.multi_value_query_string_parameters["id"], vec!["1", "2"]);
        assert_eq!(event.body, None);
    }

    #[test]
    fn deserializes_context() {
        let ctx: Context = serde_json::from_value(json!({
            "awsRequestId": "req-1",
            "functionName": "api",
            "memoryLimitInMB": 128
        }))
        .unwrap();
        assert_eq!(ctx.request_id, "req-1");
        assert_eq!(ctx.function_name, "api");
        assert_eq!(ctx.memory_limit_in_mb, 128);
        assert!(ctx.error.is_none());
    }
}
