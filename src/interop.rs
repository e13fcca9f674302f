//! Conversions to and from the `http` crate types, for driving a stack from
//! any `http`-based host (a local dev server, a test harness).

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, HeaderName, HeaderValue};
use http_body_util::Full;
use tracing::warn;

use crate::event::Event;
use crate::response::ProxyResponse;

impl Event {
    /// Builds an event from an `http` request.
    ///
    /// Repeated headers and query parameters keep their last value in the
    /// single-value maps and every value in the multi-value ones. Header
    /// values that are not visible ASCII are dropped. A body that is not
    /// UTF-8 is base64-encoded. The request's extensions carry over.
    pub fn from_http(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();

        let mut headers = BTreeMap::new();
        let mut multi_value_headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in &parts.headers {
            let Ok(value) = value.to_str() else {
                warn!(header = %name, "dropping non-ASCII header value");
                continue;
            };
            headers.insert(name.as_str().to_owned(), value.to_owned());
            multi_value_headers.entry(name.as_str().to_owned()).or_default().push(value.to_owned());
        }

        let mut query = BTreeMap::new();
        let mut multi_value_query: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in form_urlencoded::parse(parts.uri.query().unwrap_or_default().as_bytes()) {
            query.insert(key.to_string(), value.to_string());
            multi_value_query.entry(key.into_owned()).or_default().push(value.into_owned());
        }

        let (body, is_base64_encoded) = match body {
            b if b.is_empty() => (None, false),
            b => match String::from_utf8(b.to_vec()) {
                Ok(text) => (Some(text), false),
                Err(e) => (Some(STANDARD.encode(e.as_bytes())), true),
            },
        };

        Self {
            http_method: parts.method.as_str().to_owned(),
            path: parts.uri.path().to_owned(),
            headers,
            multi_value_headers,
            query_string_parameters: query,
            multi_value_query_string_parameters: multi_value_query,
            body,
            is_base64_encoded,
            extensions: parts.extensions,
            ..Self::default()
        }
    }
}

impl ProxyResponse {
    /// Converts into an `http` response.
    ///
    /// Multi-value headers are appended after the single-value ones. Invalid
    /// header names or values are skipped with a warning, an out-of-range
    /// status becomes `500`, and a base64 body is decoded (sent as-is if it
    /// does not decode) with `content-length` recounted over the decoded bytes.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        let decoded = self.is_base64_encoded;
        let body = if decoded {
            STANDARD.decode(&self.body).map(Bytes::from).unwrap_or_else(|e| {
                warn!(error = %e, "response body is flagged base64 but does not decode");
                Bytes::from(self.body.clone())
            })
        } else {
            Bytes::from(self.body)
        };

        let body_len = body.len();
        let mut response = http::Response::new(Full::new(body));
        *response.status_mut() = http::StatusCode::from_u16(self.status_code).unwrap_or_else(|_| {
            warn!(status = self.status_code, "invalid status code, sending 500");
            http::StatusCode::INTERNAL_SERVER_ERROR
        });

        let single = self.headers.into_iter().map(|(k, v)| (k, vec![v]));
        let map = response.headers_mut();
        for (name, values) in single.chain(self.multi_value_headers) {
            let Ok(header) = HeaderName::from_bytes(name.as_bytes()) else {
                warn!(header = %name, "skipping invalid header name");
                continue;
            };
            if decoded && header == CONTENT_LENGTH {
                continue;
            }
            for value in values {
                match HeaderValue::from_str(&value) {
                    Ok(value) => { map.append(header.clone(), value); }
                    Err(_) => warn!(header = %name, "skipping invalid header value"),
                }
            }
        }
        if decoded && body_len > 0 {
            map.insert(CONTENT_LENGTH, HeaderValue::from(body_len));
        }

        response
    }
}
