//! CORS response headers.

use serde::{Deserialize, Deserializer};

use crate::chain::Step;
use crate::error::Error;
use crate::event::{Context, Event};
use crate::handler::{BoxFuture, Middleware};
use crate::headers::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
    ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHODS, CACHE_CONTROL, ORIGIN, VARY,
};
use crate::method::Method;
use crate::response::{Patch, Response};

/// CORS settings. Every field is optional; unset fields add no header.
///
/// Deserializes from camelCase keys, and list fields accept a single string:
///
/// ```rust
/// use lambstack::middleware::CorsConfig;
///
/// let config: CorsConfig = serde_json::from_str(r#"{
///     "allowOrigin": "https://app.example.com",
///     "allowMethods": ["GET", "POST"],
///     "maxAge": 600
/// }"#).unwrap();
///
/// assert_eq!(config.allow_origin, ["https://app.example.com"]);
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CorsConfig {
    /// Allowed origins. A leading `*` allows any origin.
    #[serde(deserialize_with = "one_or_many")]
    pub allow_origin: Vec<String>,
    pub allow_credentials: bool,
    #[serde(deserialize_with = "one_or_many")]
    pub allow_headers: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub allow_methods: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub expose_headers: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub request_headers: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub request_methods: Vec<String>,
    /// Seconds.
    pub max_age: Option<u64>,
    /// `cache-control` for preflight (`OPTIONS`) responses.
    pub cache_control: Option<String>,
}

impl CorsConfig {
    /// The origin to echo back for a request from `origin`.
    ///
    /// The request origin when the list starts with `*` or contains it,
    /// otherwise the first configured origin. `None` when nothing is
    /// configured.
    fn resolve_origin<'a>(&'a self, origin: &'a str) -> Option<&'a str> {
        let first = self.allow_origin.first()?;
        if first == "*" || self.allow_origin.iter().any(|o| o == origin) {
            Some(origin)
        } else {
            Some(first)
        }
    }
}

/// A step that sets CORS headers according to `config`.
pub fn cors(config: CorsConfig) -> Step {
    Step::plain(Cors { config })
}

struct Cors {
    config: CorsConfig,
}

impl Middleware for Cors {
    fn call<'a>(
        &'a self,
        event: &'a mut Event,
        _context: &'a mut Context,
        response: &'a mut Response,
    ) -> BoxFuture<'a, Result<Option<Patch>, Error>> {
        let c = &self.config;

        if c.allow_credentials {
            response.set_header(ACCESS_CONTROL_ALLOW_CREDENTIALS, "true");
        }
        set_list(response, ACCESS_CONTROL_ALLOW_HEADERS, &c.allow_headers);
        set_list(response, ACCESS_CONTROL_ALLOW_METHODS, &c.allow_methods);

        if let Some(origin) = event.header(ORIGIN).and_then(|o| c.resolve_origin(o)) {
            response.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }
        if response.header(ACCESS_CONTROL_ALLOW_ORIGIN) != Some("*") {
            response.set_header(VARY, "Origin");
        }

        set_list(response, ACCESS_CONTROL_EXPOSE_HEADERS, &c.expose_headers);
        set_list(response, ACCESS_CONTROL_REQUEST_HEADERS, &c.request_headers);
        set_list(response, ACCESS_CONTROL_REQUEST_METHODS, &c.request_methods);

        if let Some(max_age) = c.max_age.filter(|&secs| secs > 0) {
            response.set_header(ACCESS_CONTROL_MAX_AGE, max_age.to_string());
        }

        let preflight = event.http_method.parse::<Method>() == Ok(Method::Options);
        if let (true, Some(cache_control)) = (preflight, &c.cache_control) {
            if response.header(CACHE_CONTROL).is_none() {
                response.set_header(CACHE_CONTROL, cache_control.as_str());
            }
        }

        Box::pin(async { Ok(None) })
    }

    fn name(&self) -> &'static str {
        "cors"
    }
}

fn set_list(response: &mut Response, name: &str, values: &[String]) {
    if !values.is_empty() {
        response.set_header(name, values.join(", "));
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
        None => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn apply(config: CorsConfig, event: Event) -> Response {
        let mut event = event.normalized();
        let mut response = Response::default();
        Cors { config }
            .call(&mut event, &mut Context::default(), &mut response)
            .await
            .unwrap();
        response
    }

    fn from_origin(origin: &str) -> Event {
        Event::new("GET", "/").with_header("Origin", origin)
    }

    fn origins(list: &[&str]) -> CorsConfig {
        CorsConfig {
            allow_origin: list.iter().map(|s| s.to_string()).collect(),
            ..CorsConfig::default()
        }
    }

    #[tokio::test]
    async fn nothing_configured() {
        let res = apply(CorsConfig::default(), from_origin("foo")).await;
        assert_eq!(res.header(ACCESS_CONTROL_ALLOW_ORIGIN), None);
        assert_eq!(res.header(VARY), Some("Origin"));
    }

    #[tokio::test]
    async fn allow_origin_resolution() {
        let cases: &[(&[&str], &str)] = &[
            (&["foo"], "foo"),
            (&["foo", "bar"], "foo"),
            (&["bar"], "bar"),
            (&["*"], "foo"),
        ];
        for (list, expected) in cases {
            let res = apply(origins(list), from_origin("foo")).await;
            assert_eq!(res.header(ACCESS_CONTROL_ALLOW_ORIGIN), Some(*expected), "list {list:?}");
        }
    }

    #[tokio::test]
    async fn no_request_origin_no_allow_origin() {
        let res = apply(origins(&["foo"]), Event::new("GET", "/")).await;
        assert_eq!(res.header(ACCESS_CONTROL_ALLOW_ORIGIN), None);
    }

    #[tokio::test]
    async fn simple_headers() {
        let config = CorsConfig {
            allow_credentials: true,
            allow_headers: vec!["foo".into()],
            allow_methods: vec!["GET".into(), "POST".into()],
            expose_headers: vec!["x-a".into()],
            request_headers: vec!["x-b".into()],
            request_methods: vec!["PUT".into()],
            max_age: Some(600),
            ..CorsConfig::default()
        };
        let res = apply(config, Event::new("GET", "/")).await;

        assert_eq!(res.header(ACCESS_CONTROL_ALLOW_CREDENTIALS), Some("true"));
        assert_eq!(res.header(ACCESS_CONTROL_ALLOW_HEADERS), Some("foo"));
        assert_eq!(res.header(ACCESS_CONTROL_ALLOW_METHODS), Some("GET, POST"));
        assert_eq!(res.header(ACCESS_CONTROL_EXPOSE_HEADERS), Some("x-a"));
        assert_eq!(res.header(ACCESS_CONTROL_REQUEST_HEADERS), Some("x-b"));
        assert_eq!(res.header(ACCESS_CONTROL_REQUEST_METHODS), Some("PUT"));
        assert_eq!(res.header(ACCESS_CONTROL_MAX_AGE), Some("600"));
    }

    #[tokio::test]
    async fn zero_max_age_is_omitted() {
        let config = CorsConfig { max_age: Some(0), ..CorsConfig::default() };
        let res = apply(config, Event::new("GET", "/")).await;
        assert_eq!(res.header(ACCESS_CONTROL_MAX_AGE), None);
    }

    #[tokio::test]
    async fn cache_control_only_on_preflight() {
        let config = CorsConfig { cache_control: Some("foo".into()), ..CorsConfig::default() };

        let get = apply(config.clone(), Event::new("GET", "/")).await;
        assert_eq!(get.header(CACHE_CONTROL), None);

        let options = apply(config, Event::new("options", "/")).await;
        assert_eq!(options.header(CACHE_CONTROL), Some("foo"));
    }

    #[test]
    fn deserializes_strings_and_lists() {
        let config: CorsConfig = serde_json::from_str(
            r#"{ "allowOrigin": ["a", "b"], "allowHeaders": "x-foo", "allowCredentials": true }"#,
        )
        .unwrap();
        assert_eq!(config.allow_origin, ["a", "b"]);
        assert_eq!(config.allow_headers, ["x-foo"]);
        assert!(config.allow_credentials);
        assert_eq!(config.max_age, None);
    }
}
