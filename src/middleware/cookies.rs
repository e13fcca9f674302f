//! Cookie steps: fill [`Event::cookies`] on the way in, render
//! [`Response::cookies`] into `set-cookie` on the way out.

use serde_json::Value;
use tracing::debug;

use crate::chain::Step;
use crate::cookie;
use crate::error::Error;
use crate::event::{Context, Event};
use crate::handler::{BoxFuture, Middleware};
use crate::headers::{COOKIE, SET_COOKIE};
use crate::response::{Patch, PendingCookie, Response};

/// Parses the `cookie` request header into [`Event::cookies`].
///
/// Values that look like JSON objects are parsed; the rest stay strings.
pub fn parse() -> Step {
    Step::plain(ParseCookies)
}

/// Renders every pending cookie into the `set-cookie` multi-value header and
/// clears the pending set.
///
/// String values are written verbatim, anything else as JSON text. An invalid
/// cookie name or attribute is an internal error.
pub fn serialize() -> Step {
    Step::plain(SerializeCookies)
}

struct ParseCookies;

impl Middleware for ParseCookies {
    fn call<'a>(
        &'a self,
        event: &'a mut Event,
        _context: &'a mut Context,
        _response: &'a mut Response,
    ) -> BoxFuture<'a, Result<Option<Patch>, Error>> {
        let jar = event.header(COOKIE).map(cookie::parse).unwrap_or_default();

        event.cookies = jar
            .into_iter()
            .map(|(name, value)| (name, thaw(value)))
            .collect();

        Box::pin(async { Ok(None) })
    }

    fn name(&self) -> &'static str {
        "cookies::parse"
    }
}

fn thaw(value: String) -> Value {
    if !value.starts_with('{') {
        return Value::String(value);
    }
    match serde_json::from_str(&value) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(error = %e, "cookie looks like JSON but does not parse");
            Value::String(value)
        }
    }
}

struct SerializeCookies;

impl Middleware for SerializeCookies {
    fn call<'a>(
        &'a self,
        _event: &'a mut Event,
        _context: &'a mut Context,
        response: &'a mut Response,
    ) -> BoxFuture<'a, Result<Option<Patch>, Error>> {
        Box::pin(async move {
            let pending = std::mem::take(&mut response.cookies);
            if pending.is_empty() {
                return Ok(None);
            }

            let mut lines = Vec::with_capacity(pending.len());
            for (name, PendingCookie { value, options }) in pending {
                let value = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                lines.push(cookie::serialize(&name, &value, &options).map_err(Error::internal)?);
            }

            let header = response.multi_value_headers.entry(SET_COOKIE.to_owned()).or_default();
            for line in lines {
                if !header.contains(&line) {
                    header.push(line);
                }
            }
            Ok(None)
        })
    }

    fn name(&self) -> &'static str {
        "cookies::serialize"
    }
}
