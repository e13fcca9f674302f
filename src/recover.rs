//! Rendering a captured error into a response.

use serde_json::json;

use crate::error::{Error, Message};
use crate::event::{Context, Event};
use crate::handler::{BoxFuture, Middleware};
use crate::headers::{ACCEPT, Headers};
use crate::response::{Patch, Response};
use crate::status;

/// The built-in first step of every error chain.
///
/// Renders [`Context::error`] with [`handle_error`] and merges the result into
/// the accumulator. It never returns an early response and never fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorHandler;

impl Middleware for ErrorHandler {
    fn call<'a>(
        &'a self,
        event: &'a mut Event,
        context: &'a mut Context,
        response: &'a mut Response,
    ) -> BoxFuture<'a, Result<Option<Patch>, Error>> {
        response.merge(handle_error(event, context));
        Box::pin(async { Ok(None) })
    }

    fn name(&self) -> &'static str {
        "error_handler"
    }
}

/// Builds the error response fragment for `context.error`.
///
/// An [`HttpError`](crate::HttpError) supplies status, message, expose flag
/// and headers. Anything else is a 500 whose text stays internal. A hidden
/// or empty message is replaced by the status reason phrase.
///
/// The `accept` header picks the format:
///
/// | `accept` contains | fragment |
/// |---|---|
/// | `json` | `json: {"detail": message}`, or the structured message itself |
/// | `html` | `html: <h1>message</h1>` |
/// | otherwise | `body: message` |
pub fn handle_error(event: &Event, context: &Context) -> Patch {
    let (status_code, message, expose, headers) = match &context.error {
        Some(Error::Http(e)) => (e.status_code(), e.message().clone(), e.exposed(), e.headers().clone()),
        Some(Error::Internal(e)) => (500, Message::Text(e.to_string()), false, Headers::new()),
        None => (500, Message::default(), false, Headers::new()),
    };

    let message = if !expose || message.is_empty() {
        Message::Text(status::reason(status_code).to_owned())
    } else {
        message
    };

    let accept = event.header(ACCEPT).unwrap_or_default().to_ascii_lowercase();

    let mut patch = Patch::new().status(status_code);
    patch.headers = headers;

    if accept.contains("json") {
        patch.json = Some(match message {
            Message::Structured(value) => value,
            Message::Text(text) => json!({ "detail": text }),
        });
    } else if accept.contains("html") {
        patch.html = Some(format!("<h1>{}</h1>", escape_html(&message.to_string())));
    } else {
        patch.body = Some(message.to_string());
    }

    patch
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
