//! JSON Schema validation of request and response bodies.
//!
//! ```rust
//! use lambstack::middleware::validate;
//! use serde_json::json;
//!
//! let step = validate::request(json!({
//!     "type": "object",
//!     "properties": { "foo": { "type": "boolean" } },
//!     "required": ["foo"]
//! }));
//! ```

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::chain::Step;
use crate::error::{Error, HttpError};
use crate::event::{Context, Event};
use crate::handler::{BoxFuture, Middleware};
use crate::response::{Patch, Response};

/// Validates the request body.
///
/// | request | error |
/// |---|---|
/// | no body, or an empty one | `422 Request body was empty.` |
/// | body is not JSON | `400 The request body was malformed.` |
/// | schema mismatch | `400` with the validation messages |
///
/// The body is taken from [`Event::json`] when the normalizer already parsed
/// it, otherwise parsed here regardless of `content-type`.
pub fn request(schema: Value) -> Step {
    Step::plain(Validate { schema: Compiled::new(schema), target: Target::Request })
}

/// Validates the accumulator's `json` body against `schema`.
///
/// Fails with `422 Response body was empty.` when no `json` body is set, and
/// `400` on a schema mismatch.
pub fn response(schema: Value) -> Step {
    Step::plain(Validate { schema: Compiled::new(schema), target: Target::Response })
}

/// A schema compiled once, or the reason it could not be.
struct Compiled(Result<JSONSchema, String>);

impl Compiled {
    fn new(schema: Value) -> Self {
        Self(JSONSchema::compile(&schema).map_err(|e| e.to_string()))
    }

    fn check(&self, instance: &Value) -> Result<(), Error> {
        let schema = self.0.as_ref()
            .map_err(|e| Error::internal(anyhow::anyhow!("invalid JSON schema: {e}")))?;

        if let Err(errors) = schema.validate(instance) {
            let message = errors.map(|e| e.to_string()).collect::<Vec<_>>().join(", ");
            return Err(HttpError::bad_request(message).into());
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Target {
    Request,
    Response,
}

struct Validate {
    schema: Compiled,
    target: Target,
}

impl Validate {
    fn check(&self, event: &Event, response: &Response) -> Result<(), Error> {
        match self.target {
            Target::Request => {
                if let Some(json) = &event.json {
                    return self.schema.check(json);
                }
                let Some(body) = event.body.as_deref().filter(|b| !b.is_empty()) else {
                    return Err(HttpError::unprocessable("Request body was empty.").into());
                };
                let parsed: Value = serde_json::from_str(body)
                    .map_err(|_| HttpError::bad_request("The request body was malformed."))?;
                self.schema.check(&parsed)
            }
            Target::Response => match &response.json {
                Some(json) => self.schema.check(json),
                None => Err(HttpError::unprocessable("Response body was empty.").into()),
            },
        }
    }
}

impl Middleware for Validate {
    fn call<'a>(
        &'a self,
        event: &'a mut Event,
        _context: &'a mut Context,
        response: &'a mut Response,
    ) -> BoxFuture<'a, Result<Option<Patch>, Error>> {
        let out = self.check(event, response).map(|()| None);
        Box::pin(async move { out })
    }

    fn name(&self) -> &'static str {
        match self.target {
            Target::Request => "validate::request",
            Target::Response => "validate::response",
        }
    }
}
