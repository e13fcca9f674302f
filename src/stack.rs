//! The entry point: one [`Stack`] per function, one [`Stack::run`] per
//! invocation.

use std::sync::Arc;

use tracing::{error, warn};

use crate::chain::{Step, process_handlers};
use crate::event::{Context, Event};
use crate::middleware::cookies;
use crate::recover::ErrorHandler;
use crate::response::{Patch, ProxyResponse, Response};
use crate::status;

/// A main chain plus an error chain.
///
/// Build it once at cold start and share it: cloning is cheap and every
/// step is `Send + Sync`.
///
/// ```rust
/// use lambstack::{Context, Event, HttpError, Stack, Step};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let stack = Stack::new(vec![
///     Step::from_fn(|ev, _, _| match ev.header("x-api-key") {
///         Some(_) => Ok(()),
///         None => Err(HttpError::new(401).into()),
///     }),
/// ]);
///
/// let out = stack.run(Event::new("GET", "/"), Context::default()).await;
/// assert_eq!(out.status_code, 401);
/// assert_eq!(out.body, "Unauthorized");
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Stack {
    main: Arc<[Step]>,
    recovery: Arc<[Step]>,
    last_resort: Arc<[Step]>,
}

impl Stack {
    /// A stack running `steps`, bracketed by cookie parsing and cookie
    /// serialization.
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        let main = std::iter::once(cookies::parse())
            .chain(steps)
            .chain(std::iter::once(cookies::serialize()))
            .collect();

        Self {
            main,
            recovery: Self::error_chain(Vec::new()),
            last_resort: Arc::new([Step::plain(ErrorHandler)]),
        }
    }

    /// Steps to run after the built-in error handler when the main chain
    /// fails. They see the captured error in [`Context::error`].
    pub fn on_error(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.recovery = Self::error_chain(steps);
        self
    }

    fn error_chain(steps: impl IntoIterator<Item = Step>) -> Arc<[Step]> {
        std::iter::once(Step::plain(ErrorHandler))
            .chain(steps)
            .chain(std::iter::once(cookies::serialize()))
            .collect()
    }

    /// Handles one invocation. Always produces a response.
    ///
    /// A failure in the main chain is recorded in [`Context::error`] and the
    /// error chain runs on a fresh response. Should that fail too, only the
    /// error handler runs, and if even that fails a bare `500` is returned.
    pub async fn run(&self, event: Event, mut context: Context) -> ProxyResponse {
        let mut event = event.normalized();

        let err = match process_handlers(&mut event, &mut context, &self.main).await {
            Ok(out) => return out,
            Err(err) => err,
        };
        warn!(
            request_id = %context.request_id,
            status = err.status_code(),
            error = %err,
            "main chain failed, running error chain"
        );
        context.error = Some(err);

        let err = match process_handlers(&mut event, &mut context, &self.recovery).await {
            Ok(out) => return out,
            Err(err) => err,
        };
        error!(
            request_id = %context.request_id,
            error = %err,
            "error chain failed, falling back to the default error handler"
        );
        context.error = Some(err);

        match process_handlers(&mut event, &mut context, &self.last_resort).await {
            Ok(out) => out,
            Err(err) => {
                error!(request_id = %context.request_id, error = %err, "default error handler failed");
                internal_server_error()
            }
        }
    }
}

fn internal_server_error() -> ProxyResponse {
    Response::from_patch(Patch::new().status(500).body(status::reason(500))).serialize()
}
