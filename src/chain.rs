//! Chain steps and the runner that threads one accumulator through them.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::debug;

use crate::error::Error;
use crate::event::{Context, Event};
use crate::handler::{BoxedMiddleware, FnMiddleware, Middleware};
use crate::response::{IntoPatch, ProxyResponse, Response};

/// One entry of a chain.
///
/// The variant is fixed when the chain is built. A [`Step::Dispatch`] is
/// skipped once an earlier step has returned an early response; a
/// [`Step::Plain`] always runs, so cross-cutting steps (security headers,
/// cookies) still apply after a short-circuit.
#[derive(Clone)]
pub enum Step {
    Plain(BoxedMiddleware),
    Dispatch(BoxedMiddleware),
}

impl Step {
    pub fn plain(middleware: impl Middleware) -> Self {
        Self::Plain(Arc::new(middleware))
    }

    pub fn dispatch(middleware: impl Middleware) -> Self {
        Self::Dispatch(Arc::new(middleware))
    }

    /// A plain step from a synchronous closure.
    ///
    /// ```rust
    /// use lambstack::{Patch, Step};
    ///
    /// // mutation only
    /// Step::from_fn(|_, _, res| {
    ///     res.set_header("x-powered-by", "lambstack");
    ///     Ok(())
    /// });
    ///
    /// // early response
    /// Step::from_fn(|ev, _, _| {
    ///     Ok(ev.header("authorization").is_none().then(|| Patch::new().status(401)))
    /// });
    /// ```
    pub fn from_fn<F, R>(f: F) -> Self
    where
        F: Fn(&mut Event, &mut Context, &mut Response) -> Result<R, Error> + Send + Sync + 'static,
        R: IntoPatch + 'static,
    {
        Self::plain(FnMiddleware::new(f))
    }

    pub fn is_dispatch(&self) -> bool {
        matches!(self, Self::Dispatch(_))
    }

    pub fn name(&self) -> &'static str {
        self.middleware().name()
    }

    fn middleware(&self) -> &dyn Middleware {
        match self {
            Self::Plain(m) | Self::Dispatch(m) => m.as_ref(),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_dispatch() { "Dispatch" } else { "Plain" };
        f.debug_tuple(kind).field(&self.name()).finish()
    }
}

/// Runs `steps` in order against a fresh accumulator and serializes it.
///
/// A step that returns a non-empty patch has it merged and marks the chain
/// as answered; from then on [`Step::Dispatch`] entries are skipped while
/// plain ones keep running. Header names are re-folded after every step.
///
/// The first error, or panic, aborts the chain and is returned.
pub async fn process_handlers(
    event: &mut Event,
    context: &mut Context,
    steps: &[Step],
) -> Result<ProxyResponse, Error> {
    let mut response = Response::default();
    let mut answered = false;

    for (index, step) in steps.iter().enumerate() {
        if answered && step.is_dispatch() {
            debug!(step = index, name = step.name(), "skipping dispatch step after early response");
            continue;
        }

        // Synchronous steps do their work inside `call` itself, so the call
        // goes inside the guarded future too.
        let call = async { step.middleware().call(event, context, &mut response).await };
        let patch = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result?,
            Err(panic) => {
                return Err(Error::internal(anyhow::anyhow!(
                    "step `{}` panicked: {}",
                    step.name(),
                    panic_message(panic.as_ref()),
                )));
            }
        };

        if let Some(patch) = patch.filter(|p| !p.is_empty()) {
            debug!(step = index, name = step.name(), "early response");
            response.merge(patch);
            answered = true;
        }

        response.normalize();
    }

    Ok(response.serialize())
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::error::HttpError;
    use crate::headers::CONTENT_TYPE;
    use crate::response::Patch;

    async fn run(steps: &[Step]) -> Result<ProxyResponse, Error> {
        let mut event = Event::new("GET", "/").normalized();
        let mut context = Context::default();
        process_handlers(&mut event, &mut context, steps).await
    }

    fn counting(counter: &Arc<AtomicUsize>) -> Step {
        let counter = Arc::clone(counter);
        Step::dispatch(FnMiddleware::new(move |_: &mut Event, _: &mut Context, _: &mut Response| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Patch::new().status(201))
        }))
    }

    #[tokio::test]
    async fn mutations_are_shared_between_steps() {
        let out = run(&[
            Step::from_fn(|ev, _, _| {
                ev.extensions.insert(true);
                Ok(())
            }),
            Step::from_fn(|ev, _, res| {
                res.json = Some(json!({ "auth": ev.extensions.get::<bool>().copied() }));
                Ok(())
            }),
        ])
        .await
        .unwrap();

        assert_eq!(out.status_code, 200);
        assert_eq!(serde_json::from_str::<serde_json::Value>(&out.body).unwrap(), json!({ "auth": true }));
    }

    #[tokio::test]
    async fn later_writes_win() {
        let out = run(&[
            Step::from_fn(|_, _, res| {
                res.status_code = 302;
                Ok(())
            }),
            Step::from_fn(|_, _, res| {
                res.status_code = 201;
                Ok(())
            }),
        ])
        .await
        .unwrap();
        assert_eq!(out.status_code, 201);
    }

    #[tokio::test]
    async fn plain_steps_run_after_early_response() {
        let out = run(&[
            Step::from_fn(|_, _, res| {
                res.headers.insert("Host".into(), "foo".into());
                Ok(())
            }),
            Step::from_fn(|_, _, _| Ok(Patch::new().status(302))),
            Step::from_fn(|_, _, res| {
                res.status_code = 201;
                Ok(())
            }),
        ])
        .await
        .unwrap();

        assert_eq!(out.status_code, 201);
        assert_eq!(out.header("host"), Some("foo"));
    }

    #[tokio::test]
    async fn dispatch_steps_are_skipped_after_early_response() {
        let calls = Arc::new(AtomicUsize::new(0));
        let out = run(&[
            Step::from_fn(|_, _, _| Ok(Patch::new().status(302))),
            counting(&calls),
            Step::from_fn(|_, _, res| {
                res.set_header("x-test", "foo");
                Ok(())
            }),
        ])
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(out.status_code, 302);
        assert_eq!(out.header("x-test"), Some("foo"));
    }

    #[tokio::test]
    async fn dispatch_steps_run_without_early_response() {
        let calls = Arc::new(AtomicUsize::new(0));
        let out = run(&[Step::from_fn(|_, _, _| Ok(())), counting(&calls)]).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(out.status_code, 201);
    }

    #[tokio::test]
    async fn empty_patch_is_not_an_early_response() {
        let calls = Arc::new(AtomicUsize::new(0));
        run(&[Step::from_fn(|_, _, _| Ok(Patch::new())), counting(&calls)]).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn headers_are_refolded_after_each_step() {
        let out = run(&[
            Step::from_fn(|_, _, res| {
                res.headers.insert("Content-Type".into(), "json".into());
                Ok(())
            }),
            Step::from_fn(|_, _, res| {
                res.headers.insert("content-type".into(), "html".into());
                Ok(())
            }),
        ])
        .await
        .unwrap();
        assert_eq!(out.header(CONTENT_TYPE), Some("html"));
    }

    #[tokio::test]
    async fn later_raw_cased_write_wins() {
        let out = run(&[
            Step::from_fn(|_, _, res| {
                res.set_header(CONTENT_TYPE, "text/html");
                Ok(())
            }),
            Step::from_fn(|_, _, res| {
                res.headers.insert("Content-Type".into(), "application/json".into());
                Ok(())
            }),
        ])
        .await
        .unwrap();
        assert_eq!(out.header(CONTENT_TYPE), Some("application/json"));
        assert!(!out.headers.contains_key("Content-Type"));
    }

    #[tokio::test]
    async fn errors_abort_the_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = run(&[
            Step::from_fn(|_, _, _| Err::<(), _>(HttpError::new(418).into())),
            counting(&calls),
        ])
        .await
        .unwrap_err();

        assert_eq!(err.status_code(), 418);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panics_become_internal_errors() {
        let err = run(&[Step::from_fn(|_, _, _| -> Result<(), Error> { panic!("kaboom") })])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert!(err.to_string().contains("kaboom"));
    }

    #[test]
    fn debug_shows_kind() {
        let step = Step::from_fn(|_, _, _| Ok(()));
        assert!(format!("{step:?}").starts_with("Plain("));
    }
}
