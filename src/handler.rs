//! Middleware and handler traits, and their type erasure.
//!
//! # Two kinds of callable
//!
//! A [`Middleware`] runs as one step of a chain. It sees the event, the
//! context and the shared [`Response`] accumulator, and may return a
//! [`Patch`] to merge into it.
//!
//! A [`Handler`] is what the method dispatcher calls for one HTTP method. It
//! sees only the event and context, and always produces a [`Patch`].
//!
//! # How async steps are stored
//!
//! A chain holds steps of *different* concrete types in one `Vec`, so each is
//! boxed behind `Arc<dyn Middleware>`. The trait method returns a
//! [`BoxFuture`] borrowing the three arguments for its whole lifetime, which
//! is what lets an async step hold `&mut Response` across an `.await`:
//!
//! ```rust
//! use lambstack::{BoxFuture, Context, Error, Event, Middleware, Patch, Response};
//!
//! struct LoadUser;
//!
//! impl Middleware for LoadUser {
//!     fn call<'a>(
//!         &'a self,
//!         event: &'a mut Event,
//!         _context: &'a mut Context,
//!         response: &'a mut Response,
//!     ) -> BoxFuture<'a, Result<Option<Patch>, Error>> {
//!         Box::pin(async move {
//!             let id = event.header("x-user-id").unwrap_or("anonymous").to_owned();
//!             // ... await a lookup here ...
//!             response.set_header("x-user", id);
//!             Ok(None)
//!         })
//!     }
//! }
//! ```
//!
//! Synchronous closures skip the boilerplate: [`Step::from_fn`](crate::Step::from_fn)
//! wraps a closure in [`FnMiddleware`], and the dispatcher's per-method
//! registrations wrap closures in [`FnHandler`]. The only runtime cost per
//! step is one virtual call and one boxed future.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Error;
use crate::event::{Context, Event};
use crate::response::{IntoPatch, Patch, Response};

/// A heap-allocated, type-erased future borrowing for `'a`.
///
/// `Send` so a stack can be driven from a multi-threaded runtime.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ── Middleware ────────────────────────────────────────────────────────────────

/// One step of a chain.
///
/// Return `Ok(Some(patch))` for an early response, `Ok(None)` after mutating
/// the accumulator in place (or doing nothing), and `Err` to abort the chain
/// and hand over to error recovery.
pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        event: &'a mut Event,
        context: &'a mut Context,
        response: &'a mut Response,
    ) -> BoxFuture<'a, Result<Option<Patch>, Error>>;

    /// Name used in log lines.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A shared, type-erased middleware.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Adapts a synchronous closure into a [`Middleware`].
///
/// The closure may return anything [`IntoPatch`]: `()` for mutation-only
/// steps, a [`Patch`] for an early response.
pub struct FnMiddleware<F, R> {
    f: F,
    _returns: PhantomData<fn() -> R>,
}

impl<F, R> FnMiddleware<F, R>
where
    F: Fn(&mut Event, &mut Context, &mut Response) -> Result<R, Error> + Send + Sync + 'static,
    R: IntoPatch + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f, _returns: PhantomData }
    }
}

impl<F, R> Middleware for FnMiddleware<F, R>
where
    F: Fn(&mut Event, &mut Context, &mut Response) -> Result<R, Error> + Send + Sync + 'static,
    R: IntoPatch + 'static,
{
    fn call<'a>(
        &'a self,
        event: &'a mut Event,
        context: &'a mut Context,
        response: &'a mut Response,
    ) -> BoxFuture<'a, Result<Option<Patch>, Error>> {
        let out = (self.f)(event, context, response).map(IntoPatch::into_patch);
        Box::pin(async move { out })
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<F>()
    }
}

// ── Handler ───────────────────────────────────────────────────────────────────

/// A per-method request handler, as registered with the dispatcher.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        event: &'a mut Event,
        context: &'a mut Context,
    ) -> BoxFuture<'a, Result<Patch, Error>>;
}

/// A shared, type-erased handler.
pub type BoxedHandler = Arc<dyn Handler>;

/// Adapts a synchronous closure into a [`Handler`].
///
/// A closure returning `()` or `None` produces an empty patch.
pub struct FnHandler<F, R> {
    f: F,
    _returns: PhantomData<fn() -> R>,
}

impl<F, R> FnHandler<F, R>
where
    F: Fn(&mut Event, &mut Context) -> Result<R, Error> + Send + Sync + 'static,
    R: IntoPatch + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f, _returns: PhantomData }
    }
}

impl<F, R> Handler for FnHandler<F, R>
where
    F: Fn(&mut Event, &mut Context) -> Result<R, Error> + Send + Sync + 'static,
    R: IntoPatch + 'static,
{
    fn call<'a>(
        &'a self,
        event: &'a mut Event,
        context: &'a mut Context,
    ) -> BoxFuture<'a, Result<Patch, Error>> {
        let out = (self.f)(event, context).map(|r| r.into_patch().unwrap_or_default());
        Box::pin(async move { out })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_middleware_maps_unit_to_none() {
        let mw = FnMiddleware::new(|_: &mut Event, _: &mut Context, res: &mut Response| {
            res.status_code = 201;
            Ok(())
        });

        let (mut ev, mut ctx, mut res) = (Event::default(), Context::default(), Response::default());
        let out = mw.call(&mut ev, &mut ctx, &mut res).await.unwrap();
        assert_eq!(out, None);
        assert_eq!(res.status_code, 201);
    }

    #[tokio::test]
    async fn fn_middleware_passes_patches_and_errors() {
        let early = FnMiddleware::new(|_: &mut Event, _: &mut Context, _: &mut Response| {
            Ok(Patch::new().status(302))
        });
        let failing = FnMiddleware::new(|_: &mut Event, _: &mut Context, _: &mut Response| {
            Err::<(), _>(anyhow::anyhow!("nope").into())
        });

        let (mut ev, mut ctx, mut res) = (Event::default(), Context::default(), Response::default());
        let out = early.call(&mut ev, &mut ctx, &mut res).await.unwrap();
        assert_eq!(out, Some(Patch::new().status(302)));
        assert!(failing.call(&mut ev, &mut ctx, &mut res).await.is_err());
    }

    #[test]
    fn closure_steps_have_distinct_names() {
        let a = FnMiddleware::new(|_: &mut Event, _: &mut Context, _: &mut Response| Ok(()));
        let b = FnMiddleware::new(|_: &mut Event, _: &mut Context, _: &mut Response| Ok("b"));
        assert_ne!(a.name(), b.name());
        assert!(a.name().contains("closure"));
    }

    #[tokio::test]
    async fn fn_handler_defaults_to_empty_patch() {
        let h = FnHandler::new(|_: &mut Event, _: &mut Context| Ok(()));
        let (mut ev, mut ctx) = (Event::default(), Context::default());
        assert_eq!(h.call(&mut ev, &mut ctx).await.unwrap(), Patch::default());
    }
}
