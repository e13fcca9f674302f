//! Per-method request dispatch.
//!
//! A function answers one resource. [`main`] turns a method table into the
//! chain step that calls the right handler for the request method:
//!
//! ```rust
//! use lambstack::dispatch::{self, Methods, Routes};
//! use lambstack::{Patch, Stack, Step, middleware::helmet};
//! use serde_json::json;
//!
//! let users = Methods::new()
//!     .get(|_, _| Ok(json!([{ "id": 1 }])))
//!     .post(|ev, _| Ok(Patch::new().status(201).json(ev.json.clone().unwrap_or_default())));
//!
//! let stack = Stack::new(vec![helmet(), dispatch::main(Routes::methods(users))]);
//! ```
//!
//! Tables get two methods for free. `OPTIONS` answers `204 No Content` when
//! `GET` or `POST` is registered, and `HEAD` runs the `GET` handler and drops
//! its body. Explicit registrations always take precedence.

use std::sync::Arc;

use tracing::debug;

use crate::chain::Step;
use crate::error::{Error, HttpError};
use crate::event::{Context, Event};
use crate::handler::{BoxFuture, BoxedHandler, FnHandler, Handler, Middleware};
use crate::headers::ALLOW;
use crate::method::Method;
use crate::response::{IntoPatch, Patch, Response};

// ── Methods ───────────────────────────────────────────────────────────────────

/// A method table, in registration order.
///
/// Registering a method twice replaces the first handler but keeps its
/// position.
#[derive(Clone, Default)]
pub struct Methods {
    table: Vec<(Method, BoxedHandler)>,
}

macro_rules! method_fn {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            #[doc = concat!("Registers a synchronous `", stringify!($method), "` handler.")]
            pub fn $name<F, R>(self, f: F) -> Self
            where
                F: Fn(&mut Event, &mut Context) -> Result<R, Error> + Send + Sync + 'static,
                R: IntoPatch + 'static,
            {
                self.on(Method::$method, FnHandler::new(f))
            }
        )*
    };
}

impl Methods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers any [`Handler`], including async ones, for `method`.
    pub fn on(mut self, method: Method, handler: impl Handler) -> Self {
        self.insert(method, Arc::new(handler));
        self
    }

    method_fn! {
        get     => Get,
        post    => Post,
        put     => Put,
        patch   => Patch,
        delete  => Delete,
        options => Options,
        head    => Head,
    }

    pub fn contains(&self, method: Method) -> bool {
        self.table.iter().any(|(m, _)| *m == method)
    }

    /// Registered methods, in order.
    pub fn methods(&self) -> impl Iterator<Item = Method> + '_ {
        self.table.iter().map(|(m, _)| *m)
    }

    fn get_handler(&self, method: Method) -> Option<&BoxedHandler> {
        self.table.iter().find(|(m, _)| *m == method).map(|(_, h)| h)
    }

    fn insert(&mut self, method: Method, handler: BoxedHandler) {
        match self.table.iter_mut().find(|(m, _)| *m == method) {
            Some(slot) => slot.1 = handler,
            None => self.table.push((method, handler)),
        }
    }

    /// Adds the implicit `OPTIONS` and `HEAD` handlers.
    fn with_implicit(mut self) -> Self {
        let serves = self.contains(Method::Get) || self.contains(Method::Post);
        if serves && !self.contains(Method::Options) {
            self.insert(Method::Options, Arc::new(NoContent));
        }

        if !self.contains(Method::Head) {
            if let Some(get) = self.get_handler(Method::Get).cloned() {
                self.insert(Method::Head, Arc::new(Headless(get)));
            }
        }

        self
    }
}

// ── Routes ────────────────────────────────────────────────────────────────────

/// What a dispatcher answers: one handler for `GET`, or a method table.
#[derive(Clone)]
pub enum Routes {
    Single(BoxedHandler),
    Methods(Methods),
}

impl Routes {
    /// A single handler, served for `GET` (and the implicit `HEAD`/`OPTIONS`).
    pub fn single(handler: impl Handler) -> Self {
        Self::Single(Arc::new(handler))
    }

    /// A single synchronous closure, served for `GET`.
    pub fn from_fn<F, R>(f: F) -> Self
    where
        F: Fn(&mut Event, &mut Context) -> Result<R, Error> + Send + Sync + 'static,
        R: IntoPatch + 'static,
    {
        Self::single(FnHandler::new(f))
    }

    pub fn methods(methods: Methods) -> Self {
        Self::Methods(methods)
    }

    fn into_table(self) -> Methods {
        match self {
            Self::Single(handler) => {
                let mut table = Methods::new();
                table.insert(Method::Get, handler);
                table
            }
            Self::Methods(table) => table,
        }
    }
}

impl From<Methods> for Routes {
    fn from(methods: Methods) -> Self {
        Self::Methods(methods)
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// Builds the dispatch step for `routes`.
///
/// On a registered method the handler's patch is merged into the accumulator
/// together with an `allow` header listing every method served. Anything else,
/// unknown method strings included, fails with `405 Method Not Allowed`
/// carrying the same `allow` header.
///
/// The step is a [`Step::Dispatch`]: it does not run once an earlier step has
/// returned an early response.
pub fn main(routes: impl Into<Routes>) -> Step {
    let table = routes.into().into_table().with_implicit();
    let allow = table.methods().map(Method::as_str).collect::<Vec<_>>().join(", ");
    Step::dispatch(Dispatcher { table, allow })
}

struct Dispatcher {
    table: Methods,
    allow: String,
}

impl Middleware for Dispatcher {
    fn call<'a>(
        &'a self,
        event: &'a mut Event,
        context: &'a mut Context,
        response: &'a mut Response,
    ) -> BoxFuture<'a, Result<Option<Patch>, Error>> {
        Box::pin(async move {
            let handler = event.http_method.parse::<Method>()
                .ok()
                .and_then(|m| self.table.get_handler(m));

            let Some(handler) = handler else {
                debug!(method = %event.http_method, allow = %self.allow, "method not allowed");
                let err = HttpError::new(405)
                    .with_message(format!("Method {} not allowed", event.http_method.to_ascii_uppercase()))
                    .with_header(ALLOW, self.allow.as_str());
                return Err(err.into());
            };

            debug!(method = %event.http_method, path = %event.path, "dispatching");
            let patch = handler.call(event, context).await?;
            response.merge(patch);
            response.set_header(ALLOW, self.allow.as_str());
            Ok(None)
        })
    }

    fn name(&self) -> &'static str {
        "dispatch"
    }
}

/// Implicit `OPTIONS`: `204 No Content`.
struct NoContent;

impl Handler for NoContent {
    fn call<'a>(&'a self, _: &'a mut Event, _: &'a mut Context) -> BoxFuture<'a, Result<Patch, Error>> {
        Box::pin(async { Ok(Patch::new().status(204)) })
    }
}

/// Implicit `HEAD`: the `GET` handler without a body.
struct Headless(BoxedHandler);

impl Handler for Headless {
    fn call<'a>(
        &'a self,
        event: &'a mut Event,
        context: &'a mut Context,
    ) -> BoxFuture<'a, Result<Patch, Error>> {
        Box::pin(async move { Ok(self.0.call(event, context).await?.without_body()) })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::chain::process_handlers;
    use crate::headers::CONTENT_TYPE;
    use crate::response::ProxyResponse;

    async fn request(method: &str, routes: impl Into<Routes>) -> Result<ProxyResponse, Error> {
        let mut event = Event::new(method, "/").normalized();
        let mut context = Context::default();
        process_handlers(&mut event, &mut context, &[main(routes)]).await
    }

    fn get_and_post() -> Methods {
        Methods::new()
            .get(|_, _| Ok(Patch::new().header("x-handler", "get").json(json!({ "ok": true }))))
            .post(|_, _| Ok(Patch::new().status(201)))
    }

    #[tokio::test]
    async fn calls_the_matching_handler() {
        let out = request("post", get_and_post()).await.unwrap();
        assert_eq!(out.status_code, 201);
        assert_eq!(out.header(ALLOW), Some("GET, POST, OPTIONS, HEAD"));
    }

    #[tokio::test]
    async fn rejects_unregistered_methods() {
        let err = request("GET", Methods::new().post(|_, _| Ok(()))).await.unwrap_err();
        let Error::Http(err) = err else { panic!("expected an HTTP error") };

        assert_eq!(err.status_code(), 405);
        assert_eq!(err.message().to_string(), "Method GET not allowed");
        assert!(err.headers()[ALLOW].contains("POST"));
    }

    #[tokio::test]
    async fn rejects_unknown_method_strings() {
        let err = request("BREW", get_and_post()).await.unwrap_err();
        assert_eq!(err.status_code(), 405);
    }

    #[tokio::test]
    async fn head_mirrors_get_without_body() {
        let get = request("GET", get_and_post()).await.unwrap();
        let head = request("HEAD", get_and_post()).await.unwrap();

        assert_eq!(head.status_code, get.status_code);
        assert_eq!(head.header("x-handler"), Some("get"));
        assert_eq!(head.body, "");
        assert_eq!(head.header(CONTENT_TYPE), None);
    }

    #[tokio::test]
    async fn options_is_synthesized() {
        let out = request("OPTIONS", Methods::new().post(|_, _| Ok(()))).await.unwrap();
        assert_eq!(out.status_code, 204);
        assert_eq!(out.header(ALLOW), Some("POST, OPTIONS"));
    }

    #[tokio::test]
    async fn explicit_registrations_are_kept() {
        let methods = get_and_post()
            .options(|_, _| Ok(Patch::new().status(200).body("custom")))
            .head(|_, _| Ok(Patch::new().status(299)));

        assert_eq!(request("OPTIONS", methods.clone()).await.unwrap().body, "custom");
        assert_eq!(request("HEAD", methods).await.unwrap().status_code, 299);
    }

    #[tokio::test]
    async fn no_implicit_methods_for_other_verbs() {
        let err = request("OPTIONS", Methods::new().delete(|_, _| Ok(()))).await.unwrap_err();
        assert_eq!(err.status_code(), 405);
    }

    #[tokio::test]
    async fn reregistering_replaces_in_place() {
        let methods = Methods::new()
            .put(|_, _| Ok("first"))
            .delete(|_, _| Ok(()))
            .put(|_, _| Ok("second"));

        let out = request("PUT", methods).await.unwrap();
        assert_eq!(out.body, "second");
        assert_eq!(out.header(ALLOW), Some("PUT, DELETE"));
    }

    #[tokio::test]
    async fn single_handler_serves_get() {
        let routes = Routes::from_fn(|_, _| Ok("hello"));
        assert_eq!(request("GET", routes.clone()).await.unwrap().body, "hello");
        assert_eq!(request("HEAD", routes.clone()).await.unwrap().body, "");
        assert_eq!(request("POST", routes).await.unwrap_err().status_code(), 405);
    }

    #[tokio::test]
    async fn handler_errors_propagate() {
        let methods = Methods::new().get(|_, _| Err::<(), _>(HttpError::new(404).into()));
        assert_eq!(request("GET", methods).await.unwrap_err().status_code(), 404);
    }
}
