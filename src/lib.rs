//! # lambstack
//!
//! A minimal middleware stack for serverless HTTP functions.
//!
//! ## The contract
//!
//! The platform owns routing, TLS, scaling and connections. One invocation
//! delivers one [`Event`] and a [`Context`], and expects one
//! [`ProxyResponse`] back. lambstack does the part in between:
//!
//! - An ordered chain of [`Step`]s sharing one [`Response`] accumulator
//! - Early responses that skip dispatch steps while cross-cutting steps
//!   still run
//! - Body shorthands (`html`, `json`, `xml`) serialized with the right
//!   `content-type` and a byte-accurate `content-length`
//! - Two-level error recovery: [`Stack::run`] always returns a response
//!
//! ## Quick start
//!
//! ```rust
//! use lambstack::dispatch::{self, Methods};
//! use lambstack::middleware::helmet;
//! use lambstack::{Context, Event, HttpError, Patch, Stack};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let stack = Stack::new(vec![
//!     helmet(),
//!     dispatch::main(
//!         Methods::new()
//!             .get(|_, _| Ok(json!({ "users": [] })))
//!             .post(|ev, _| {
//!                 let user = ev.json.clone().ok_or_else(|| HttpError::bad_request("expected JSON"))?;
//!                 Ok(Patch::new().status(201).json(user))
//!             }),
//!     ),
//! ]);
//!
//! let event = Event::new("POST", "/users")
//!     .with_header("Content-Type", "application/json")
//!     .with_body(r#"{"name":"ada"}"#);
//!
//! let out = stack.run(event, Context::new("req-1")).await;
//! assert_eq!(out.status_code, 201);
//! assert_eq!(out.body, r#"{"name":"ada"}"#);
//! assert_eq!(out.header("allow"), Some("GET, POST, OPTIONS, HEAD"));
//! # }
//! ```

mod chain;
mod error;
mod event;
mod handler;
mod interop;
mod method;
mod recover;
mod response;
mod stack;
mod status;

pub mod config;
pub mod cookie;
pub mod dispatch;
pub mod headers;
pub mod logging;
pub mod middleware;

pub use chain::{Step, process_handlers};
pub use error::{Error, HttpError, Message};
pub use event::{Context, Event};
pub use handler::{BoxFuture, BoxedHandler, BoxedMiddleware, FnHandler, FnMiddleware, Handler, Middleware};
pub use method::{Method, UnknownMethod};
pub use recover::{ErrorHandler, handle_error};
pub use response::{ContentType, IntoPatch, Patch, PendingCookie, ProxyResponse, Response, redirect};
pub use stack::Stack;
pub use status::reason;

pub use http::StatusCode;
