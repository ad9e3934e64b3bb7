//! Request dispatch.
//!
//! A [`Router`] owns the ordered route table of a mock server. It matches a
//! parsed [`HttpRequest`](crate::parser::HttpRequest) to the first route
//! registered for its method and path, runs the handler, and coerces whatever
//! the handler returned into an [`HttpResponse`](crate::server::HttpResponse).
//! Dispatch never fails: routing misses and handler faults are turned into
//! plain-text error responses so a misbehaving handler cannot take the
//! server down.

mod dispatch;
mod reply;
mod route;

pub use dispatch::{IntoMethods, Router, DEFAULT_SERVER_NAME, SERVER_HEADER};
pub use reply::{HandlerError, Reply};
pub use route::{HandlerFn, Params, Route, RouteMatch};
