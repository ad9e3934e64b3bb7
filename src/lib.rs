//! A programmable HTTP mock server for test suites.
//!
//! Tests describe a server as a [`MockApp`]: a set of routes, each a method
//! set, a literal or regex path pattern, and a handler. A [`MockServer`] runs
//! that app in a separate process bound to a real port on `127.0.0.1`, so the
//! code under test talks to it over plain HTTP, and tears it down again when
//! the test is done.
//!
//! # Features
//!
//! - Routes matched in registration order, by exact path or by an anchored,
//!   case-insensitive regex whose groups are handed to the handler
//! - Handlers return a full [`HttpResponse`], a string (`200 text/plain`),
//!   structured data (`200 application/json`) or nothing (`204`)
//! - `405` for methods no route uses, `404` for unknown paths, `500` for
//!   handlers that fail or panic; the server keeps running
//! - `HEAD` answered by the `GET` route unless one is registered for `HEAD`
//! - Every response names the server in an `X-Server` header
//! - The child process is killed and its artifacts removed on `stop` or drop
//!
//! # Examples
//!
//! ## Dispatching in-process
//!
//! ```
//! use mockhttp_rs::{HttpRequest, HttpVersion, Method, Router, StatusCode};
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! let mut router = Router::new("Example");
//! router.register_request_handler("GET", r"/users/(?<id>\d+)", |_req, params| {
//!     Ok(json!({ "id": params.name("id") }))
//! }).unwrap();
//!
//! let request = HttpRequest::new(Method::GET, "/users/7".to_string(), HttpVersion::Http11, HashMap::new());
//! let response = router.dispatch(&request);
//!
//! assert_eq!(response.status, StatusCode::Ok);
//! assert_eq!(response.header("X-Server"), Some("Example"));
//! ```
//!
//! ## Running out of process
//!
//! The executable that runs the tests doubles as the server: it mounts its
//! apps on a [`FrontController`], which serves when the process was spawned
//! as one and otherwise lets the tests go on.
//!
//! ```no_run
//! use mockhttp_rs::{Error, FrontController, MockApp, MockServer, Router};
//!
//! struct Api;
//!
//! impl MockApp for Api {
//!     fn register_request_handlers(router: &mut Router) -> Result<(), Error> {
//!         router.register_request_handler("GET", "/", |_req, _params| Ok("Hello"))
//!     }
//! }
//!
//! fn main() -> Result<(), Error> {
//!     if FrontController::new().mount::<Api>().run_if_spawned()? {
//!         return Ok(());
//!     }
//!
//!     let mut server = MockServer::<Api>::new()?;
//!     server.start()?;
//!     // ... point the code under test at server.base_url()
//!     server.stop();
//!     Ok(())
//! }
//! ```

pub mod parser;
pub mod router;
pub mod server;
pub mod supervisor;

// Re-export commonly used items for convenience
pub use parser::{Error as ParserError, HttpRequest, HttpVersion, Method, parse_request};
pub use router::{HandlerError, Params, Reply, Router, DEFAULT_SERVER_NAME, SERVER_HEADER};
pub use server::{Error, HttpResponse, HttpServer, ServerConfig, StatusCode};
pub use supervisor::{is_front_controller, FrontController, MockApp, MockServer, MockServerConfig, Readiness};
