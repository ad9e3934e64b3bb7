//! The HTTP side of the mock server.
//!
//! [`HttpResponse`] is what handlers build and the router returns;
//! [`HttpServer`] is the small tokio listener that runs inside the child
//! process and hands each parsed request to a [`Router`](crate::router::Router).

mod response;
mod config;
mod error;
mod http_server;
mod tests;

// Re-export public items
pub use response::{HttpResponse, StatusCode};
pub use config::ServerConfig;
pub use error::Error;
pub use http_server::HttpServer;
