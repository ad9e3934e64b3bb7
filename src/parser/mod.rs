//! HTTP parser module.
//!
//! Turns the bytes the mock listener reads off a connection into an
//! [`HttpRequest`] that request handlers can inspect.

mod request;
mod method;
mod version;
mod error;

// Re-export public items
pub use request::HttpRequest;
pub use method::Method;
pub use version::HttpVersion;
pub use error::Error;

pub use request::{find_head_end, parse_request};
