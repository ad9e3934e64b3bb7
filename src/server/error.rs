//! Error types for the mock server.

use std::path::PathBuf;

use thiserror::Error;

use crate::parser::Error as ParserError;

/// Errors that can occur while configuring, supervising or running a mock server.
#[derive(Debug, Error)]
pub enum Error {
    /// Error parsing an HTTP request.
    #[error("Parse error: {0}")]
    ParseError(#[from] ParserError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The server was configured in a way it cannot honour.
    #[error("Configuration error: {0}")]
    Config(String),

    /// None of the candidate front controller executables exist.
    #[error("Could not find a front controller executable, tried: {0:?}")]
    EntryNotFound(Vec<PathBuf>),

    /// The front controller was run outside a supervised child process.
    #[error("The front controller only runs inside a mock server child process, not in your tests")]
    NotFrontController,

    /// The child process did not come up.
    #[error("Server process failed to start: {0}")]
    Startup(String),
}
