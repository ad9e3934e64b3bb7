//! Listener configuration.

use std::net::{Ipv4Addr, SocketAddr};

/// Configuration of the HTTP listener running inside the child process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to bind to.
    pub addr: SocketAddr,
    /// The maximum number of concurrent connections.
    pub max_connections: usize,
    /// The size of each socket read.
    pub read_buffer_size: usize,
    /// The largest request head (request line and headers) the listener accepts.
    pub max_head_size: usize,
    /// The largest request body the listener will read.
    pub max_body_size: usize,
}

impl ServerConfig {
    /// Default configuration bound to `127.0.0.1:<port>`.
    pub fn localhost(port: u16) -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            max_connections: 1024,
            read_buffer_size: 8192,
            max_head_size: 64 * 1024,
            max_body_size: 8 * 1024 * 1024,
        }
    }
}
