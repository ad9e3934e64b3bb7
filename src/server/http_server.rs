//! HTTP listener that feeds requests to a [`Router`].

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::signal;
use log::{debug, error, info, warn};

use crate::parser::{find_head_end, parse_request, Error as ParserError};
use crate::router::{Router, SERVER_HEADER};
use crate::server::config::ServerConfig;
use crate::server::error::Error;
use crate::server::response::{HttpResponse, StatusCode};

/// An HTTP server answering every connection with the router's response.
///
/// Each connection carries exactly one request and is closed after the
/// response is written.
pub struct HttpServer {
    /// The server configuration.
    pub config: ServerConfig,
    /// The route table, locked against further registration.
    pub router: Arc<Router>,
}

impl HttpServer {
    /// Create a new HTTP server serving `router`.
    pub fn new(config: ServerConfig, mut router: Router) -> Self {
        router.lock();
        Self {
            config,
            router: Arc::new(router),
        }
    }

    /// Log the registered endpoints.
    fn display_server_info(&self) {
        info!("{name} registered endpoints:", name = self.router.server_name());
        for route in self.router.routes() {
            let methods = route.methods().iter()
                .map(|m| m.to_string())
                .collect::<Vec<String>>()
                .join(", ");
            info!("  {methods} {}", route.pattern());
        }
    }

    /// Set up the TCP listener.
    async fn setup_listener(&self) -> Result<TcpListener, Error> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!("Server listening on http://{addr}", addr = self.config.addr);
        Ok(listener)
    }

    /// Set up a Ctrl+C handler for graceful shutdown.
    ///
    /// Supervised children are killed outright; this only matters when the
    /// front controller is run by hand.
    fn setup_ctrl_c_handler(shutdown_tx: mpsc::Sender<()>, tasks: &mut JoinSet<()>) {
        tasks.spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl+C, initiating graceful shutdown");
                    let _ = shutdown_tx.send(()).await;
                }
                Err(e) => {
                    error!("Error setting up Ctrl+C handler: {e}");
                }
            }
        });
    }

    /// Handle a new connection.
    async fn handle_new_connection(
        mut socket: tokio::net::TcpStream,
        addr: SocketAddr,
        semaphore: Arc<tokio::sync::Semaphore>,
        router: Arc<Router>,
        config: ServerConfig,
        tasks: &mut JoinSet<()>,
    ) {
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Connection limit reached, rejecting connection from {addr}");
                let response = HttpResponse::plain_text(
                    StatusCode::ServiceUnavailable,
                    "Server is at capacity, please try again later",
                )
                .with_header(SERVER_HEADER, router.server_name())
                .with_header("Connection", "close");
                let _ = socket.write_all(&response.to_bytes()).await;
                return;
            }
        };

        tasks.spawn(async move {
            // The permit is dropped when the task completes, releasing the semaphore slot
            let _permit = permit;

            if let Err(e) = Self::handle_connection(&mut socket, router, &config).await {
                debug!("Error handling connection from {addr}: {e}");
            }
        });
    }

    /// Handle connection errors.
    async fn handle_connection_error(e: std::io::Error) -> bool {
        error!("Error accepting connection: {e}");

        if e.kind() == std::io::ErrorKind::BrokenPipe {
            error!("Critical error accepting connection, shutting down");
            return true;
        }

        // For other errors, wait a bit before retrying
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        false
    }

    /// Perform graceful shutdown.
    async fn perform_shutdown(tasks: &mut JoinSet<()>) {
        info!("Waiting for {len} active connections to complete...", len = tasks.len());
        let shutdown_timeout = tokio::time::Duration::from_secs(5);
        let _ = tokio::time::timeout(shutdown_timeout, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("Task failed during shutdown: {e}");
                }
            }
        }).await;

        info!("Server shutdown complete");
    }

    /// Start the server and serve until Ctrl+C or a fatal accept error.
    pub async fn start(&self) -> Result<(), Error> {
        self.display_server_info();

        let listener = self.setup_listener().await?;

        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.config.max_connections));

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let mut tasks = JoinSet::new();

        Self::setup_ctrl_c_handler(shutdown_tx, &mut tasks);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down server...");
                    break;
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((socket, addr)) => {
                            Self::handle_new_connection(
                                socket,
                                addr,
                                semaphore.clone(),
                                self.router.clone(),
                                self.config.clone(),
                                &mut tasks
                            ).await;
                        },
                        Err(e) => {
                            if Self::handle_connection_error(e).await {
                                break;
                            }
                        }
                    }
                }
            }

            // Reap finished connection tasks so the set does not grow without bound
            while let Some(res) = tasks.try_join_next() {
                if let Err(e) = res {
                    error!("Connection task failed: {e}");
                }
            }
        }

        Self::perform_shutdown(&mut tasks).await;

        Ok(())
    }

    /// Read one request: the head, then as much body as `Content-Length` announces.
    ///
    /// A head that does not end within `max_head_size` bytes is rejected
    /// rather than parsed in part.
    async fn read_request(
        socket: &mut (impl AsyncRead + Unpin),
        config: &ServerConfig,
    ) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::with_capacity(config.read_buffer_size);
        let mut chunk = vec![0; config.read_buffer_size];

        let total = loop {
            if let Some((head_len, sep_len)) = find_head_end(&buf) {
                if head_len > config.max_head_size {
                    return Err(ParserError::HeadTooLarge(config.max_head_size).into());
                }
                let body_len = declared_body_length(&buf[..head_len]).min(config.max_body_size);
                break head_len + sep_len + body_len;
            }
            if buf.len() > config.max_head_size {
                return Err(ParserError::HeadTooLarge(config.max_head_size).into());
            }

            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                return Ok(buf);
            }
            buf.extend_from_slice(&chunk[..n]);
        };

        while buf.len() < total {
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        Ok(buf)
    }

    /// Answer a request the router never sees, then report why.
    async fn reject(
        socket: &mut (impl AsyncWrite + Unpin),
        router: &Router,
        error: ParserError,
    ) -> Result<(), Error> {
        let status = match error {
            ParserError::HeadTooLarge(_) => StatusCode::RequestHeaderFieldsTooLarge,
            _ => StatusCode::BadRequest,
        };
        let response = HttpResponse::plain_text(status, format!("Error parsing request: {error}"))
            .with_header(SERVER_HEADER, router.server_name())
            .with_header("Connection", "close");
        socket.write_all(&response.to_bytes()).await?;
        socket.flush().await?;
        Err(Error::ParseError(error))
    }

    /// Handle a single connection.
    pub async fn handle_connection(
        socket: &mut (impl AsyncRead + AsyncWrite + Unpin),
        router: Arc<Router>,
        config: &ServerConfig,
    ) -> Result<(), Error> {
        let raw = match Self::read_request(socket, config).await {
            Ok(raw) => raw,
            Err(Error::ParseError(e)) => return Self::reject(socket, &router, e).await,
            Err(e) => return Err(e),
        };
        if raw.is_empty() {
            return Ok(()); // Connection closed
        }

        let request = match parse_request(&raw) {
            Ok(req) => req,
            Err(e) => return Self::reject(socket, &router, e).await,
        };

        debug!("{method} {path}", method = request.method, path = request.path);
        let response = router.dispatch(&request).with_header("Connection", "close");

        socket.write_all(&response.to_bytes()).await?;
        socket.flush().await?;
        socket.shutdown().await?;

        Ok(())
    }
}

fn declared_body_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("Content-Length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}
