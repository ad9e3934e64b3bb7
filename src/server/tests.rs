//! Tests for the HTTP listener and response encoding.

#[cfg(test)]
mod server_tests {
    use std::io::{self, Cursor};
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

    use crate::parser::{Error as ParserError, HttpRequest};
    use crate::router::{Router, SERVER_HEADER};
    use crate::server::{HttpServer, ServerConfig, HttpResponse, StatusCode, Error};

    // Mock TcpStream for testing
    struct MockTcpStream {
        read_data: Cursor<Vec<u8>>,
        write_data: Vec<u8>,
        max_read: usize,
    }

    impl MockTcpStream {
        fn new(read_data: Vec<u8>) -> Self {
            Self {
                read_data: Cursor::new(read_data),
                write_data: Vec::new(),
                max_read: usize::MAX,
            }
        }

        /// Hand out at most `max_read` bytes per read, like a slow peer.
        fn trickle(read_data: Vec<u8>, max_read: usize) -> Self {
            Self {
                max_read,
                ..Self::new(read_data)
            }
        }

        fn written_data(&self) -> &[u8] {
            &self.write_data
        }
    }

    impl AsyncRead for MockTcpStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            let limit = this.max_read.min(buf.remaining());
            let unfilled = &mut buf.initialize_unfilled()[..limit];
            let n = std::io::Read::read(&mut this.read_data, unfilled)?;
            buf.advance(n);
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for MockTcpStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            this.write_data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn test_server() -> HttpServer {
        let mut router = Router::new("UnitTestServer");
        router.register_request_handler("GET", "/test", |_req, _params| Ok("Test response")).unwrap();
        router.register_request_handler("POST", "/post-back", |req: &HttpRequest, _params| {
            Ok(HttpResponse::new(StatusCode::Ok).with_body_bytes(req.body.clone()))
        }).unwrap();
        router.register_request_handler("GET", "/implicit-head", |_req, _params| Ok("Shall be stripped")).unwrap();
        router.register_request_handler("GET", "/raw-body", |_req, _params| {
            let mut response = HttpResponse::new(StatusCode::Ok);
            response.body = b"unannounced".to_vec();
            Ok(response)
        }).unwrap();
        router.register_request_handler("GET", "/long/a+", |_req, _params| Ok("long")).unwrap();

        HttpServer::new(ServerConfig::default(), router)
    }

    async fn roundtrip(server: &HttpServer, mut stream: MockTcpStream) -> (Result<(), Error>, String) {
        let result = HttpServer::handle_connection(&mut stream, server.router.clone(), &server.config).await;
        let response = String::from_utf8_lossy(stream.written_data()).into_owned();
        (result, response)
    }

    #[test]
    fn test_server_creation_locks_router() {
        let config = ServerConfig {
            addr: "127.0.0.1:63210".parse().unwrap(),
            max_connections: 100,
            read_buffer_size: 4096,
            max_head_size: 16 * 1024,
            max_body_size: 1024,
        };

        let server = HttpServer::new(config.clone(), Router::new("Locked"));
        assert_eq!(server.config.addr, config.addr);
        assert_eq!(server.config.max_connections, config.max_connections);
        assert!(server.router.is_locked());
    }

    #[test]
    fn test_localhost_config() {
        let config = ServerConfig::localhost(63333);
        assert_eq!(config.addr.to_string(), "127.0.0.1:63333");
        assert_eq!(config.read_buffer_size, ServerConfig::default().read_buffer_size);
    }

    #[tokio::test]
    async fn test_handle_connection_with_valid_request() {
        let server = test_server();
        let stream = MockTcpStream::new(b"GET /test HTTP/1.1\r\nHost: localhost\r\n\r\n".to_vec());

        let (result, response) = roundtrip(&server, stream).await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Type: text/plain\r\n"));
        assert!(response.contains("Connection: close\r\n"));
        assert!(response.contains(&format!("{SERVER_HEADER}: UnitTestServer\r\n")));
        assert!(response.ends_with("\r\n\r\nTest response"));
    }

    #[tokio::test]
    async fn test_handle_connection_with_not_found() {
        let server = test_server();
        let stream = MockTcpStream::new(b"GET /nonexistent HTTP/1.1\r\nHost: localhost\r\n\r\n".to_vec());

        let (result, response) = roundtrip(&server, stream).await;

        // A routing miss is an ordinary response, not a connection error.
        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.contains("Path \"/nonexistent\" was not found on this server"));
    }

    #[tokio::test]
    async fn test_handle_connection_with_unsupported_method() {
        let server = test_server();
        let stream = MockTcpStream::new(b"DELETE /test HTTP/1.1\r\nHost: localhost\r\n\r\n".to_vec());

        let (result, response) = roundtrip(&server, stream).await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(response.contains("This server does not support a DELETE request"));
    }

    #[tokio::test]
    async fn test_handle_connection_with_invalid_request() {
        let server = test_server();
        let stream = MockTcpStream::new(b"INVALID REQUEST".to_vec());

        let (result, response) = roundtrip(&server, stream).await;

        assert!(matches!(result, Err(Error::ParseError(_))));
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.contains("Error parsing request:"));
        assert!(response.contains(&format!("{SERVER_HEADER}: UnitTestServer\r\n")));
    }

    #[tokio::test]
    async fn test_long_request_line_is_read_whole() {
        let server = test_server();
        let request = format!("GET /long/{} HTTP/1.1\r\nHost: localhost\r\n\r\n", "a".repeat(9000));

        let (result, response) = roundtrip(&server, MockTcpStream::trickle(request.into_bytes(), 1000)).await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
        assert!(response.ends_with("\r\n\r\nlong"));
    }

    #[tokio::test]
    async fn test_headers_after_a_large_header_are_kept() {
        let server = test_server();
        let request = format!(
            "POST /post-back HTTP/1.1\r\nHost: localhost\r\nX-Pad: {}\r\nContent-Length: 5\r\n\r\nhello",
            "p".repeat(9000)
        );

        let (result, response) = roundtrip(&server, MockTcpStream::new(request.into_bytes())).await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\nhello"));
    }

    #[tokio::test]
    async fn test_oversized_head_is_rejected() {
        let mut router = Router::new("SmallHeads");
        router.register_request_handler("GET", "/", |_req, _params| Ok("unreachable")).unwrap();
        let config = ServerConfig {
            max_head_size: 1024,
            ..ServerConfig::default()
        };
        let server = HttpServer::new(config, router);
        let request = format!("GET / HTTP/1.1\r\nHost: localhost\r\nX-Pad: {}\r\n\r\n", "p".repeat(2048));

        let (result, response) = roundtrip(&server, MockTcpStream::trickle(request.into_bytes(), 100)).await;

        assert!(matches!(result, Err(Error::ParseError(ParserError::HeadTooLarge(1024)))));
        assert!(response.starts_with("HTTP/1.1 431 Request Header Fields Too Large\r\n"));
        assert!(response.contains(&format!("{SERVER_HEADER}: SmallHeads\r\n")));
        assert!(!response.contains("unreachable"));
    }

    #[tokio::test]
    async fn test_handle_connection_with_closed_socket() {
        let server = test_server();
        let (result, response) = roundtrip(&server, MockTcpStream::new(Vec::new())).await;
        assert!(result.is_ok());
        assert!(response.is_empty());
    }

    #[tokio::test]
    async fn test_body_arriving_in_pieces_is_reassembled() {
        let server = test_server();
        let request = b"POST /post-back HTTP/1.1\r\nHost: localhost\r\nContent-Length: 12\r\n\r\nhello, world".to_vec();

        let (result, response) = roundtrip(&server, MockTcpStream::trickle(request, 5)).await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\nhello, world"));
    }

    #[tokio::test]
    async fn test_body_is_capped_by_max_body_size() {
        let mut router = Router::new("Capped");
        router.register_request_handler("POST", "/len", |req: &HttpRequest, _params| Ok(req.body.len().to_string())).unwrap();
        let config = ServerConfig {
            max_body_size: 4,
            ..ServerConfig::default()
        };
        let server = HttpServer::new(config, router);
        let request = b"POST /len HTTP/1.1\r\nHost: localhost\r\nContent-Length: 10\r\n\r\n0123456789".to_vec();

        let (result, response) = roundtrip(&server, MockTcpStream::trickle(request, 3)).await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[tokio::test]
    async fn test_head_request_writes_no_body() {
        let server = test_server();
        let stream = MockTcpStream::new(b"HEAD /implicit-head HTTP/1.1\r\nHost: localhost\r\n\r\n".to_vec());

        let (result, response) = roundtrip(&server, stream).await;

        assert!(result.is_ok());
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Length: 17\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_head_reports_length_of_unannounced_body() {
        let server = test_server();
        let stream = MockTcpStream::new(b"HEAD /raw-body HTTP/1.1\r\nHost: localhost\r\n\r\n".to_vec());

        let (result, response) = roundtrip(&server, stream).await;

        assert!(result.is_ok());
        assert!(response.contains("Content-Length: 11\r\n"), "{response}");
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_response_to_bytes_adds_content_length() {
        let mut response = HttpResponse::new(StatusCode::Ok);
        response.body = b"abc".to_vec();

        let bytes = String::from_utf8(response.to_bytes()).unwrap();
        assert!(bytes.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(bytes.contains("Content-Length: 3\r\n"));
        assert!(bytes.ends_with("\r\n\r\nabc"));
    }

    #[test]
    fn test_no_content_response_has_no_length_or_body() {
        let bytes = String::from_utf8(HttpResponse::new(StatusCode::NoContent).to_bytes()).unwrap();
        assert_eq!(bytes, "HTTP/1.1 204 No Content\r\n\r\n");
    }

    #[test]
    fn test_custom_status_code() {
        let response = HttpResponse::new(StatusCode::from_u16(418));
        assert_eq!(response.status, StatusCode::Other(418));
        assert!(String::from_utf8(response.to_bytes()).unwrap().starts_with("HTTP/1.1 418 Unknown\r\n"));
        assert_eq!(StatusCode::from_u16(404), StatusCode::NotFound);
        assert_eq!(StatusCode::NotFound.as_u16(), 404);
    }

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let response = HttpResponse::new(StatusCode::Ok)
            .with_header("content-type", "text/html")
            .with_content_type("text/plain");

        assert_eq!(response.headers.len(), 1);
        assert_eq!(response.header("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn test_json_response() {
        let response = HttpResponse::new(StatusCode::Created)
            .with_json(&serde_json::json!({ "id": 1 }))
            .unwrap();

        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.body, br#"{"id":1}"#);
        assert_eq!(response.header("Content-Length"), Some("8"));
    }

    #[test]
    fn test_strip_body_keeps_headers() {
        let mut response = HttpResponse::plain_text(StatusCode::Ok, "hello");
        response.strip_body();
        assert!(response.body.is_empty());
        assert_eq!(response.header("Content-Length"), Some("5"));
        assert_eq!(response.header("Content-Type"), Some("text/plain"));

        let mut response = HttpResponse::new(StatusCode::Ok);
        response.body = b"abc".to_vec();
        response.strip_body();
        assert_eq!(response.header("Content-Length"), Some("3"));

        let mut response = HttpResponse::new(StatusCode::NoContent);
        response.strip_body();
        assert_eq!(response.header("Content-Length"), None);
    }
}
