//! Shared utilities for integration tests.

use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use serde_json::Value as Json;

use reqlog::{AccessLogLayer, Level, Logger, RequestErrors, Sink};

/// Records captured from a logger's outputs.
#[derive(Clone, Default)]
pub struct ObservedLogs {
    buf: Arc<Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl ObservedLogs {
    /// Every line written so far, parsed as JSON.
    pub fn entries(&self) -> Vec<Json> {
        let buf = self.buf.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .filter_map(|line| serde_json::from_str::<Json>(line).ok())
            .collect()
    }

    pub fn with_message(&self, msg: &str) -> Vec<Json> {
        self.entries().into_iter().filter(|e| e["msg"] == msg).collect()
    }

    pub fn at_level(&self, level: Level) -> Vec<Json> {
        let name = level.as_capital_str();
        self.entries().into_iter().filter(|e| e["level"] == name).collect()
    }
}

impl Write for ObservedLogs {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A production JSON logger at `level` writing into the returned buffer.
pub fn observed(level: Level) -> (Logger, ObservedLogs) {
    let logs = ObservedLogs::default();
    let logger = Logger::builder()
        .level(level)
        .sink(Sink::writer("observer", logs.clone()))
        .error_sink(Sink::writer("observer", logs.clone()))
        .build();
    (logger, logs)
}

/// Router with one clean route and one that records a handler error.
#[allow(dead_code)]
pub fn app(logger: Logger) -> Router {
    Router::new()
        .route("/foo", get(|| async { "foo" }))
        .route(
            "/broken",
            get(|errors: RequestErrors| async move {
                errors.push("upstream unavailable");
                (StatusCode::BAD_GATEWAY, "broken")
            }),
        )
        .layer(AccessLogLayer::new(logger))
}

/// A GET request with an optional user agent.
#[allow(dead_code)]
pub fn get_request(uri: &str, user_agent: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(agent) = user_agent {
        builder = builder.header("user-agent", agent);
    }
    builder.body(Body::empty()).unwrap()
}

/// Serve `router` on an ephemeral port with peer addresses available.
#[allow(dead_code)]
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await;
    });
    addr
}

/// Send a raw HTTP/1.1 GET and return the full response text.
#[allow(dead_code)]
pub async fn raw_get(addr: SocketAddr, path: &str) -> String {
    let mut socket = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: raw-test/1.0\r\nConnection: close\r\n\r\n",
        path, addr
    );
    socket.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    socket.read_to_string(&mut response).await.unwrap();
    response
}
