//! Shared helpers for the integration suites: a tiny HTTP/1.1 server that
//! serves canned responses from a loopback port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// How a route frames (or withholds) its body.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `Content-Length` header, body in one write.
    Sized,
    /// `Transfer-Encoding: chunked`, no length announced up front.
    Chunked,
    /// Accept the request and never answer.
    Stall,
}

/// One canned response.
#[derive(Clone)]
pub struct Route {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    pub location: Option<&'static str>,
    pub framing: Framing,
}

impl Route {
    pub fn pdf(body: impl Into<Vec<u8>>) -> Self {
        Self::html(200, body).with_content_type("application/pdf")
    }

    pub fn html(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: "text/html",
            body: body.into(),
            location: None,
            framing: Framing::Sized,
        }
    }

    pub fn status(status: u16) -> Self {
        Self::html(status, format!("<html><body>{status}</body></html>"))
    }

    pub fn redirect(location: &'static str) -> Self {
        Self {
            location: Some(location),
            ..Self::status(302)
        }
    }

    pub fn stall() -> Self {
        Self {
            framing: Framing::Stall,
            ..Self::status(200)
        }
    }

    pub fn chunked(self) -> Self {
        Self {
            framing: Framing::Chunked,
            ..self
        }
    }

    fn with_content_type(self, content_type: &'static str) -> Self {
        Self {
            content_type,
            ..self
        }
    }
}

/// Loopback server; unknown paths answer 404.
pub struct StubServer {
    addr: SocketAddr,
    handle: tokio::task::JoinHandle<()>,
}

impl StubServer {
    pub async fn start(routes: Vec<(&'static str, Route)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
        let addr = listener.local_addr().expect("local addr");
        let routes: Arc<HashMap<&'static str, Route>> = Arc::new(routes.into_iter().collect());

        let handle = tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let routes = Arc::clone(&routes);
                tokio::spawn(async move {
                    let path = read_request_path(&mut socket).await;
                    let route = path
                        .as_deref()
                        .and_then(|p| routes.get(p).cloned())
                        .unwrap_or_else(|| Route::status(404));

                    serve(&mut socket, &route).await;
                });
            }
        });

        Self { addr, handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(socket: &mut tokio::net::TcpStream, route: &Route) {
    if route.framing == Framing::Stall {
        tokio::time::sleep(Duration::from_secs(60)).await;
        return;
    }

    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nConnection: close\r\n",
        route.status,
        reason(route.status),
        route.content_type
    );
    if let Some(location) = route.location {
        head.push_str(&format!("Location: {location}\r\n"));
    }
    match route.framing {
        Framing::Chunked => head.push_str("Transfer-Encoding: chunked\r\n\r\n"),
        _ => head.push_str(&format!("Content-Length: {}\r\n\r\n", route.body.len())),
    }
    let _ = socket.write_all(head.as_bytes()).await;

    if route.framing == Framing::Chunked {
        for chunk in route.body.chunks(256) {
            let _ = socket
                .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
                .await;
            let _ = socket.write_all(chunk).await;
            let _ = socket.write_all(b"\r\n").await;
        }
        let _ = socket.write_all(b"0\r\n\r\n").await;
    } else {
        let _ = socket.write_all(&route.body).await;
    }
    let _ = socket.shutdown().await;
}

async fn read_request_path(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let request = String::from_utf8_lossy(&buf);
    let target = request.lines().next()?.split_whitespace().nth(1)?;
    // Routes match on the path alone.
    Some(target.split('?').next().unwrap_or(target).to_string())
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        302 => "Found",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

/// A loopback address nothing is listening on.
pub async fn closed_port_url(path: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}{path}")
}

/// Route library logs through the test harness; `RUST_LOG` overrides.
pub fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
