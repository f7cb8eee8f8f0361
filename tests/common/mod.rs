//! Shared helpers for integration tests

#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route library logs to the test harness output
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("understudy=debug"))
            .with_test_writer()
            .try_init();
    });
}

/// Loopback HTTP server that counts the requests it serves
pub struct TestServer {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server answering `hello #<n> <METHOD> <path> <body>`
    pub async fn start() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    let service = service_fn(move |request: hyper::Request<Incoming>| {
                        let counter = Arc::clone(&counter);
                        async move {
                            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                            let method = request.method().to_string();
                            let path = request.uri().path().to_string();
                            let body = request
                                .into_body()
                                .collect()
                                .await
                                .map(|b| b.to_bytes())
                                .unwrap_or_default();
                            let text = format!(
                                "hello #{n} {method} {path} {}",
                                String::from_utf8_lossy(&body)
                            );
                            Ok::<_, Infallible>(
                                hyper::Response::builder()
                                    .status(if path == "/missing" { 404 } else { 200 })
                                    .header("content-type", "text/plain")
                                    .header("x-served-by", "test-server")
                                    .header("x-legacy", &b"caf\xe9"[..])
                                    .body(Full::new(Bytes::from(text)))
                                    .unwrap(),
                            )
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        Ok(Self { addr, hits, handle })
    }

    /// Absolute URL for `path` on this server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Requests served so far
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Stop accepting connections
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
