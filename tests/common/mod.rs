//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use formrpc::config::{ClientConfig, RetryConfig, RpcConfig};
use formrpc::{app, Client, Router, RpcServer, Shutdown};

/// A running sample server; shuts down when dropped.
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Client using the stock chain, with or without batching.
    pub fn client(&self, batching: bool) -> Client {
        let config = ClientConfig {
            url: self.url(),
            batching,
            batch_window_ms: 10,
            ..ClientConfig::default()
        };
        Client::from_config(&config, &RetryConfig::default()).unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the sample server on an ephemeral port.
pub async fn spawn_app() -> TestServer {
    spawn_app_with(RpcConfig::default()).await
}

pub async fn spawn_app_with(config: RpcConfig) -> TestServer {
    spawn_router(app::router().unwrap(), config).await
}

/// Serve any procedure router on an ephemeral port.
pub async fn spawn_router<S: Send + Sync + 'static>(router: Router<S>, config: RpcConfig) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    let server = RpcServer::new(router, &config);
    tokio::spawn(async move {
        server.run(listener, signal).await.unwrap();
    });

    TestServer { addr, shutdown }
}

/// Start a programmable backend answering every request with `f()`.
///
/// The body is sent with `content-type: application/json`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 16 * 1024];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
