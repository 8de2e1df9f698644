//! Shared utilities for integration tests.

use std::io::{Read, Write};
use std::net::{Shutdown as SocketShutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use qsonac::config::ServerConfig;
use qsonac::net::listener::Listener;
use qsonac::{Application, HttpServer, Shutdown};
use tokio::task::JoinHandle;

/// A running test server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

/// Config bound to an ephemeral localhost port.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.listener.max_connections = 16;
    config.session.receive_timeout_secs = 5;
    config.session.server_identity = "qsonac/test".into();
    config.shutdown.drain_timeout_secs = 2;
    config
}

/// Bind and start serving `app` in the background.
pub async fn start_server(config: ServerConfig, app: Arc<dyn Application>) -> TestServer {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    let handle = tokio::spawn(HttpServer::new(config, app).run(listener, server_shutdown));

    TestServer { addr, shutdown, handle }
}

/// Send raw bytes, half-close, and read until the server closes.
pub async fn send_raw(addr: SocketAddr, request: Vec<u8>) -> String {
    tokio::task::spawn_blocking(move || {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        stream.write_all(&request).unwrap();
        stream.shutdown(SocketShutdown::Write).unwrap();
        read_all(&mut stream)
    })
    .await
    .unwrap()
}

/// Read until EOF, tolerating a reset after the last byte.
pub fn read_all(stream: &mut TcpStream) -> String {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
