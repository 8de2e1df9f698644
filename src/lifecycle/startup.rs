//! Startup orchestration.
//!
//! # Responsibilities
//! - Build a runtime whose blocking pool fits the connection limit
//! - Bind the listener and serve the application
//! - Wire OS signals to graceful shutdown
//! - Tear the runtime down without waiting on sessions the drain gave up on

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::Runtime;

use crate::app::Application;
use crate::config::ServerConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::net::listener::{Listener, ListenerError};

/// Fatal errors while bringing the server up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Multi-threaded runtime with one blocking thread per allowed connection.
pub fn build_runtime(config: &ServerConfig) -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(config.listener.max_connections.max(1))
        .thread_name("qsonac-worker")
        .build()
}

/// Drive `server` to completion on `runtime`, then shut the runtime down in
/// the background.
///
/// Dropping a runtime joins its blocking pool, and a session parked on a
/// stalled read would keep the process alive for the whole receive timeout.
/// By the time `server` resolves the drain deadline has already been honored,
/// so leftover workers are detached instead.
pub fn block_on_server<F>(runtime: Runtime, server: F) -> Result<(), StartupError>
where
    F: Future<Output = Result<(), StartupError>>,
{
    let result = runtime.block_on(server);
    runtime.shutdown_background();
    result
}

/// Serve `app` until SIGINT or SIGTERM.
pub async fn run(config: ServerConfig, app: Arc<dyn Application>) -> Result<(), StartupError> {
    let listener = Listener::bind(&config.listener).await?;
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    HttpServer::new(config, app).run(listener, server_shutdown).await?;
    Ok(())
}
