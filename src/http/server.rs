//! HTTP server setup and accept loop.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Run each connection's session on its own blocking worker
//! - Stop accepting on shutdown and drain in-flight connections
//!
//! # Design Decisions
//! - Sessions use blocking std sockets with a receive timeout; the tokio
//!   runtime only drives accepting, signals and draining
//! - The listener's connection permit bounds the number of live workers

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::app::Application;
use crate::config::ServerConfig;
use crate::http::session::{ConnectionSession, SessionSettings};
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Accepted, Listener, ListenerError};

/// Pause after a failed accept so resource exhaustion does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// HTTP server hosting a single application.
pub struct HttpServer {
    config: ServerConfig,
    app: Arc<dyn Application>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    pub fn new(config: ServerConfig, app: Arc<dyn Application>) -> Self {
        Self {
            config,
            app,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let settings = Arc::new(SessionSettings::from_config(&self.config, addr.port()));
        let session = Arc::new(ConnectionSession::new(Arc::clone(&self.app), settings));

        tracing::info!(
            address = %addr,
            debug = self.config.session.debug,
            "HTTP server starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => self.dispatch(&session, accepted),
                    Err(ListenerError::Closed) => break,
                    Err(e @ ListenerError::Handoff { .. }) => {
                        tracing::warn!(error = %e, "Could not hand connection to worker");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
        }

        self.drain().await;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn dispatch(&self, session: &Arc<ConnectionSession>, accepted: Accepted) {
        let Accepted { stream, peer, permit } = accepted;
        let guard = self.tracker.track(peer);
        let session = Arc::clone(session);

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let span = tracing::info_span!("connection", id = %guard.id(), peer = %peer);
            let _enter = span.enter();

            match session.serve_tcp(stream, peer) {
                Ok(outcome) => tracing::debug!(?outcome, "Connection finished"),
                Err(e) => tracing::warn!(error = %e, "Connection setup failed"),
            }
            drop(guard);
        });
    }

    async fn drain(&self) {
        let active = self.tracker.active_count();
        if active == 0 {
            return;
        }

        let limit = Duration::from_secs(self.config.shutdown.drain_timeout_secs);
        tracing::info!(active, timeout_secs = limit.as_secs(), "Draining connections");

        if tokio::time::timeout(limit, self.tracker.wait_idle()).await.is_err() {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Drain timeout elapsed, abandoning connections"
            );
        }
    }
}
