//! Bounded TCP acceptor.
//!
//! # Responsibilities
//! - Bind the configured host and port
//! - Hold one semaphore permit per live connection (`max_connections`)
//! - Hand accepted sockets over in blocking mode, ready for a session worker
//!
//! # Design Decisions
//! - The permit is taken before `accept`, so a full server leaves new clients
//!   in the kernel backlog instead of accepting and stalling them
//! - The permit travels with the socket into the worker thread

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    /// The socket was accepted but could not be switched to blocking mode.
    #[error("failed to hand off connection from {peer}: {source}")]
    Handoff {
        peer: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("connection limiter closed")]
    Closed,
}

/// An accepted connection, ready for blocking I/O.
#[derive(Debug)]
pub struct Accepted {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    pub permit: ConnectionPermit,
}

/// TCP listener that admits at most `max_connections` live connections.
pub struct Listener {
    inner: TcpListener,
    slots: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let address = format!("{}:{}", config.host, config.port);
        let inner = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|source| ListenerError::Bind { address: address.clone(), source })?;

        let local = inner
            .local_addr()
            .map_err(|source| ListenerError::Bind { address, source })?;
        tracing::info!(
            address = %local,
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner,
            slots: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Wait for a free slot, then for the next client.
    pub async fn accept(&self) -> Result<Accepted, ListenerError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, peer) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        let stream = stream
            .into_std()
            .and_then(|s| s.set_nonblocking(false).map(|()| s))
            .map_err(|source| ListenerError::Handoff { peer, source })?;

        tracing::debug!(
            peer = %peer,
            free_slots = self.slots.available_permits(),
            "Connection accepted"
        );
        Ok(Accepted { stream, peer, permit: ConnectionPermit { _permit: permit } })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn available_permits(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// One connection slot; released on drop, including during unwinding.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
