//! Per-connection request handling.
//!
//! # Data Flow
//! ```text
//! socket
//!     → line.rs (bounded request line read; 414 when unterminated)
//!     → request_line.rs (method / path / version)
//!     → headers.rs (header block)
//!     → 100 Continue, if requested
//!     → environ.rs (request context)
//!     → invoker.rs (application call + body drain)
//!     → socket
//! ```
//!
//! # Error Policy
//! - Before the head is sent: timeout → 408 and line too long → 414, always;
//!   anything else → HTML error page only in debug mode, silent drop otherwise
//! - After the head is sent the bytes are committed, the connection is closed
//! - Streams are owned by the session and released on every exit path
//! - Closing half-closes first and drains unread input briefly, so an early
//!   414 reaches a client that is still uploading

use std::any::Any;
use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crate::app::Application;
use crate::config::ServerConfig;
use crate::http::environ::{ConnectionInfo, Environ};
use crate::http::error::{ProtocolError, ProtocolResult};
use crate::http::headers::HeaderSet;
use crate::http::invoker::{invoke, Responder};
use crate::http::line::{read_line, Line, MAX_LINE_BYTES};
use crate::http::request_line::RequestLine;

/// Version used in responses sent before the request line is known.
pub const DEFAULT_RESPONSE_VERSION: &str = "HTTP/1.1";

/// Per-read wait while discarding unread request bytes before close.
const LINGER_READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Most unread request bytes discarded before giving up and closing.
const LINGER_MAX_BYTES: u64 = 1024 * 1024;

/// Read-only per-server settings shared by all sessions.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub server_name: String,
    pub server_port: u16,
    pub server_identity: String,
    pub url_scheme: String,
    /// `None` disables the receive timeout.
    pub receive_timeout: Option<Duration>,
    /// Send error pages for failures that are otherwise dropped silently.
    pub debug: bool,
    pub multithread: bool,
    pub multiprocess: bool,
}

impl SessionSettings {
    /// Settings for a server bound to `port` (the actual port, which differs
    /// from the configured one when that is 0).
    pub fn from_config(config: &ServerConfig, port: u16) -> Self {
        let timeout = config.session.receive_timeout_secs;
        Self {
            server_name: config.listener.host.clone(),
            server_port: port,
            server_identity: config.session.server_identity.clone(),
            url_scheme: config.session.url_scheme.clone(),
            receive_timeout: (timeout > 0).then(|| Duration::from_secs(timeout)),
            debug: config.session.debug,
            multithread: true,
            multiprocess: false,
        }
    }

    fn connection_info(&self, peer: SocketAddr) -> ConnectionInfo {
        ConnectionInfo {
            server_name: self.server_name.clone(),
            server_port: self.server_port,
            remote_addr: peer,
            server_software: self.server_identity.clone(),
            url_scheme: self.url_scheme.clone(),
            multithread: self.multithread,
            multiprocess: self.multiprocess,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The application's response was sent.
    Served,
    /// A generated error response with this status was sent.
    ErrorResponse(u16),
    /// The connection was closed without any response.
    Dropped,
    /// The response was cut short after its head had been sent.
    Aborted,
    /// The peer closed the connection before sending a request.
    Idle,
}

/// Handles exactly one request on one connection.
pub struct ConnectionSession {
    app: Arc<dyn Application>,
    settings: Arc<SessionSettings>,
}

impl ConnectionSession {
    pub fn new(app: Arc<dyn Application>, settings: Arc<SessionSettings>) -> Self {
        Self { app, settings }
    }

    /// Serve a TCP connection, applying the receive timeout and shutting the
    /// socket down afterwards.
    pub fn serve_tcp(&self, stream: TcpStream, peer: SocketAddr) -> ProtocolResult<SessionOutcome> {
        stream.set_read_timeout(self.settings.receive_timeout)?;
        let reader = stream.try_clone()?;

        let outcome = self.serve(reader, &stream, peer);
        close_gracefully(&stream);
        Ok(outcome)
    }

    /// Serve one request from `reader`, writing the response to `writer`.
    pub fn serve<R: Read, W: Write>(&self, reader: R, mut writer: W, peer: SocketAddr) -> SessionOutcome {
        let mut reader = BufReader::new(reader);
        let mut responder = Responder::new(
            &mut writer,
            DEFAULT_RESPONSE_VERSION,
            self.settings.server_identity.as_str(),
        );

        match self.handle(&mut reader, &mut responder, peer) {
            Ok(outcome) => outcome,
            Err(err) => self.recover(err, &mut responder),
        }
    }

    fn handle<R: Read>(
        &self,
        reader: &mut BufReader<R>,
        responder: &mut Responder<'_>,
        peer: SocketAddr,
    ) -> ProtocolResult<SessionOutcome> {
        let raw = match read_line(reader, MAX_LINE_BYTES)? {
            Line::Eof => return Ok(SessionOutcome::Idle),
            Line::TooLong => return Err(ProtocolError::RequestLineTooLong { limit: MAX_LINE_BYTES }),
            Line::Complete(raw) => raw,
        };

        let request = RequestLine::parse(&raw)?;
        responder.set_version(request.version.as_str());
        tracing::debug!(
            method = %request.method,
            path = %request.path,
            version = %request.version,
            "Request line parsed"
        );

        let headers = HeaderSet::parse(reader)?;
        tracing::debug!(count = headers.len(), "Request headers parsed");

        if headers.expects_continue() {
            responder.send_continue()?;
        }

        let info = self.settings.connection_info(peer);
        let mut environ = Environ::build(&request, &headers, &info, reader);

        let app = &*self.app;
        let result = panic::catch_unwind(AssertUnwindSafe(|| invoke(app, &mut environ, responder)));
        match result {
            Ok(result) => result?,
            Err(payload) => return Err(ProtocolError::ApplicationPanic(panic_message(payload))),
        }

        tracing::info!(
            method = %request.method,
            path = %request.path,
            bytes = responder.body_bytes(),
            "Request served"
        );
        Ok(SessionOutcome::Served)
    }

    fn recover(&self, err: ProtocolError, responder: &mut Responder<'_>) -> SessionOutcome {
        if responder.head_sent() {
            tracing::warn!(error = %err, "Response failed after head was sent, closing connection");
            return SessionOutcome::Aborted;
        }

        let (code, always) = match &err {
            e if e.is_timeout() => (408, true),
            ProtocolError::RequestLineTooLong { .. } => (414, true),
            ProtocolError::MalformedRequestLine(_) => (400, false),
            ProtocolError::TooManyHeaders { .. } => (431, false),
            ProtocolError::Io(e) => {
                tracing::debug!(error = %e, "Connection error, dropping");
                return SessionOutcome::Dropped;
            }
            _ => (500, false),
        };

        if code >= 500 {
            tracing::error!(error = %err, "Request failed");
        } else {
            tracing::warn!(error = %err, status = code, "Rejecting request");
        }

        if !always && !self.settings.debug {
            return SessionOutcome::Dropped;
        }

        match responder.send_error(code, &err.to_string()) {
            Ok(()) => SessionOutcome::ErrorResponse(code),
            Err(e) => {
                tracing::debug!(error = %e, status = code, "Could not send error response");
                SessionOutcome::Dropped
            }
        }
    }
}

/// Half-close, then discard what the client is still sending so the close
/// does not turn into a reset that destroys the response in flight.
fn close_gracefully(stream: &TcpStream) {
    if let Err(e) = stream.shutdown(Shutdown::Write) {
        tracing::trace!(error = %e, "Socket already closed");
        return;
    }
    if stream.set_read_timeout(Some(LINGER_READ_TIMEOUT)).is_err() {
        return;
    }

    let mut unread = Read::take(stream, LINGER_MAX_BYTES);
    match io::copy(&mut unread, &mut io::sink()) {
        Ok(0) => {}
        Ok(n) => tracing::trace!(bytes = n, "Discarded unread request bytes"),
        Err(e) => tracing::trace!(error = %e, "Stopped draining request bytes"),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
