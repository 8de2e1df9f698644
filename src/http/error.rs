//! Protocol and dispatch error taxonomy.
//!
//! # Design Decisions
//! - One error type for the whole connection pipeline so the session can pick
//!   a recovery policy with a single `match`
//! - `MalformedHeaderLine` exists for logging only; the header parser recovers
//!   from it and never returns it
//! - Timeouts are detected from the I/O error kind, since blocking sockets
//!   report an expired receive timeout as `WouldBlock` or `TimedOut`

use std::io;

use thiserror::Error;

use crate::app::ApplicationError;

/// Errors raised while reading a request or dispatching it to the application.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Wrong token count or missing `HTTP/` prefix in the request line.
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    /// A request or header line reached the byte limit without a terminator.
    #[error("request line exceeds {limit} bytes")]
    RequestLineTooLong { limit: usize },

    /// Header line without a colon.
    #[error("malformed header line: {0:?}")]
    MalformedHeaderLine(String),

    /// The header block did not end within the allowed number of lines.
    #[error("more than {limit} header lines")]
    TooManyHeaders { limit: usize },

    /// Inbound read exceeded the receive timeout.
    #[error("timed out waiting for request data")]
    Timeout,

    /// Response-start was called after the head had been flushed.
    #[error("response headers already sent")]
    HeaderAfterSend,

    /// Body bytes were produced before response-start was called.
    #[error("response body written before response was started")]
    ResponseNotStarted,

    /// The application returned an error.
    #[error("application error: {0}")]
    Application(ApplicationError),

    /// The application panicked while handling the request.
    #[error("application panicked: {0}")]
    ApplicationPanic(String),

    /// Socket-level failure.
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        if is_timeout(&err) {
            ProtocolError::Timeout
        } else {
            ProtocolError::Io(err)
        }
    }
}

impl From<ApplicationError> for ProtocolError {
    fn from(err: ApplicationError) -> Self {
        match err {
            ApplicationError::Protocol(inner) => *inner,
            other => ProtocolError::Application(other),
        }
    }
}

impl ProtocolError {
    /// Whether this error represents an expired receive timeout, including one
    /// surfaced by the application while it read the request body.
    pub fn is_timeout(&self) -> bool {
        match self {
            ProtocolError::Timeout => true,
            ProtocolError::Application(ApplicationError::Io(e)) => is_timeout(e),
            _ => false,
        }
    }
}

/// Result type for the connection pipeline.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
