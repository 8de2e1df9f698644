//! Application boundary.
//!
//! # Data Flow
//! ```text
//! ConnectionSession
//!     → Application::call(environ, responder)
//!         → responder.start_response(status, headers)   (head buffered)
//!         → returns Box<dyn ResponseBody>
//!     → invoker drains the body, flushing the head before the first chunk
//!     → ResponseBody::close() exactly once
//! ```
//!
//! # Design Decisions
//! - The application is a trait object injected at server construction, so
//!   each server can host a different one and tests can use plain structs
//! - The body may borrow the environment (for instance to stream the request
//!   input back out), hence the `'e` lifetime on `call`

pub mod body;
pub mod message;

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::http::environ::Environ;
use crate::http::error::ProtocolError;
use crate::http::invoker::Responder;

pub use body::{Chunks, ResponseBody};
pub use message::MessageApp;

/// Errors an application can report back to the server.
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// I/O failure, typically while reading the request body.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A response protocol rule was broken (e.g. headers after send).
    #[error("protocol violation: {0}")]
    Protocol(Box<ProtocolError>),

    /// Any other application-level failure.
    #[error("{0}")]
    Failed(String),
}

impl From<ProtocolError> for ApplicationError {
    fn from(err: ProtocolError) -> Self {
        ApplicationError::Protocol(Box::new(err))
    }
}

/// Result type for application code.
pub type AppResult<T> = Result<T, ApplicationError>;

/// A request handler invoked once per request.
pub trait Application: Send + Sync {
    /// Handle one request.
    ///
    /// The application must call [`Responder::start_response`] before any body
    /// bytes are produced, either directly through the returned writer or by
    /// yielding chunks from the returned body.
    fn call<'e>(
        &self,
        environ: &'e mut Environ<'_>,
        responder: &mut Responder<'_>,
    ) -> AppResult<Box<dyn ResponseBody + 'e>>;
}

impl<A: Application + ?Sized> Application for Arc<A> {
    fn call<'e>(
        &self,
        environ: &'e mut Environ<'_>,
        responder: &mut Responder<'_>,
    ) -> AppResult<Box<dyn ResponseBody + 'e>> {
        (**self).call(environ, responder)
    }
}
