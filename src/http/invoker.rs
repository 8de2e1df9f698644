//! Application invocation and response streaming.
//!
//! # States
//! ```text
//! Idle → HeadPending → HeadSent → Closed
//!
//! Idle → HeadPending:     start_response() stages the head
//! HeadPending ↺:          start_response() again overwrites it
//! HeadPending → HeadSent: first non-empty body write flushes the head
//! HeadSent → Closed:      body drained, close() called exactly once
//! ```
//!
//! # Design Decisions
//! - Chunks are written straight to the socket as they are produced; no
//!   response buffering and no transfer-encoding framing
//! - A body that yields nothing still gets its head flushed when draining ends
//! - Response-start after the head is on the wire is an error, never a resend

use std::io::{self, Write};

use chrono::Utc;

use crate::app::{Application, ResponseBody};
use crate::http::environ::Environ;
use crate::http::error::{ProtocolError, ProtocolResult};
use crate::http::response::{error_page, HeadBuffer, ResponseHead, ERROR_CONTENT_TYPE};
use crate::http::status;

/// Interim response sent for `Expect: 100-continue`.
pub const CONTINUE_LINE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Observable state of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokerState {
    Idle,
    HeadPending,
    HeadSent,
    Closed,
}

/// Response side of one request: stages the head and writes body bytes.
///
/// The application receives `&mut Responder`, so response-start calls can never
/// race with a flush; the last call before the first body write wins.
pub struct Responder<'w> {
    writer: &'w mut dyn Write,
    head: HeadBuffer,
    version: String,
    server_identity: String,
    body_bytes: u64,
    closed: bool,
}

impl<'w> Responder<'w> {
    /// `version` is echoed in the status line; `server_identity` fills the
    /// default `Server` header.
    pub fn new(
        writer: &'w mut dyn Write,
        version: impl Into<String>,
        server_identity: impl Into<String>,
    ) -> Self {
        Self {
            writer,
            head: HeadBuffer::Unsent,
            version: version.into(),
            server_identity: server_identity.into(),
            body_bytes: 0,
            closed: false,
        }
    }

    /// Protocol version used in the status line.
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    pub fn state(&self) -> InvokerState {
        if self.closed {
            return InvokerState::Closed;
        }
        match self.head {
            HeadBuffer::Unsent => InvokerState::Idle,
            HeadBuffer::Pending(_) => InvokerState::HeadPending,
            HeadBuffer::Sent => InvokerState::HeadSent,
        }
    }

    pub fn head_sent(&self) -> bool {
        self.head.is_sent()
    }

    /// Number of body bytes written so far.
    pub fn body_bytes(&self) -> u64 {
        self.body_bytes
    }

    /// Stage the response status (e.g. `"200 OK"`) and headers.
    ///
    /// Returns a writer for direct body output. Fails with
    /// [`ProtocolError::HeaderAfterSend`] once the head is on the wire.
    pub fn start_response<I, N, V>(
        &mut self,
        status: &str,
        headers: I,
    ) -> ProtocolResult<BodyWriter<'_, 'w>>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let headers = headers.into_iter().map(|(n, v)| (n.into(), v.into())).collect();
        let head = ResponseHead::new(&self.version, status, headers, &self.server_identity, Utc::now());

        if let Err(e) = self.head.stage(head) {
            tracing::error!(status, "Response started after headers were sent");
            return Err(e);
        }
        Ok(BodyWriter { responder: self })
    }

    /// Write one body chunk, flushing the staged head first if needed.
    /// Empty chunks are ignored.
    pub fn write(&mut self, chunk: &[u8]) -> ProtocolResult<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.flush_head()?;
        self.writer.write_all(chunk)?;
        self.body_bytes += chunk.len() as u64;
        Ok(())
    }

    /// Write the interim `100 Continue` response.
    pub fn send_continue(&mut self) -> ProtocolResult<()> {
        self.writer.write_all(CONTINUE_LINE)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Drain `body` to the wire, then make sure the head went out even if the
    /// body was empty. The body is closed exactly once on every path.
    pub fn drain(&mut self, body: Box<dyn ResponseBody + '_>) -> ProtocolResult<()> {
        {
            let mut body = CloseOnDrop(body);
            while let Some(chunk) = body.0.next_chunk() {
                self.write(&chunk?)?;
            }
        }

        self.flush_head()?;
        self.writer.flush()?;
        self.closed = true;
        Ok(())
    }

    /// Send a complete HTML error response. Only possible before the head is
    /// on the wire; any pending application head is replaced.
    pub fn send_error(&mut self, code: u16, message: &str) -> ProtocolResult<()> {
        let page = error_page(code, message).into_bytes();
        self.start_response(
            &status::status_line(code),
            [
                ("Content-Type", ERROR_CONTENT_TYPE.to_string()),
                ("Content-Length", page.len().to_string()),
            ],
        )?;
        self.write(&page)?;
        self.writer.flush()?;
        self.closed = true;
        Ok(())
    }

    fn flush_head(&mut self) -> ProtocolResult<()> {
        if let Some(head) = self.head.take_for_send()? {
            tracing::debug!(status = %head.status_line, "Sending response head");
            self.writer.write_all(&head.to_bytes())?;
        }
        Ok(())
    }
}

/// Direct body writer returned by [`Responder::start_response`].
pub struct BodyWriter<'r, 'w> {
    responder: &'r mut Responder<'w>,
}

impl BodyWriter<'_, '_> {
    /// Write a chunk immediately, bypassing the returned body.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> ProtocolResult<()> {
        self.responder.write(chunk)
    }
}

impl Write for BodyWriter<'_, '_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.responder.write(buf).map_err(into_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.responder.writer.flush()
    }
}

fn into_io(err: ProtocolError) -> io::Error {
    match err {
        ProtocolError::Io(e) => e,
        other => io::Error::other(other),
    }
}

struct CloseOnDrop<'b>(Box<dyn ResponseBody + 'b>);

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Call `app` once and stream its response through `responder`.
pub fn invoke(
    app: &dyn Application,
    environ: &mut Environ<'_>,
    responder: &mut Responder<'_>,
) -> ProtocolResult<()> {
    let body = app.call(environ, responder)?;
    responder.drain(body)
}
