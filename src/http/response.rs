//! Response head staging and serialization.
//!
//! # Responsibilities
//! - Hold the status line and headers until the first body byte is written
//! - Inject default `Connection`, `Server` and `Date` headers when absent
//! - Render the minimal HTML error page used for protocol failures
//!
//! # States
//! ```text
//! Unsent → Pending(head) → Sent
//!            ↺ (response-start again overwrites the head)
//! ```

use chrono::{DateTime, Utc};

use crate::http::error::{ProtocolError, ProtocolResult};
use crate::http::status;

/// Content type of generated error pages.
pub const ERROR_CONTENT_TYPE: &str = "text/html;charset=utf-8";

/// Status line and headers of a response that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// Full status line without terminator, e.g. `HTTP/1.1 200 OK`.
    pub status_line: String,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// Build a head for `version` and `status`, adding default headers the
    /// application did not supply.
    pub fn new(
        version: &str,
        status: &str,
        headers: Vec<(String, String)>,
        server_identity: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let mut head = Self { status_line: format!("{} {}", version, status), headers };

        if !head.has_header("Content-Length") {
            head.push_if_absent("Connection", "close");
        }
        head.push_if_absent("Server", server_identity);
        head.push_if_absent("Date", &http_date(now));
        head
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn push_if_absent(&mut self, name: &str, value: &str) {
        if !self.has_header(name) {
            self.headers.push((name.to_string(), value.to_string()));
        }
    }

    /// Wire form: status line, header lines, blank line. Encoded as ISO-8859-1;
    /// characters outside it are replaced with `?`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut text = String::with_capacity(64 + self.headers.len() * 32);
        text.push_str(&self.status_line);
        text.push_str("\r\n");
        for (name, value) in &self.headers {
            text.push_str(name);
            text.push_str(": ");
            text.push_str(value);
            text.push_str("\r\n");
        }
        text.push_str("\r\n");

        text.chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
            .collect()
    }
}

/// Staging state of the response head for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HeadBuffer {
    /// Response-start has not been called.
    #[default]
    Unsent,
    /// Head staged and still replaceable.
    Pending(ResponseHead),
    /// Head written to the wire; no further changes accepted.
    Sent,
}

impl HeadBuffer {
    /// Stage `head`, replacing any earlier pending head.
    pub fn stage(&mut self, head: ResponseHead) -> ProtocolResult<()> {
        if self.is_sent() {
            return Err(ProtocolError::HeaderAfterSend);
        }
        *self = HeadBuffer::Pending(head);
        Ok(())
    }

    /// Take the pending head for writing and mark it sent.
    ///
    /// Returns `Ok(None)` when the head is already on the wire.
    pub fn take_for_send(&mut self) -> ProtocolResult<Option<ResponseHead>> {
        match std::mem::replace(self, HeadBuffer::Sent) {
            HeadBuffer::Pending(head) => Ok(Some(head)),
            HeadBuffer::Sent => Ok(None),
            HeadBuffer::Unsent => {
                *self = HeadBuffer::Unsent;
                Err(ProtocolError::ResponseNotStarted)
            }
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, HeadBuffer::Sent)
    }

    pub fn pending(&self) -> Option<&ResponseHead> {
        match self {
            HeadBuffer::Pending(head) => Some(head),
            _ => None,
        }
    }
}

/// RFC 7231 IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Minimal HTML page describing an error status.
pub fn error_page(code: u16, message: &str) -> String {
    format!(
        "<!DOCTYPE HTML>\n\
         <html>\n\
         <head>\n\
         <meta http-equiv=\"Content-Type\" content=\"{content_type}\">\n\
         <title>Error response</title>\n\
         </head>\n\
         <body>\n\
         <h1>Error response</h1>\n\
         <p>Error code: {code}</p>\n\
         <p>Message: {message}.</p>\n\
         <p>Error code explanation: {code} - {explain}.</p>\n\
         </body>\n\
         </html>\n",
        content_type = ERROR_CONTENT_TYPE,
        code = code,
        message = escape_html(message),
        explain = status::explanation(code),
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
