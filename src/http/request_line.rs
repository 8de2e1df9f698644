//! Request-line parsing.
//!
//! # Responsibilities
//! - Split `<method> <target> <version>` on runs of whitespace
//! - Percent-decode the target into the request path
//! - Reject anything that is not exactly three tokens with an `HTTP/` version

use std::borrow::Cow;

use crate::http::error::{ProtocolError, ProtocolResult};
use crate::http::line::latin1;

const VERSION_PREFIX: &str = "HTTP/";

/// The decomposed first line of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    /// Percent-decoded request target.
    pub path: String,
    pub version: String,
    /// Request target exactly as sent, still percent-encoded.
    pub raw_target: String,
}

impl RequestLine {
    /// Parse a request line whose terminator has already been stripped.
    pub fn parse(raw: &[u8]) -> ProtocolResult<Self> {
        let line = latin1(raw);
        let mut fields = line.split_whitespace();

        let (Some(method), Some(target), Some(version), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(ProtocolError::MalformedRequestLine(line));
        };

        if !version.starts_with(VERSION_PREFIX) {
            return Err(ProtocolError::MalformedRequestLine(line));
        }

        Ok(Self {
            method: method.to_string(),
            path: percent_decode(target).into_owned(),
            version: version.to_string(),
            raw_target: target.to_string(),
        })
    }
}

/// Percent-decode, replacing invalid UTF-8 rather than rejecting it.
pub fn percent_decode(encoded: &str) -> Cow<'_, str> {
    match urlencoding::decode_binary(encoded.as_bytes()) {
        Cow::Borrowed(_) => Cow::Borrowed(encoded),
        Cow::Owned(bytes) => Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()),
    }
}
