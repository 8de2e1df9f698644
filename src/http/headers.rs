//! Request header block parsing.
//!
//! # Responsibilities
//! - Read `<name>:<value>` lines until the blank line that ends the head
//! - Enforce the header line count and line length limits
//! - Skip malformed lines instead of failing the request
//!
//! # Design Decisions
//! - Only the first colon separates name from value; later colons stay in the
//!   value (times of day, absolute URIs)
//! - Duplicate names keep their first position but take the last value
//! - Lookups are case-insensitive, storage keeps the name as sent

use std::io::BufRead;

use indexmap::IndexMap;

use crate::http::error::{ProtocolError, ProtocolResult};
use crate::http::line::{latin1, read_line, Line, MAX_LINE_BYTES};

/// Maximum number of lines consumed for the header block, blank line included.
pub const MAX_HEADERS: usize = 30;

/// Ordered mapping of request header names to values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet(IndexMap<String, String>);

impl HeaderSet {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Insert a header, replacing the value of an identical name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Case-insensitive lookup; the most recently stored match wins.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the client asked for an interim `100 Continue`.
    pub fn expects_continue(&self) -> bool {
        self.get("Expect")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("100-continue"))
    }

    /// Parse the header block from `reader`, leaving it positioned at the body.
    pub fn parse<R: BufRead + ?Sized>(reader: &mut R) -> ProtocolResult<Self> {
        let mut headers = Self::new();

        for _ in 0..MAX_HEADERS {
            let raw = match read_line(reader, MAX_LINE_BYTES)? {
                Line::Eof => return Ok(headers),
                Line::TooLong => {
                    return Err(ProtocolError::RequestLineTooLong { limit: MAX_LINE_BYTES })
                }
                Line::Complete(raw) => raw,
            };

            // Only a truly empty line ends the block; whitespace is a bad header.
            if raw.is_empty() {
                return Ok(headers);
            }

            let line = latin1(&raw);
            match split_header(line.trim()) {
                Ok((name, value)) => headers.insert(name, value),
                Err(e) => tracing::debug!(error = %e, "Skipping header line"),
            }
        }

        Err(ProtocolError::TooManyHeaders { limit: MAX_HEADERS })
    }
}

fn split_header(line: &str) -> ProtocolResult<(&str, &str)> {
    line.split_once(':')
        .map(|(name, value)| (name, value.trim()))
        .ok_or_else(|| ProtocolError::MalformedHeaderLine(line.to_string()))
}
