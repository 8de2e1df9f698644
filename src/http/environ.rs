//! Per-request environment construction.
//!
//! # Responsibilities
//! - Expose the parsed request and connection context to the application
//! - Derive one `HTTP_*` key per request header
//! - Hand the application the request input and an error stream
//!
//! # Design Decisions
//! - Building the environment is a pure transform with no failure modes
//! - `CONTENT_TYPE` and `CONTENT_LENGTH` are stored without the `HTTP_` prefix
//! - An absolute-URI request target overrides the `Host` header

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;

use url::Url;

use crate::http::headers::HeaderSet;
use crate::http::request_line::{percent_decode, RequestLine};

/// Prefix for header-derived keys.
pub const HEADER_PREFIX: &str = "HTTP_";

/// Version of the gateway protocol advertised under `gateway.version`.
pub const GATEWAY_VERSION: (u32, u32) = (1, 0);

/// A single environment value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    Text(String),
    Flag(bool),
    Version(u32, u32),
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Text(s) => f.write_str(s),
            EnvValue::Flag(b) => write!(f, "{}", b),
            EnvValue::Version(major, minor) => write!(f, "({}, {})", major, minor),
        }
    }
}

impl From<&str> for EnvValue {
    fn from(s: &str) -> Self {
        EnvValue::Text(s.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(s: String) -> Self {
        EnvValue::Text(s)
    }
}

impl From<bool> for EnvValue {
    fn from(b: bool) -> Self {
        EnvValue::Flag(b)
    }
}

/// Connection-level facts the environment is built from.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Configured server host name.
    pub server_name: String,
    pub server_port: u16,
    pub remote_addr: SocketAddr,
    /// Server identity, reported as `SERVER_SOFTWARE`.
    pub server_software: String,
    pub url_scheme: String,
    pub multithread: bool,
    pub multiprocess: bool,
}

/// The request context handed to the application.
pub struct Environ<'a> {
    vars: BTreeMap<String, EnvValue>,
    input: &'a mut dyn BufRead,
    errors: ErrorStream,
}

impl<'a> Environ<'a> {
    /// Build the environment for one request.
    pub fn build(
        request: &RequestLine,
        headers: &HeaderSet,
        info: &ConnectionInfo,
        input: &'a mut dyn BufRead,
    ) -> Self {
        let mut vars = BTreeMap::new();
        let (path_info, query) = split_target(&request.raw_target);

        vars.insert("REQUEST_METHOD".into(), request.method.as_str().into());
        vars.insert("SCRIPT_NAME".into(), "".into());
        vars.insert("PATH_INFO".into(), path_info.into());
        vars.insert("QUERY_STRING".into(), query.into());
        vars.insert("SERVER_NAME".into(), info.server_name.as_str().into());
        vars.insert("SERVER_PORT".into(), info.server_port.to_string().into());
        vars.insert("SERVER_PROTOCOL".into(), request.version.as_str().into());
        vars.insert("SERVER_SOFTWARE".into(), info.server_software.as_str().into());
        vars.insert("REMOTE_ADDR".into(), info.remote_addr.ip().to_string().into());
        vars.insert("REMOTE_PORT".into(), info.remote_addr.port().to_string().into());
        vars.insert(
            "gateway.version".into(),
            EnvValue::Version(GATEWAY_VERSION.0, GATEWAY_VERSION.1),
        );
        vars.insert("gateway.url_scheme".into(), info.url_scheme.as_str().into());
        vars.insert("gateway.multithread".into(), info.multithread.into());
        vars.insert("gateway.multiprocess".into(), info.multiprocess.into());

        for (name, value) in headers.iter() {
            vars.insert(header_key(name), value.into());
        }

        if let Some(authority) = absolute_authority(&request.raw_target) {
            vars.insert(header_key("Host"), authority.into());
        }

        Self { vars, input, errors: ErrorStream::default() }
    }

    pub fn get(&self, key: &str) -> Option<&EnvValue> {
        self.vars.get(key)
    }

    /// Text value of `key`, if present and textual.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.vars.get(key) {
            Some(EnvValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.vars.get(key) {
            Some(EnvValue::Flag(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn method(&self) -> &str {
        self.text("REQUEST_METHOD").unwrap_or_default()
    }

    pub fn path_info(&self) -> &str {
        self.text("PATH_INFO").unwrap_or_default()
    }

    pub fn query_string(&self) -> &str {
        self.text("QUERY_STRING").unwrap_or_default()
    }

    /// Declared request body length, if any.
    pub fn content_length(&self) -> Option<u64> {
        self.text("CONTENT_LENGTH").and_then(|v| v.trim().parse().ok())
    }

    /// The request body stream, positioned after the header block.
    pub fn input(&mut self) -> &mut dyn BufRead {
        &mut *self.input
    }

    /// Stream for application diagnostics; lines end up in the server log.
    pub fn errors(&mut self) -> &mut ErrorStream {
        &mut self.errors
    }
}

impl fmt::Debug for Environ<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environ").field("vars", &self.vars).finish_non_exhaustive()
    }
}

/// `Content-Type` → `CONTENT_TYPE`, `X-Forwarded-For` → `HTTP_X_FORWARDED_FOR`.
pub fn header_key(name: &str) -> String {
    let key = name.to_ascii_uppercase().replace('-', "_");
    match key.as_str() {
        "CONTENT_TYPE" | "CONTENT_LENGTH" => key,
        _ => format!("{}{}", HEADER_PREFIX, key),
    }
}

/// Decoded path and raw query of a request target.
fn split_target(raw_target: &str) -> (String, String) {
    if let Some(url) = parse_absolute(raw_target) {
        return (
            percent_decode(url.path()).into_owned(),
            url.query().unwrap_or_default().to_string(),
        );
    }

    let (path, query) = raw_target.split_once('?').unwrap_or((raw_target, ""));
    (percent_decode(path).into_owned(), query.to_string())
}

fn parse_absolute(raw_target: &str) -> Option<Url> {
    Url::parse(raw_target).ok().filter(|url| url.has_host())
}

/// Authority of an absolute-URI target exactly as sent, if non-empty.
fn absolute_authority(raw_target: &str) -> Option<&str> {
    parse_absolute(raw_target)?;
    let (_, rest) = raw_target.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    Some(&rest[..end]).filter(|authority| !authority.is_empty())
}

/// Line-buffered writer that forwards application diagnostics to `tracing`.
#[derive(Debug, Default)]
pub struct ErrorStream {
    pending: Vec<u8>,
}

impl ErrorStream {
    fn emit(&mut self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let text = text.trim_end_matches(['\r', '\n']);
        if !text.is_empty() {
            tracing::error!(target: "qsonac::app", "{}", text);
        }
    }
}

impl Write for ErrorStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.emit(&line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let rest = std::mem::take(&mut self.pending);
        self.emit(&rest);
        Ok(())
    }
}

impl Drop for ErrorStream {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn info() -> ConnectionInfo {
        ConnectionInfo {
            server_name: "127.0.0.1".into(),
            server_port: 8080,
            remote_addr: "10.0.0.7:51234".parse().unwrap(),
            server_software: "qsonac/test".into(),
            url_scheme: "http".into(),
            multithread: true,
            multiprocess: false,
        }
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderSet {
        let mut set = HeaderSet::new();
        for (k, v) in pairs {
            set.insert(*k, *v);
        }
        set
    }

    #[test]
    fn fixed_protocol_keys() {
        let request = RequestLine::parse(b"GET /a%20b?x=1&y=%20 HTTP/1.1").unwrap();
        let mut input = Cursor::new(Vec::new());
        let env = Environ::build(&request, &HeaderSet::new(), &info(), &mut input);

        assert_eq!(env.method(), "GET");
        assert_eq!(env.path_info(), "/a b");
        assert_eq!(env.query_string(), "x=1&y=%20");
        assert_eq!(env.text("SCRIPT_NAME"), Some(""));
        assert_eq!(env.text("SERVER_NAME"), Some("127.0.0.1"));
        assert_eq!(env.text("SERVER_PORT"), Some("8080"));
        assert_eq!(env.text("SERVER_PROTOCOL"), Some("HTTP/1.1"));
        assert_eq!(env.text("SERVER_SOFTWARE"), Some("qsonac/test"));
        assert_eq!(env.text("REMOTE_ADDR"), Some("10.0.0.7"));
        assert_eq!(env.text("REMOTE_PORT"), Some("51234"));
        assert_eq!(env.get("gateway.version"), Some(&EnvValue::Version(1, 0)));
        assert_eq!(env.text("gateway.url_scheme"), Some("http"));
        assert_eq!(env.flag("gateway.multithread"), Some(true));
        assert_eq!(env.flag("gateway.multiprocess"), Some(false));
    }

    #[test]
    fn header_keys_are_derived() {
        let request = RequestLine::parse(b"POST /upload HTTP/1.1").unwrap();
        let set = headers(&[
            ("Content-Type", "text/plain"),
            ("Content-Length", "5"),
            ("X-Request-Id", "abc"),
            ("host", "example.com"),
        ]);
        let mut input = Cursor::new(Vec::new());
        let env = Environ::build(&request, &set, &info(), &mut input);

        assert_eq!(env.text("CONTENT_TYPE"), Some("text/plain"));
        assert_eq!(env.content_length(), Some(5));
        assert_eq!(env.text("HTTP_X_REQUEST_ID"), Some("abc"));
        assert_eq!(env.text("HTTP_HOST"), Some("example.com"));
        assert!(env.get("HTTP_CONTENT_TYPE").is_none());
    }

    #[test]
    fn absolute_uri_sets_host() {
        let request =
            RequestLine::parse(b"GET http://origin.example:8081/p/q?z=9 HTTP/1.1").unwrap();
        let set = headers(&[("Host", "proxy.example")]);
        let mut input = Cursor::new(Vec::new());
        let env = Environ::build(&request, &set, &info(), &mut input);

        assert_eq!(env.text("HTTP_HOST"), Some("origin.example:8081"));
        assert_eq!(env.path_info(), "/p/q");
        assert_eq!(env.query_string(), "z=9");
    }

    #[test]
    fn absolute_uri_host_is_kept_as_sent() {
        let request =
            RequestLine::parse(b"GET http://User@Origin.Example:80/p HTTP/1.1").unwrap();
        let mut input = Cursor::new(Vec::new());
        let env = Environ::build(&request, &HeaderSet::new(), &info(), &mut input);
        assert_eq!(env.text("HTTP_HOST"), Some("User@Origin.Example:80"));
        assert_eq!(env.path_info(), "/p");
    }

    #[test]
    fn empty_authority_keeps_host_header() {
        let request = RequestLine::parse(b"GET file:///x HTTP/1.1").unwrap();
        let set = headers(&[("Host", "local.example")]);
        let mut input = Cursor::new(Vec::new());
        let env = Environ::build(&request, &set, &info(), &mut input);
        assert_eq!(env.text("HTTP_HOST"), Some("local.example"));
    }

    #[test]
    fn input_is_the_remaining_stream() {
        let request = RequestLine::parse(b"POST / HTTP/1.1").unwrap();
        let mut input = Cursor::new(b"hello".to_vec());
        let mut env = Environ::build(&request, &HeaderSet::new(), &info(), &mut input);

        let mut body = String::new();
        env.input().read_to_string(&mut body).unwrap();
        assert_eq!(body, "hello");
    }

    #[test]
    fn header_key_rules() {
        assert_eq!(header_key("content-type"), "CONTENT_TYPE");
        assert_eq!(header_key("Content-Length"), "CONTENT_LENGTH");
        assert_eq!(header_key("Accept-Encoding"), "HTTP_ACCEPT_ENCODING");
    }

    #[test]
    fn error_stream_accepts_partial_lines() {
        let mut errors = ErrorStream::default();
        errors.write_all(b"first line\nsecond ").unwrap();
        errors.write_all(b"half\n").unwrap();
        assert!(errors.pending.is_empty());
        errors.write_all(b"tail").unwrap();
        errors.flush().unwrap();
        assert!(errors.pending.is_empty());
    }
}
