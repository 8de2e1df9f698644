//! Bounded line reading for the request head.

use std::io::{self, BufRead, Read};

/// Maximum bytes read for a single request or header line.
pub const MAX_LINE_BYTES: usize = 65536;

/// Outcome of one bounded line read.
#[derive(Debug, PartialEq, Eq)]
pub enum Line {
    /// A line with its terminator (`\n` or `\r\n`) removed. A final line cut
    /// short by end of stream is returned as-is.
    Complete(Vec<u8>),
    /// The peer closed the stream before sending anything.
    Eof,
    /// `limit` bytes were read without finding a terminator.
    TooLong,
}

/// Read one line, consuming at most `limit` bytes from `reader`.
pub fn read_line<R: BufRead + ?Sized>(reader: &mut R, limit: usize) -> io::Result<Line> {
    let mut buf = Vec::new();
    let mut limited = (&mut *reader).take(limit as u64);
    let n = limited.read_until(b'\n', &mut buf)?;

    if n == 0 {
        return Ok(Line::Eof);
    }
    if buf.last() != Some(&b'\n') {
        if n >= limit {
            return Ok(Line::TooLong);
        }
        return Ok(Line::Complete(buf));
    }

    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(Line::Complete(buf))
}

/// Decode head bytes as ISO-8859-1; every byte maps to one char.
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
