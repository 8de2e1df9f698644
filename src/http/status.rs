//! Status-code table.

/// Reason phrase for a status code, or `"Unknown"` for unlisted codes.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        413 => "Payload Too Large",
        414 => "Request-URI Too Long",
        415 => "Unsupported Media Type",
        417 => "Expectation Failed",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}

/// Longer human-readable description used on error pages.
pub fn explanation(code: u16) -> &'static str {
    match code {
        400 => "Bad request syntax or unsupported method",
        408 => "Request timed out; try again later",
        414 => "URI is too long",
        431 => "Request header fields are too large",
        500 => "Server got itself in trouble",
        _ => reason_phrase(code),
    }
}

/// `"<code> <reason>"`, the form response-start expects.
pub fn status_line(code: u16) -> String {
    format!("{} {}", code, reason_phrase(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes() {
        assert_eq!(status_line(200), "200 OK");
        assert_eq!(status_line(414), "414 Request-URI Too Long");
        assert_eq!(reason_phrase(408), "Request Timeout");
    }

    #[test]
    fn unknown_code_falls_back() {
        assert_eq!(reason_phrase(599), "Unknown");
        assert_eq!(explanation(599), "Unknown");
    }
}
