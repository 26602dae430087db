//! HTTP dissector
//!
//! Recognizes requests by method prefix and responses by the `HTTP/` version
//! prefix, and extracts the request line plus a few headers of interest.

use super::{Dissection, ProtocolData, Protocol, DISSECTOR_CONFIDENCE};

/// Request methods the dissector recognizes (trailing space included)
const METHODS: [&[u8]; 7] = [
    b"GET ", b"POST ", b"PUT ", b"DELETE ", b"HEAD ", b"OPTIONS ", b"PATCH ",
];

/// Parsed HTTP record stored on the session
#[derive(Debug, Clone, Default)]
pub struct HttpData {
    /// Request method (empty for responses)
    pub method: String,
    /// Request target (empty for responses)
    pub path: String,
    /// Response status code (0 until a response is seen)
    pub status_code: u16,
    /// Whether the dissected packet was a request
    pub is_request: bool,
    /// `Host:` header value, if present
    pub host: Option<String>,
    /// `User-Agent:` header value, if present
    pub user_agent: Option<String>,
}

/// Dissect a payload as HTTP
pub fn dissect(payload: &[u8]) -> Dissection {
    if payload.starts_with(b"HTTP/") {
        return match parse_status(payload) {
            Some(status) => found(HttpData {
                status_code: status,
                is_request: false,
                ..Default::default()
            }),
            None => Dissection::Malformed,
        };
    }

    for method in METHODS {
        if payload.starts_with(method) {
            let method = String::from_utf8_lossy(&method[..method.len() - 1]).into_owned();
            return found(HttpData {
                method,
                path: request_path(payload),
                is_request: true,
                host: header_value(payload, b"Host:"),
                user_agent: header_value(payload, b"User-Agent:"),
                ..Default::default()
            });
        }
    }

    Dissection::NoMatch
}

fn found(data: HttpData) -> Dissection {
    Dissection::Match {
        protocol: Protocol::Http,
        confidence: DISSECTOR_CONFIDENCE,
        data: ProtocolData::Http(data),
    }
}

/// Status code after the first space of `HTTP/x.y NNN ...`
fn parse_status(payload: &[u8]) -> Option<u16> {
    let space = payload.iter().position(|&b| b == b' ')?;
    let digits = payload.get(space + 1..space + 4)?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Second token of the request line, bounded to the first line
fn request_path(payload: &[u8]) -> String {
    let first = payload.iter().position(|&b| b == b' ').map(|p| p + 1);
    let Some(start) = first else {
        return String::new();
    };
    let rest = &payload[start..];
    let end = rest
        .iter()
        .position(|&b| b == b' ' || b == b'\r' || b == b'\n')
        .unwrap_or(rest.len());
    String::from_utf8_lossy(&rest[..end]).into_owned()
}

/// Case-insensitive header scan over CRLF-separated lines
fn header_value(payload: &[u8], name: &[u8]) -> Option<String> {
    for line in payload.split(|&b| b == b'\n') {
        if line.len() < name.len() {
            continue;
        }
        if line[..name.len()].eq_ignore_ascii_case(name) {
            let value = &line[name.len()..];
            let value = String::from_utf8_lossy(value);
            let value = value.trim_matches(|c: char| c == '\r' || c == ' ' || c == '\t');
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}
