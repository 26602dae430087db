//! Protocol anomaly detector
//!
//! Cheap per-packet checks for protocol-behavior deviations. Findings are
//! recorded on the session (capped) and surfaced as alerts with rule id 0.

use crate::protocols::Protocol;
use dpi_common::FlowKey;
use memchr::memmem;

/// HTTP header block larger than expected
pub const OVERSIZED_HEADER: u16 = 0x0001;
/// Explicit User-Agent header observed
pub const SUSPICIOUS_USER_AGENT: u16 = 0x0002;
/// HTTP on a port outside {80, 8080}
pub const NON_STANDARD_PORT: u16 = 0x0004;

/// Largest HTTP packet we accept before flagging the header block
const MAX_HTTP_PACKET: usize = 8192;

/// Ports where plain HTTP is expected
const HTTP_PORTS: [u16; 2] = [80, 8080];

/// One detected deviation, pre-alert
#[derive(Debug, Clone)]
pub struct Finding {
    /// Kind bit (one of the module constants)
    pub kind: u16,
    /// Stable name; alerts carry it as `anomaly:<name>`
    pub name: &'static str,
    /// Description (≤256 chars)
    pub description: String,
    /// Severity 0..=10
    pub severity: u8,
}

/// Run the baseline checks for one packet
pub fn inspect(protocol: Protocol, key: &FlowKey, payload: &[u8]) -> Vec<Finding> {
    let mut findings = Vec::new();

    if protocol == Protocol::Http {
        if payload.len() > MAX_HTTP_PACKET {
            findings.push(Finding {
                kind: OVERSIZED_HEADER,
                name: "http_oversized_header",
                description: format!("oversized HTTP packet ({} bytes)", payload.len()),
                severity: 5,
            });
        }

        if memmem::find(payload, b"User-Agent: ").is_some() {
            findings.push(Finding {
                kind: SUSPICIOUS_USER_AGENT,
                name: "http_suspicious_user_agent",
                description: "explicit User-Agent header".to_string(),
                severity: 3,
            });
        }

        if !HTTP_PORTS.contains(&key.dst_port) {
            findings.push(Finding {
                kind: NON_STANDARD_PORT,
                name: "http_non_standard_port",
                description: format!("HTTP on non-standard port {}", key.dst_port),
                severity: 4,
            });
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(dst_port: u16) -> FlowKey {
        FlowKey::new(0x0A000001, 0x0A000002, 54321, dst_port, 6)
    }

    #[test]
    fn test_clean_http_request() {
        let findings = inspect(Protocol::Http, &key(80), b"GET / HTTP/1.1\r\n\r\n");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_non_standard_port() {
        let findings = inspect(Protocol::Http, &key(8443), b"GET / HTTP/1.1\r\n\r\n");

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, NON_STANDARD_PORT);
        assert_eq!(findings[0].name, "http_non_standard_port");
        assert_eq!(findings[0].severity, 4);

        assert!(inspect(Protocol::Http, &key(8080), b"GET / HTTP/1.1\r\n\r\n").is_empty());
    }

    #[test]
    fn test_user_agent() {
        let findings = inspect(
            Protocol::Http,
            &key(80),
            b"GET / HTTP/1.1\r\nUser-Agent: curl/8.0\r\n\r\n",
        );

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, SUSPICIOUS_USER_AGENT);
        assert_eq!(findings[0].severity, 3);
    }

    #[test]
    fn test_oversized_packet() {
        let mut payload = b"POST /upload HTTP/1.1\r\n".to_vec();
        payload.resize(9000, b'A');

        let findings = inspect(Protocol::Http, &key(80), &payload);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, OVERSIZED_HEADER);
        assert_eq!(findings[0].severity, 5);
    }

    #[test]
    fn test_other_protocols_ignored() {
        assert!(inspect(Protocol::Dns, &key(9999), b"User-Agent: x").is_empty());
        assert!(inspect(Protocol::Unknown, &key(9999), b"User-Agent: x").is_empty());
    }
}
