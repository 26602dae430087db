//! Protocol Dissectors
//!
//! Pure functions over a payload slice. Each dissector either recognizes its
//! protocol and extracts a small record, declines, or reports a malformed
//! parse. Dissectors never panic on truncated input.

pub mod dns;
pub mod http;
pub mod smb;
pub mod smtp;
pub mod tls;

pub use dns::DnsData;
pub use http::HttpData;
pub use tls::TlsData;

use serde::{Deserialize, Serialize};

/// Confidence assigned to a dissector match
pub const DISSECTOR_CONFIDENCE: u8 = 80;

/// Confidence assigned to a port-table fallback
pub const PORT_CONFIDENCE: u8 = 50;

/// Application-layer protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Protocol {
    /// Not yet classified
    Unknown = 0,
    /// Plain HTTP
    Http,
    /// TLS (any record-layer traffic)
    Https,
    /// DNS
    Dns,
    /// SMTP
    Smtp,
    /// SMTP over TLS
    Smtps,
    /// FTP control
    Ftp,
    /// FTP over TLS
    Ftps,
    /// SMB/CIFS
    Smb,
    /// SSH
    Ssh,
    /// Telnet
    Telnet,
    /// SNMP
    Snmp,
    /// QUIC
    Quic,
    /// DTLS
    Dtls,
    /// MQTT
    Mqtt,
    /// CoAP
    Coap,
}

impl Protocol {
    /// Number of protocol variants (for per-protocol counters)
    pub const COUNT: usize = 16;

    /// Index into per-protocol counter arrays
    #[inline(always)]
    pub const fn index(&self) -> usize {
        *self as usize
    }

    /// Well-known port heuristic; `Unknown` when the port is unmapped
    pub const fn from_port(port: u16) -> Self {
        match port {
            80 => Self::Http,
            443 => Self::Https,
            53 => Self::Dns,
            25 | 587 => Self::Smtp,
            465 => Self::Smtps,
            21 => Self::Ftp,
            990 => Self::Ftps,
            445 => Self::Smb,
            22 => Self::Ssh,
            23 => Self::Telnet,
            161 => Self::Snmp,
            _ => Self::Unknown,
        }
    }

    /// Short lowercase name
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Http => "http",
            Self::Https => "https",
            Self::Dns => "dns",
            Self::Smtp => "smtp",
            Self::Smtps => "smtps",
            Self::Ftp => "ftp",
            Self::Ftps => "ftps",
            Self::Smb => "smb",
            Self::Ssh => "ssh",
            Self::Telnet => "telnet",
            Self::Snmp => "snmp",
            Self::Quic => "quic",
            Self::Dtls => "dtls",
            Self::Mqtt => "mqtt",
            Self::Coap => "coap",
        }
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self::Unknown
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extracted protocol record carried by a dissector match
#[derive(Debug, Clone)]
pub enum ProtocolData {
    /// HTTP request/response record
    Http(HttpData),
    /// DNS header record
    Dns(DnsData),
    /// TLS record-layer record
    Tls(TlsData),
    /// Nothing extracted (SMTP, SMB, port fallback)
    None,
}

/// Dissector outcome
#[derive(Debug, Clone)]
pub enum Dissection {
    /// Recognized; classification and extracted data
    Match {
        /// Classified protocol
        protocol: Protocol,
        /// Confidence 0..=100
        confidence: u8,
        /// Extracted record
        data: ProtocolData,
    },
    /// Not this protocol
    NoMatch,
    /// Carries this protocol's signature but the structure is broken
    Malformed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_table() {
        assert_eq!(Protocol::from_port(80), Protocol::Http);
        assert_eq!(Protocol::from_port(443), Protocol::Https);
        assert_eq!(Protocol::from_port(53), Protocol::Dns);
        assert_eq!(Protocol::from_port(25), Protocol::Smtp);
        assert_eq!(Protocol::from_port(587), Protocol::Smtp);
        assert_eq!(Protocol::from_port(465), Protocol::Smtps);
        assert_eq!(Protocol::from_port(22), Protocol::Ssh);
        assert_eq!(Protocol::from_port(8080), Protocol::Unknown);
    }

    #[test]
    fn test_display() {
        assert_eq!(Protocol::Https.to_string(), "https");
        assert_eq!(Protocol::Unknown.to_string(), "unknown");
    }
}
