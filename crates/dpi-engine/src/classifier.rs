//! Protocol classifier
//!
//! Runs the dissector chain in a fixed order and falls back to well-known
//! ports. Only consulted while a session is still `Unknown`; the first match
//! wins and is frozen for the life of the session.

use crate::protocols::{self, Dissection, Protocol, ProtocolData, PORT_CONFIDENCE};
use dpi_common::FlowKey;

/// Stateless dissector-chain driver
pub struct Classifier;

impl Classifier {
    /// Classify a payload: dissectors first (HTTP, DNS, TLS, SMTP, SMB),
    /// then the port table at reduced confidence
    pub fn classify(
        key: &FlowKey,
        payload: &[u8],
        inspect_tls: bool,
    ) -> Option<(Protocol, u8, ProtocolData)> {
        // Malformed counts as a decline while the session is unclassified
        Self::hit(protocols::http::dissect(payload))
            .or_else(|| Self::hit(protocols::dns::dissect(payload)))
            .or_else(|| Self::hit(protocols::tls::dissect(payload, inspect_tls)))
            .or_else(|| Self::hit(protocols::smtp::dissect(payload)))
            .or_else(|| Self::hit(protocols::smb::dissect(payload)))
            .or_else(|| match Self::port_protocol(key) {
                Protocol::Unknown => None,
                protocol => Some((protocol, PORT_CONFIDENCE, ProtocolData::None)),
            })
    }

    #[inline]
    fn hit(outcome: Dissection) -> Option<(Protocol, u8, ProtocolData)> {
        match outcome {
            Dissection::Match {
                protocol,
                confidence,
                data,
            } => Some((protocol, confidence, data)),
            _ => None,
        }
    }

    /// Port heuristic over either side of the tuple
    pub fn port_protocol(key: &FlowKey) -> Protocol {
        match Protocol::from_port(key.dst_port) {
            Protocol::Unknown => Protocol::from_port(key.src_port),
            protocol => protocol,
        }
    }

    /// Re-run the one dissector matching an already classified session
    ///
    /// Used to spot malformed parses (and pick up late protocol data, e.g. a
    /// response status) once the protocol is frozen.
    pub fn redissect(protocol: Protocol, payload: &[u8], inspect_tls: bool) -> Dissection {
        match protocol {
            Protocol::Http => protocols::http::dissect(payload),
            Protocol::Dns => protocols::dns::dissect(payload),
            Protocol::Https => protocols::tls::dissect(payload, inspect_tls),
            Protocol::Smtp => protocols::smtp::dissect(payload),
            Protocol::Smb => protocols::smb::dissect(payload),
            _ => Dissection::NoMatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(dst_port: u16) -> FlowKey {
        FlowKey::new(0x0A000001, 0x0A000002, 54321, dst_port, 6)
    }

    #[test]
    fn test_dissector_beats_port() {
        // DNS payload on port 80 still classifies as DNS
        let pkt = [
            0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00,
        ];
        let (protocol, confidence, _) =
            Classifier::classify(&key(80), &pkt, false).unwrap();

        assert_eq!(protocol, Protocol::Dns);
        assert_eq!(confidence, 80);
    }

    #[test]
    fn test_chain_order_http_first() {
        let (protocol, _, data) = Classifier::classify(
            &key(53),
            b"GET / HTTP/1.1\r\n\r\n",
            false,
        )
        .unwrap();

        assert_eq!(protocol, Protocol::Http);
        assert!(matches!(data, ProtocolData::Http(_)));
    }

    #[test]
    fn test_port_fallback() {
        let (protocol, confidence, data) =
            Classifier::classify(&key(22), b"\x00\x00\x00\x00\x00", false).unwrap();

        assert_eq!(protocol, Protocol::Ssh);
        assert_eq!(confidence, PORT_CONFIDENCE);
        assert!(matches!(data, ProtocolData::None));
    }

    #[test]
    fn test_port_fallback_source_side() {
        let k = FlowKey::new(0x0A000001, 0x0A000002, 53, 40000, 17);
        let (protocol, confidence, _) =
            Classifier::classify(&k, b"\xde\xad\xbe\xef", false).unwrap();

        assert_eq!(protocol, Protocol::Dns);
        assert_eq!(confidence, PORT_CONFIDENCE);
    }

    #[test]
    fn test_unclassifiable() {
        assert!(Classifier::classify(&key(40000), b"\x00\x01\x02", false).is_none());
    }

    #[test]
    fn test_redissect_malformed() {
        assert!(matches!(
            Classifier::redissect(Protocol::Dns, b"\x00\x01", false),
            Dissection::Malformed
        ));
        assert!(matches!(
            Classifier::redissect(Protocol::Http, b"body bytes", false),
            Dissection::NoMatch
        ));
    }
}
