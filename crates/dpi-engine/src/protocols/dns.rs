//! DNS dissector
//!
//! Decodes the fixed 12-byte header and walks the first question name. The
//! header must be structurally consistent before the payload is accepted as
//! DNS; a bare length check would swallow every 12-byte-plus payload ahead of
//! the dissectors that run later in the chain.

use super::{Dissection, ProtocolData, Protocol, DISSECTOR_CONFIDENCE};

/// DNS header length
const HEADER_LEN: usize = 12;

/// Upper bound on questions in a single message we accept as plausible
const MAX_QDCOUNT: u16 = 32;

/// Parsed DNS record stored on the session
#[derive(Debug, Clone, Default)]
pub struct DnsData {
    /// Transaction ID
    pub transaction_id: u16,
    /// QR bit clear
    pub is_query: bool,
    /// RCODE from the low flags nibble
    pub response_code: u8,
    /// First question name, when parseable
    pub qname: Option<String>,
}

/// Dissect a payload as DNS
pub fn dissect(payload: &[u8]) -> Dissection {
    if payload.len() < HEADER_LEN {
        return Dissection::Malformed;
    }

    let flags = u16::from_be_bytes([payload[2], payload[3]]);
    let qdcount = u16::from_be_bytes([payload[4], payload[5]]);
    let ancount = u16::from_be_bytes([payload[6], payload[7]]);

    let is_query = (payload[2] & 0x80) == 0;
    let opcode = ((flags >> 11) & 0x0F) as u8;
    let z_bits = flags & 0x0070;

    // Plausibility gate: reserved bits clear, known opcode, sane question
    // count, and queries carry no answers.
    if opcode > 5 || z_bits != 0 {
        return Dissection::NoMatch;
    }
    if qdcount == 0 || qdcount > MAX_QDCOUNT {
        return Dissection::NoMatch;
    }
    if is_query && ancount != 0 {
        return Dissection::NoMatch;
    }

    let data = DnsData {
        transaction_id: u16::from_be_bytes([payload[0], payload[1]]),
        is_query,
        response_code: payload[3] & 0x0F,
        qname: parse_name(payload, HEADER_LEN),
    };

    Dissection::Match {
        protocol: Protocol::Dns,
        confidence: DISSECTOR_CONFIDENCE,
        data: ProtocolData::Dns(data),
    }
}

/// Walk uncompressed labels starting at `start`
///
/// Question names in the section we read are never compressed; a pointer
/// label aborts the walk rather than chasing offsets.
fn parse_name(data: &[u8], start: usize) -> Option<String> {
    let mut pos = start;
    let mut labels: Vec<String> = Vec::new();

    loop {
        let len = *data.get(pos)? as usize;

        if len == 0 {
            break;
        }

        // Compression pointer or reserved label type
        if len & 0xC0 != 0 {
            return None;
        }

        pos += 1;
        let label = data.get(pos..pos + len)?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        pos += len;

        if labels.iter().map(|l| l.len() + 1).sum::<usize>() > 253 {
            return None;
        }
    }

    if labels.is_empty() {
        None
    } else {
        Some(labels.join("."))
    }
}
