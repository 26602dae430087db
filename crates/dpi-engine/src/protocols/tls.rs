//! TLS dissector
//!
//! Record-layer recognition only; the engine never decrypts. When ClientHello
//! inspection is enabled the SNI extension is pulled out of complete
//! handshake records.

use super::{Dissection, ProtocolData, Protocol, DISSECTOR_CONFIDENCE};

/// Record content types we accept: alert, handshake, application data
const CONTENT_TYPES: [u8; 3] = [0x15, 0x16, 0x17];

/// ClientHello handshake message type
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;

/// SNI extension number
const EXT_SERVER_NAME: u16 = 0x0000;

/// Parsed TLS record stored on the session
#[derive(Debug, Clone, Default)]
pub struct TlsData {
    /// Record content type
    pub content_type: u8,
    /// Record-layer major version
    pub version_major: u8,
    /// Record-layer minor version
    pub version_minor: u8,
    /// Server Name Indication from a ClientHello, when inspected
    pub sni: Option<String>,
}

/// Dissect a payload as a TLS record
///
/// `inspect_hello` additionally walks a complete ClientHello for SNI.
pub fn dissect(payload: &[u8], inspect_hello: bool) -> Dissection {
    if payload.len() < 5 {
        return Dissection::NoMatch;
    }

    let content_type = payload[0];
    if !CONTENT_TYPES.contains(&content_type) {
        return Dissection::NoMatch;
    }

    let version_major = payload[1];
    let version_minor = payload[2];
    if version_major != 0x03 || !(0x01..=0x04).contains(&version_minor) {
        return Dissection::Malformed;
    }

    let sni = if inspect_hello && content_type == 0x16 {
        parse_sni(payload)
    } else {
        None
    };

    Dissection::Match {
        protocol: Protocol::Https,
        confidence: DISSECTOR_CONFIDENCE,
        data: ProtocolData::Tls(TlsData {
            content_type,
            version_major,
            version_minor,
            sni,
        }),
    }
}

/// Best-effort SNI extraction from a complete ClientHello record
fn parse_sni(payload: &[u8]) -> Option<String> {
    let record_len = u16::from_be_bytes([payload[3], payload[4]]) as usize;
    let record = payload.get(5..5 + record_len)?;

    if *record.first()? != HANDSHAKE_CLIENT_HELLO {
        return None;
    }

    // Handshake header (4) + client version (2) + random (32)
    let mut pos = 4 + 2 + 32;

    // Session ID
    let sid_len = *record.get(pos)? as usize;
    pos += 1 + sid_len;

    // Cipher suites
    let cs_len =
        u16::from_be_bytes([*record.get(pos)?, *record.get(pos + 1)?]) as usize;
    pos += 2 + cs_len;

    // Compression methods
    let comp_len = *record.get(pos)? as usize;
    pos += 1 + comp_len;

    // Extensions
    let ext_total =
        u16::from_be_bytes([*record.get(pos)?, *record.get(pos + 1)?]) as usize;
    pos += 2;
    let mut ext = record.get(pos..pos + ext_total)?;

    while ext.len() >= 4 {
        let ext_type = u16::from_be_bytes([ext[0], ext[1]]);
        let ext_len = u16::from_be_bytes([ext[2], ext[3]]) as usize;
        let body = ext.get(4..4 + ext_len)?;

        if ext_type == EXT_SERVER_NAME {
            // server_name_list length (2), name type (1), name length (2)
            let name_len =
                u16::from_be_bytes([*body.get(3)?, *body.get(4)?]) as usize;
            let name = body.get(5..5 + name_len)?;
            return std::str::from_utf8(name).ok().map(str::to_string);
        }

        ext = &ext[4 + ext_len..];
    }

    None
}
