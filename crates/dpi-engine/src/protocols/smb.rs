//! SMB dissector
//!
//! Matches the SMB1 (`\xFFSMB`) and SMB2/3 (`\xFESMB`) header magics.

use super::{Dissection, ProtocolData, Protocol, DISSECTOR_CONFIDENCE};

/// Dissect a payload as SMB
pub fn dissect(payload: &[u8]) -> Dissection {
    if payload.len() >= 4
        && (payload[0] == 0xFF || payload[0] == 0xFE)
        && &payload[1..4] == b"SMB"
    {
        return Dissection::Match {
            protocol: Protocol::Smb,
            confidence: DISSECTOR_CONFIDENCE,
            data: ProtocolData::None,
        };
    }

    Dissection::NoMatch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smb1_and_smb2() {
        assert!(matches!(
            dissect(b"\xFFSMB\x72\x00\x00\x00\x00"),
            Dissection::Match { protocol: Protocol::Smb, .. }
        ));
        assert!(matches!(
            dissect(b"\xFESMB@\x00\x00\x00"),
            Dissection::Match { protocol: Protocol::Smb, .. }
        ));
    }

    #[test]
    fn test_no_match() {
        assert!(matches!(dissect(b"\xFDSMB"), Dissection::NoMatch));
        assert!(matches!(dissect(b"\xFFSM"), Dissection::NoMatch));
        assert!(matches!(dissect(b"SMB\xFF"), Dissection::NoMatch));
    }
}
