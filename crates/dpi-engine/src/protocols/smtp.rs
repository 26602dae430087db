//! SMTP dissector
//!
//! Matches numeric reply lines ("250 ...") and the common command verbs. No
//! record is extracted; classification is all the engine needs here.

use super::{Dissection, ProtocolData, Protocol, DISSECTOR_CONFIDENCE};

/// Command verbs the dissector recognizes
const COMMANDS: [&[u8]; 6] = [b"EHLO ", b"HELO ", b"MAIL ", b"RCPT ", b"DATA", b"QUIT"];

/// Dissect a payload as SMTP
pub fn dissect(payload: &[u8]) -> Dissection {
    if is_reply(payload) || is_command(payload) {
        return Dissection::Match {
            protocol: Protocol::Smtp,
            confidence: DISSECTOR_CONFIDENCE,
            data: ProtocolData::None,
        };
    }

    Dissection::NoMatch
}

/// Three ASCII digits followed by a space
fn is_reply(payload: &[u8]) -> bool {
    payload.len() >= 4
        && payload[..3].iter().all(u8::is_ascii_digit)
        && payload[3] == b' '
}

fn is_command(payload: &[u8]) -> bool {
    COMMANDS.iter().any(|c| payload.starts_with(c))
}
