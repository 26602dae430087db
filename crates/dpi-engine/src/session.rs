//! Per-flow session state
//!
//! One `Session` per live flow: byte/packet accounting, a bounded reassembly
//! buffer per direction, the frozen classification, recorded anomalies and
//! any protocol records the dissectors extracted.

use crate::protocols::{DnsData, HttpData, Protocol, ProtocolData, TlsData};
use dpi_common::FlowKey;
use serde::Serialize;

/// Hard cap on anomalies recorded per session
pub const MAX_SESSION_ANOMALIES: usize = 10;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum SessionState {
    /// First packet seen
    New = 0,
    /// Second packet or first payload seen
    Established = 1,
    /// Teardown observed
    Closing = 2,
    /// Terminated or evicted
    Closed = 3,
    /// A dissector reported a malformed parse
    Error = 4,
}

/// Protocol classification frozen onto a session
#[derive(Debug, Clone, Default, Serialize)]
pub struct Classification {
    /// Classified protocol; `Unknown` until a dissector or port rule hits
    pub protocol: Protocol,
    /// Confidence 0..=100
    pub confidence: u8,
    /// `packets_seen` at the moment classification succeeded
    pub detection_tick: u32,
    /// Application label (protocol name, ≤64 bytes)
    pub app_name: String,
}

impl Classification {
    /// Whether a protocol has been frozen in
    #[inline(always)]
    pub fn is_classified(&self) -> bool {
        self.protocol != Protocol::Unknown
    }
}

/// Bounded per-direction reassembly buffer
///
/// A plain append buffer assuming monotonic delivery: out-of-order and
/// retransmitted segments land as-delivered. When an append would exceed the
/// cap the oldest bytes are dropped so the buffer always holds the newest
/// `cap` bytes of the stream.
#[derive(Debug, Clone)]
pub struct StreamBuffer {
    data: Vec<u8>,
    cap: usize,
}

impl StreamBuffer {
    /// Create an empty buffer; storage grows lazily up to `cap`
    pub fn new(cap: usize) -> Self {
        Self {
            data: Vec::new(),
            cap,
        }
    }

    /// Append bytes, ring-truncating the front on overflow
    ///
    /// Returns true when older bytes were dropped to make room.
    pub fn append(&mut self, bytes: &[u8]) -> bool {
        if self.cap == 0 {
            return !bytes.is_empty();
        }

        if bytes.len() >= self.cap {
            self.data.clear();
            self.data.extend_from_slice(&bytes[bytes.len() - self.cap..]);
            return true;
        }

        let overflow = (self.data.len() + bytes.len()).saturating_sub(self.cap);
        if overflow > 0 {
            self.data.drain(..overflow);
        }
        self.data.extend_from_slice(bytes);
        overflow > 0
    }

    /// Bytes currently held
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds nothing
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Buffered bytes, newest last
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Configured cap
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.cap
    }
}

/// A recorded protocol-behavior deviation
#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    /// Kind bitmask (see `anomaly` module constants)
    pub kind: u16,
    /// Human-readable description (≤256 chars)
    pub description: String,
    /// Severity 0..=10
    pub severity: u8,
}

/// Engine state for one live flow
#[derive(Debug)]
pub struct Session {
    /// Engine-unique monotonic id
    pub id: u64,
    /// Flow identity
    pub key: FlowKey,
    /// Lifecycle state
    pub state: SessionState,
    /// Frozen classification
    pub classification: Classification,
    /// Client-to-server bytes
    pub fwd_buffer: StreamBuffer,
    /// Server-to-client bytes
    pub rev_buffer: StreamBuffer,
    /// Creation timestamp (caller clock, nanoseconds)
    pub created_at_ns: u64,
    /// Last packet timestamp
    pub last_seen_ns: u64,
    /// Packets delivered to this session
    pub packets_seen: u32,
    /// Payload bytes delivered to this session
    pub total_bytes: u64,
    /// Ring-truncation events across both buffers
    pub buffer_overflows: u32,
    /// Recorded anomalies, oldest first, capped
    pub anomalies: Vec<Anomaly>,
    /// HTTP record, when dissected
    pub http: Option<HttpData>,
    /// DNS record, when dissected
    pub dns: Option<DnsData>,
    /// TLS record, when dissected
    pub tls: Option<TlsData>,
}

impl Session {
    /// Create a session for its first packet
    pub fn new(id: u64, key: FlowKey, now_ns: u64, buffer_cap: usize) -> Self {
        Self {
            id,
            key,
            state: SessionState::New,
            classification: Classification::default(),
            fwd_buffer: StreamBuffer::new(buffer_cap),
            rev_buffer: StreamBuffer::new(buffer_cap),
            created_at_ns: now_ns,
            last_seen_ns: now_ns,
            packets_seen: 0,
            total_bytes: 0,
            buffer_overflows: 0,
            anomalies: Vec::new(),
            http: None,
            dns: None,
            tls: None,
        }
    }

    /// Per-packet update: counters, direction buffer, lifecycle
    ///
    /// Returns true when the direction buffer ring-truncated.
    pub fn update(&mut self, payload: &[u8], timestamp_ns: u64, is_response: bool) -> bool {
        self.packets_seen = self.packets_seen.saturating_add(1);
        self.total_bytes += payload.len() as u64;
        if timestamp_ns > self.last_seen_ns {
            self.last_seen_ns = timestamp_ns;
        }

        let buffer = if is_response {
            &mut self.rev_buffer
        } else {
            &mut self.fwd_buffer
        };
        let overflowed = buffer.append(payload);
        if overflowed {
            self.buffer_overflows = self.buffer_overflows.saturating_add(1);
        }

        if self.state == SessionState::New
            && (self.packets_seen >= 2 || !payload.is_empty())
        {
            self.state = SessionState::Established;
        }

        overflowed
    }

    /// Freeze a classification; no-op once a protocol is set
    pub fn classify(&mut self, protocol: Protocol, confidence: u8) {
        if self.classification.is_classified() {
            return;
        }
        self.classification = Classification {
            protocol,
            confidence,
            detection_tick: self.packets_seen,
            app_name: protocol.as_str().to_string(),
        };
    }

    /// Store or merge a dissected protocol record
    pub fn attach_data(&mut self, data: ProtocolData) {
        match data {
            ProtocolData::Http(new) => match &mut self.http {
                Some(existing) => {
                    // A response fills the status code onto the request
                    // record; a second request replaces nothing.
                    if !new.is_request && new.status_code != 0 {
                        existing.status_code = new.status_code;
                    }
                }
                None => self.http = Some(new),
            },
            ProtocolData::Dns(mut new) => {
                if new.qname.is_none() {
                    new.qname = self.dns.take().and_then(|old| old.qname);
                }
                self.dns = Some(new);
            }
            ProtocolData::Tls(new) => match &mut self.tls {
                Some(existing) => {
                    if new.sni.is_some() {
                        existing.sni = new.sni;
                    }
                }
                None => self.tls = Some(new),
            },
            ProtocolData::None => {}
        }
    }

    /// Record an anomaly; false once the per-session cap is reached
    pub fn record_anomaly(&mut self, anomaly: Anomaly) -> bool {
        if self.anomalies.len() >= MAX_SESSION_ANOMALIES {
            return false;
        }
        self.anomalies.push(anomaly);
        true
    }

    /// Bytes currently held across both direction buffers
    #[inline(always)]
    pub fn buffered_bytes(&self) -> usize {
        self.fwd_buffer.len() + self.rev_buffer.len()
    }

    /// Whether the session idled past the timeout
    pub fn is_expired(&self, now_ns: u64, timeout_sec: u64) -> bool {
        now_ns.saturating_sub(self.last_seen_ns) > timeout_sec * 1_000_000_000
    }

    /// Read-only copy for external callers
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            key: self.key,
            state: self.state,
            classification: self.classification.clone(),
            created_at_ns: self.created_at_ns,
            last_seen_ns: self.last_seen_ns,
            packets_seen: self.packets_seen,
            total_bytes: self.total_bytes,
            buffer_overflows: self.buffer_overflows,
            fwd_buffered: self.fwd_buffer.len() as u64,
            rev_buffered: self.rev_buffer.len() as u64,
            anomalies: self.anomalies.clone(),
            http: self.http.clone(),
            dns: self.dns.clone(),
            tls: self.tls.clone(),
        }
    }
}

/// Point-in-time copy of a session's externally visible state
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Engine-unique monotonic id
    pub id: u64,
    /// Flow identity
    pub key: FlowKey,
    /// Lifecycle state
    pub state: SessionState,
    /// Frozen classification
    pub classification: Classification,
    /// Creation timestamp
    pub created_at_ns: u64,
    /// Last packet timestamp
    pub last_seen_ns: u64,
    /// Packets delivered
    pub packets_seen: u32,
    /// Payload bytes delivered
    pub total_bytes: u64,
    /// Ring-truncation events
    pub buffer_overflows: u32,
    /// Bytes held client-to-server
    pub fwd_buffered: u64,
    /// Bytes held server-to-client
    pub rev_buffered: u64,
    /// Recorded anomalies
    pub anomalies: Vec<Anomaly>,
    /// HTTP record
    pub http: Option<HttpData>,
    /// DNS record
    pub dns: Option<DnsData>,
    /// TLS record
    pub tls: Option<TlsData>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key() -> FlowKey {
        FlowKey::new(0x0A000001, 0x0A000002, 54321, 80, 6)
    }

    #[test]
    fn test_lifecycle_on_first_payload() {
        let mut session = Session::new(1, key(), 1_000, 1024);
        assert_eq!(session.state, SessionState::New);

        session.update(b"hello", 2_000, false);
        assert_eq!(session.state, SessionState::Established);
        assert_eq!(session.packets_seen, 1);
        assert_eq!(session.total_bytes, 5);
        assert_eq!(session.last_seen_ns, 2_000);
    }

    #[test]
    fn test_lifecycle_on_second_packet() {
        let mut session = Session::new(1, key(), 1_000, 1024);

        session.update(b"", 2_000, false);
        assert_eq!(session.state, SessionState::New);

        session.update(b"", 3_000, true);
        assert_eq!(session.state, SessionState::Established);
    }

    #[test]
    fn test_direction_buffers() {
        let mut session = Session::new(1, key(), 1_000, 1024);

        session.update(b"request", 2_000, false);
        session.update(b"response", 3_000, true);

        assert_eq!(session.fwd_buffer.as_slice(), b"request");
        assert_eq!(session.rev_buffer.as_slice(), b"response");
        assert_eq!(session.buffered_bytes(), 15);
    }

    #[test]
    fn test_ring_truncation() {
        let mut buf = StreamBuffer::new(8);

        assert!(!buf.append(b"abcdef"));
        assert!(buf.append(b"ghij"));
        assert_eq!(buf.as_slice(), b"cdefghij");

        // Oversized append keeps only the newest cap bytes
        assert!(buf.append(b"0123456789ABCDEF"));
        assert_eq!(buf.as_slice(), b"89ABCDEF");
    }

    #[test]
    fn test_overflow_counter() {
        let mut session = Session::new(1, key(), 1_000, 4);

        session.update(b"abcd", 2_000, false);
        assert_eq!(session.buffer_overflows, 0);

        session.update(b"ef", 3_000, false);
        assert_eq!(session.buffer_overflows, 1);
        assert_eq!(session.fwd_buffer.as_slice(), b"cdef");
        // Accounting keeps counting past the cap
        assert_eq!(session.total_bytes, 6);
    }

    #[test]
    fn test_classification_is_monotonic() {
        let mut session = Session::new(1, key(), 1_000, 1024);
        session.update(b"x", 2_000, false);

        session.classify(Protocol::Http, 80);
        assert_eq!(session.classification.protocol, Protocol::Http);
        assert_eq!(session.classification.detection_tick, 1);
        assert_eq!(session.classification.app_name, "http");

        session.classify(Protocol::Dns, 90);
        assert_eq!(session.classification.protocol, Protocol::Http);
        assert_eq!(session.classification.confidence, 80);
    }

    #[test]
    fn test_anomaly_cap() {
        let mut session = Session::new(1, key(), 1_000, 1024);

        for i in 0..MAX_SESSION_ANOMALIES {
            assert!(session.record_anomaly(Anomaly {
                kind: 1,
                description: format!("anomaly {i}"),
                severity: 3,
            }));
        }
        assert!(!session.record_anomaly(Anomaly {
            kind: 1,
            description: "one too many".into(),
            severity: 3,
        }));
        assert_eq!(session.anomalies.len(), MAX_SESSION_ANOMALIES);
    }

    #[test]
    fn test_expiry() {
        let mut session = Session::new(1, key(), 0, 1024);
        session.update(b"x", 1_000_000_000, false);

        assert!(!session.is_expired(100_000_000_000, 300));
        assert!(session.is_expired(302_000_000_000, 300));
    }

    #[test]
    fn test_http_response_merges_status() {
        let mut session = Session::new(1, key(), 0, 1024);
        session.attach_data(ProtocolData::Http(HttpData {
            method: "GET".into(),
            path: "/".into(),
            is_request: true,
            ..Default::default()
        }));
        session.attach_data(ProtocolData::Http(HttpData {
            status_code: 200,
            is_request: false,
            ..Default::default()
        }));

        let http = session.http.as_ref().unwrap();
        assert_eq!(http.method, "GET");
        assert_eq!(http.status_code, 200);
        assert!(http.is_request);
    }

    proptest! {
        #[test]
        fn prop_buffer_never_exceeds_cap(
            cap in 1usize..512,
            chunks in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..256),
                0..32,
            ),
        ) {
            let mut buf = StreamBuffer::new(cap);
            let mut stream: Vec<u8> = Vec::new();

            for chunk in &chunks {
                buf.append(chunk);
                stream.extend_from_slice(chunk);

                prop_assert!(buf.len() <= cap);
                // The buffer always holds the newest bytes of the stream
                let tail = &stream[stream.len() - buf.len()..];
                prop_assert_eq!(buf.as_slice(), tail);
            }
        }
    }
}
