//! Alert ring
//!
//! Bounded FIFO of emitted alerts. The packet path pushes under a short
//! lock; on overflow the oldest entries are overwritten and counted. Callers
//! drain copies; the engine keeps ownership of nothing a caller sees.

use crate::protocols::Protocol;
use dpi_common::{AtomicCounter, FlowKey};
use parking_lot::Mutex;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Upper bound on the payload sample carried by an alert
pub const MAX_PAYLOAD_SAMPLE: usize = 256;

/// Alert severity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum AlertSeverity {
    /// Informational
    Info = 0,
    /// Needs attention
    Warning = 1,
    /// Needs immediate attention
    Critical = 2,
    /// Malware indicator
    Malware = 3,
    /// Protocol anomaly
    Anomaly = 4,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Malware => "malware",
            Self::Anomaly => "anomaly",
        };
        f.write_str(s)
    }
}

/// A rule or anomaly hit with payload context
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    /// Engine-unique monotonic id
    pub alert_id: u64,
    /// Packet timestamp that triggered the alert
    pub timestamp_ns: u64,
    /// Flow the alert fired on (possibly anonymized)
    pub flow: FlowKey,
    /// Severity
    pub severity: AlertSeverity,
    /// Session protocol at emission time
    pub protocol: Protocol,
    /// Matched rule id; 0 for anomaly-sourced alerts
    pub rule_id: u32,
    /// Matched rule name, or `anomaly:<kind>`
    pub rule_name: String,
    /// Rule description or anomaly description
    pub message: String,
    /// Leading bytes of the triggering packet (possibly redacted)
    pub payload_sample: Vec<u8>,
    /// Byte offset of the match within the session's delivered stream
    pub offset_in_stream: u32,
}

/// Bounded MPMC alert queue with overwrite-oldest overflow
pub struct AlertRing {
    queue: Mutex<VecDeque<Alert>>,
    capacity: usize,
    next_id: AtomicCounter,
    dropped: AtomicCounter,
    redact_pii: bool,
    anonymize_ips: bool,
    email_pattern: Regex,
    ipv4_pattern: Regex,
}

impl AlertRing {
    /// Create a ring bounded to `capacity` pending alerts
    pub fn new(capacity: usize, redact_pii: bool, anonymize_ips: bool) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            next_id: AtomicCounter::new(0),
            dropped: AtomicCounter::new(0),
            redact_pii,
            anonymize_ips,
            // Infallible: both patterns are fixed at build time
            email_pattern: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
                .unwrap(),
            ipv4_pattern: Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").unwrap(),
        }
    }

    /// Enqueue an alert, applying the configured privacy transforms
    ///
    /// The id is assigned under the queue lock so drain order and id order
    /// agree even with concurrent producers. Returns the assigned id.
    pub fn push(&self, mut alert: Alert) -> u64 {
        if self.anonymize_ips {
            alert.flow = alert.flow.anonymized();
        }
        if self.redact_pii {
            self.redact(&mut alert.payload_sample);
        }

        let mut queue = self.queue.lock();
        let id = self.next_id.inc() + 1;
        alert.alert_id = id;
        if queue.len() >= self.capacity {
            queue.pop_front();
            self.dropped.inc();
        }
        queue.push_back(alert);
        id
    }

    /// Drain up to `max` alerts FIFO
    ///
    /// With `clear = false` the head is not advanced; callers get copies and
    /// will see the same entries again.
    pub fn drain(&self, max: usize, clear: bool) -> Vec<Alert> {
        let mut queue = self.queue.lock();
        let n = max.min(queue.len());

        if clear {
            queue.drain(..n).collect()
        } else {
            queue.iter().take(n).cloned().collect()
        }
    }

    /// Pending alert count
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether no alerts are pending
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Alerts overwritten on overflow
    pub fn dropped(&self) -> u64 {
        self.dropped.get()
    }

    /// Drop every pending alert
    pub fn clear(&self) {
        self.queue.lock().clear();
    }

    /// Mask email/IP-like spans, then any remaining non-ASCII bytes
    fn redact(&self, sample: &mut [u8]) {
        let mut spans: Vec<(usize, usize)> = Vec::new();
        for m in self.email_pattern.find_iter(sample) {
            spans.push((m.start(), m.end()));
        }
        for m in self.ipv4_pattern.find_iter(sample) {
            spans.push((m.start(), m.end()));
        }
        for (start, end) in spans {
            sample[start..end].fill(b'*');
        }

        for byte in sample.iter_mut() {
            if !byte.is_ascii() {
                *byte = b'*';
            }
        }
    }
}
