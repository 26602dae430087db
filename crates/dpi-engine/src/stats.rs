//! Engine statistics
//!
//! Relaxed atomic counters on the packet path, a small locked section for
//! the processing-time average, and copy-out snapshots for readers.

use crate::protocols::Protocol;
use dpi_common::AtomicCounter;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// EWMA horizon for the processing-time average
const EWMA_SAMPLES: f64 = 1024.0;

/// Processing-time average state
#[derive(Debug, Default)]
struct Timing {
    avg_us: f64,
    samples: u64,
}

/// Live counters; all monotonic except the gauges derived at snapshot time
pub struct EngineStats {
    /// Packets accepted by `process_packet`
    pub packets_processed: AtomicCounter,
    /// Payload bytes accepted
    pub bytes_processed: AtomicCounter,
    /// Sessions created
    pub flows_created: AtomicCounter,
    /// Sessions terminated or evicted
    pub flows_terminated: AtomicCounter,
    /// New flows refused at capacity (or over the memory ceiling)
    pub flows_dropped_capacity: AtomicCounter,
    /// Alerts emitted
    pub alerts_generated: AtomicCounter,
    /// Anomalies recorded
    pub anomalies_detected: AtomicCounter,
    /// Reassembly ring-truncation events
    pub buffer_overflows: AtomicCounter,
    /// Bytes currently held across all reassembly buffers (gauge)
    pub buffered_bytes: AtomicCounter,
    /// Packets per classified protocol
    pub protocol_packets: [AtomicCounter; Protocol::COUNT],
    max_us: AtomicU64,
    timing: Mutex<Timing>,
}

impl EngineStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            packets_processed: AtomicCounter::new(0),
            bytes_processed: AtomicCounter::new(0),
            flows_created: AtomicCounter::new(0),
            flows_terminated: AtomicCounter::new(0),
            flows_dropped_capacity: AtomicCounter::new(0),
            alerts_generated: AtomicCounter::new(0),
            anomalies_detected: AtomicCounter::new(0),
            buffer_overflows: AtomicCounter::new(0),
            buffered_bytes: AtomicCounter::new(0),
            protocol_packets: std::array::from_fn(|_| AtomicCounter::new(0)),
            max_us: AtomicU64::new(0),
            timing: Mutex::new(Timing::default()),
        }
    }

    /// Record one packet's processing time in microseconds
    pub fn record_processing_time(&self, us: u64) {
        self.max_us.fetch_max(us, Ordering::Relaxed);

        let mut timing = self.timing.lock();
        if timing.samples == 0 {
            timing.avg_us = us as f64;
        } else {
            timing.avg_us += (us as f64 - timing.avg_us) / EWMA_SAMPLES;
        }
        timing.samples += 1;
    }

    /// Adjust the buffered-bytes gauge by the post-append delta
    pub fn adjust_buffered(&self, before: usize, after: usize) {
        if after >= before {
            self.buffered_bytes.add((after - before) as u64);
        } else {
            self.buffered_bytes.sub((before - after) as u64);
        }
    }

    /// Copy out a consistent-enough view for callers
    pub fn snapshot(
        &self,
        active_sessions: u64,
        alerts_dropped: u64,
        per_direction_cap: u64,
    ) -> StatsSnapshot {
        let buffered = self.buffered_bytes.get();
        let buffer_capacity = active_sessions * 2 * per_direction_cap;
        let buffer_utilization_percent = if buffer_capacity == 0 {
            0.0
        } else {
            (buffered as f64 / buffer_capacity as f64) * 100.0
        };

        let timing = self.timing.lock();

        StatsSnapshot {
            packets_processed: self.packets_processed.get(),
            bytes_processed: self.bytes_processed.get(),
            flows_created: self.flows_created.get(),
            flows_terminated: self.flows_terminated.get(),
            flows_dropped_capacity: self.flows_dropped_capacity.get(),
            active_sessions,
            alerts_generated: self.alerts_generated.get(),
            alerts_dropped,
            anomalies_detected: self.anomalies_detected.get(),
            buffer_overflows: self.buffer_overflows.get(),
            protocol_packets: std::array::from_fn(|i| self.protocol_packets[i].get()),
            avg_processing_time_us: timing.avg_us,
            max_processing_time_us: self.max_us.load(Ordering::Relaxed),
            buffer_utilization_percent,
        }
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the engine counters
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Packets accepted
    pub packets_processed: u64,
    /// Payload bytes accepted
    pub bytes_processed: u64,
    /// Sessions created
    pub flows_created: u64,
    /// Sessions terminated or evicted
    pub flows_terminated: u64,
    /// New flows refused at capacity
    pub flows_dropped_capacity: u64,
    /// Live session count
    pub active_sessions: u64,
    /// Alerts emitted
    pub alerts_generated: u64,
    /// Alerts overwritten on ring overflow
    pub alerts_dropped: u64,
    /// Anomalies recorded
    pub anomalies_detected: u64,
    /// Reassembly ring-truncation events
    pub buffer_overflows: u64,
    /// Packets per classified protocol, indexed by `Protocol::index()`
    pub protocol_packets: [u64; Protocol::COUNT],
    /// EWMA of per-packet processing time
    pub avg_processing_time_us: f64,
    /// Running maximum of per-packet processing time
    pub max_processing_time_us: u64,
    /// Held reassembly bytes over live buffer capacity
    pub buffer_utilization_percent: f64,
}

impl StatsSnapshot {
    /// Packets counted for one protocol
    pub fn packets_for(&self, protocol: Protocol) -> u64 {
        self.protocol_packets[protocol.index()]
    }
}
