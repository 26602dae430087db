//! Engine facade
//!
//! The only surface clients depend on. `process_packet` never fails: every
//! fault degrades to a counter and, where called for, an `Error` state on
//! the session. Concurrent callers are expected; packets on different flows
//! run in parallel and packets on one flow serialize on its session lock.

use crate::alerts::{Alert, AlertRing, AlertSeverity, MAX_PAYLOAD_SAMPLE};
use crate::anomaly;
use crate::classifier::Classifier;
use crate::config::{EngineConfig, TlsMode};
use crate::protocols::{Dissection, Protocol};
use crate::rules::{Rule, RuleEngine};
use crate::session::{Anomaly, Classification, Session, SessionSnapshot, SessionState};
use crate::stats::{EngineStats, StatsSnapshot};
use crate::table::FlowTable;
use dpi_common::{FlowKey, Timestamp};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Rough per-session overhead used by the memory ceiling estimate
const SESSION_OVERHEAD_BYTES: u64 = 4096;

/// Deep packet inspection engine
pub struct DpiEngine {
    config: RwLock<EngineConfig>,
    table: FlowTable,
    rules: RuleEngine,
    alerts: AlertRing,
    stats: EngineStats,
    next_session_id: AtomicU64,
    buffer_cap: usize,
    memory_limit_mb: u64,
}

impl DpiEngine {
    /// Build an engine with pre-sized tables and no rules or sessions
    pub fn new(config: EngineConfig) -> Self {
        let table = FlowTable::new(config.max_concurrent_sessions);
        let rules = RuleEngine::new(config.max_rules);
        let alerts = AlertRing::new(config.max_alerts, config.redact_pii, config.anonymize_ips);
        let buffer_cap = config.max_buffer_bytes;
        let memory_limit_mb = config.memory_limit_mb;

        Self {
            config: RwLock::new(config),
            table,
            rules,
            alerts,
            stats: EngineStats::new(),
            next_session_id: AtomicU64::new(0),
            buffer_cap,
            memory_limit_mb,
        }
    }

    /// Inspect one packet; returns the number of alerts it generated
    ///
    /// Empty payloads are dropped without touching any counter. Packets for
    /// flows the table cannot admit are counted and otherwise ignored.
    pub fn process_packet(
        &self,
        key: FlowKey,
        payload: &[u8],
        timestamp_ns: u64,
        is_response: bool,
    ) -> usize {
        if payload.is_empty() {
            return 0;
        }

        let started = Timestamp::now();
        let (inspect_tls, anomaly_on, log_alerts) = {
            let config = self.config.read();
            (
                config.tls_mode == TlsMode::Inspect,
                config.enable_anomaly_detection,
                config.log_all_alerts,
            )
        };

        // The memory ceiling refuses new flows only; established flows keep
        // flowing.
        let admitted = match self.table.get(&key) {
            Some(session) => Ok((session, false)),
            None if self.over_memory_limit() => {
                Err(dpi_common::DpiError::MemoryLimit(self.memory_estimate_mb()))
            }
            None => self.table.get_or_insert_with(key, || {
                let id = self.next_session_id.fetch_add(1, Ordering::Relaxed) + 1;
                Session::new(id, key, timestamp_ns, self.buffer_cap)
            }),
        };

        let (session, created) = match admitted {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!(error = %e, "new flow refused");
                self.stats.flows_dropped_capacity.inc();
                self.count_packet(payload.len() as u64, Protocol::Unknown, &started);
                return 0;
            }
        };

        if created {
            self.stats.flows_created.inc();
            tracing::trace!(
                src_port = key.src_port,
                dst_port = key.dst_port,
                "session created"
            );
        }

        let mut emitted = 0usize;
        {
            let mut session = session.lock();

            let buffered_before = session.buffered_bytes();
            let overflowed = session.update(payload, timestamp_ns, is_response);
            self.stats.adjust_buffered(buffered_before, session.buffered_bytes());
            if overflowed {
                self.stats.buffer_overflows.inc();
            }

            if !session.classification.is_classified() {
                if let Some((protocol, confidence, data)) =
                    Classifier::classify(&key, payload, inspect_tls)
                {
                    session.classify(protocol, confidence);
                    session.attach_data(data);
                    tracing::debug!(
                        protocol = %protocol,
                        confidence,
                        tick = session.packets_seen,
                        "flow classified"
                    );
                }
            } else {
                match Classifier::redissect(
                    session.classification.protocol,
                    payload,
                    inspect_tls,
                ) {
                    Dissection::Match { data, .. } => session.attach_data(data),
                    Dissection::Malformed => session.state = SessionState::Error,
                    Dissection::NoMatch => {}
                }
            }

            let protocol = session.classification.protocol;

            if anomaly_on && session.anomalies.len() < crate::session::MAX_SESSION_ANOMALIES {
                for finding in anomaly::inspect(protocol, &key, payload) {
                    if !session.record_anomaly(Anomaly {
                        kind: finding.kind,
                        description: finding.description.clone(),
                        severity: finding.severity,
                    }) {
                        break;
                    }
                    self.stats.anomalies_detected.inc();

                    let offset = session.total_bytes - payload.len() as u64;
                    self.emit(
                        timestamp_ns,
                        key,
                        AlertSeverity::Anomaly,
                        protocol,
                        0,
                        format!("anomaly:{}", finding.name),
                        finding.description,
                        payload,
                        offset as u32,
                        log_alerts,
                    );
                    emitted += 1;
                }
            }

            for hit in self.rules.evaluate(&key, protocol, is_response, payload) {
                let offset = session.total_bytes - payload.len() as u64 + hit.offset as u64;
                self.emit(
                    timestamp_ns,
                    key,
                    hit.severity,
                    protocol,
                    hit.rule_id,
                    hit.rule_name,
                    hit.message,
                    payload,
                    offset as u32,
                    log_alerts,
                );
                emitted += 1;
            }

            self.count_packet(payload.len() as u64, protocol, &started);
        }

        emitted
    }

    /// Register a rule; 0 on compile failure or a full rule table
    pub fn add_rule(&self, rule: Rule) -> u32 {
        self.rules.add(rule)
    }

    /// Remove a rule; false when the id is unknown
    pub fn remove_rule(&self, rule_id: u32) -> bool {
        self.rules.remove(rule_id)
    }

    /// Drain up to `max` pending alerts FIFO; `clear = false` peeks copies
    pub fn get_alerts(&self, max: usize, clear: bool) -> Vec<Alert> {
        self.alerts.drain(max, clear)
    }

    /// Copy out the counters
    pub fn get_stats(&self) -> StatsSnapshot {
        self.stats.snapshot(
            self.table.len() as u64,
            self.alerts.dropped(),
            self.buffer_cap as u64,
        )
    }

    /// Read-only snapshot of one session
    pub fn get_session(&self, key: &FlowKey) -> Option<SessionSnapshot> {
        self.table.get(key).map(|session| session.lock().snapshot())
    }

    /// Current classification of one flow; default for unknown flows
    pub fn classify_protocol(&self, key: &FlowKey) -> Classification {
        self.table
            .get(key)
            .map(|session| session.lock().classification.clone())
            .unwrap_or_default()
    }

    /// Switch the TLS handling mode
    ///
    /// Takes a flow for API compatibility; the baseline mutates the global
    /// mode only, the per-flow override is declared but not enforced.
    pub fn set_tls_mode(&self, _flow: &FlowKey, mode: TlsMode) {
        tracing::debug!(?mode, "tls mode changed");
        self.config.write().tls_mode = mode;
    }

    /// Tear down one session; false when the flow is unknown
    pub fn terminate_session(&self, key: &FlowKey) -> bool {
        match self.table.remove(key) {
            Some(session) => {
                let mut session = session.lock();
                session.state = SessionState::Closed;
                self.stats.adjust_buffered(session.buffered_bytes(), 0);
                self.stats.flows_terminated.inc();
                tracing::trace!(id = session.id, "session terminated");
                true
            }
            None => false,
        }
    }

    /// Flows idle past the configured reassembly timeout as of `now_ns`
    ///
    /// Expiry is cooperative: pair this with `terminate_session`.
    pub fn expired_flows(&self, now_ns: u64) -> Vec<FlowKey> {
        let timeout = self.config.read().reassembly_timeout_sec;
        self.table.expired(now_ns, timeout)
    }

    /// Release all sessions, compiled rules and pending alerts
    pub fn shutdown(&self) {
        for session in self.table.drain() {
            let mut session = session.lock();
            session.state = SessionState::Closed;
            self.stats.adjust_buffered(session.buffered_bytes(), 0);
            self.stats.flows_terminated.inc();
        }
        self.rules.clear();
        self.alerts.clear();
        tracing::debug!("engine shut down");
    }

    /// Estimated live memory in MB (buffers plus per-session overhead)
    fn memory_estimate_mb(&self) -> u64 {
        let bytes = self.stats.buffered_bytes.get()
            + self.table.len() as u64 * SESSION_OVERHEAD_BYTES;
        bytes >> 20
    }

    fn over_memory_limit(&self) -> bool {
        self.memory_limit_mb > 0 && self.memory_estimate_mb() >= self.memory_limit_mb
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        timestamp_ns: u64,
        flow: FlowKey,
        severity: AlertSeverity,
        protocol: Protocol,
        rule_id: u32,
        rule_name: String,
        message: String,
        payload: &[u8],
        offset_in_stream: u32,
        log: bool,
    ) {
        let sample_len = payload.len().min(MAX_PAYLOAD_SAMPLE);
        let name_for_log = log.then(|| rule_name.clone());

        let alert_id = self.alerts.push(Alert {
            alert_id: 0, // assigned by the ring
            timestamp_ns,
            flow,
            severity,
            protocol,
            rule_id,
            rule_name,
            message,
            payload_sample: payload[..sample_len].to_vec(),
            offset_in_stream,
        });
        self.stats.alerts_generated.inc();

        if let Some(name) = name_for_log {
            tracing::info!(alert_id, rule = %name, severity = %severity, "alert");
        }
    }

    fn count_packet(&self, bytes: u64, protocol: Protocol, started: &Timestamp) {
        self.stats.packets_processed.inc();
        self.stats.bytes_processed.add(bytes);
        self.stats.protocol_packets[protocol.index()].inc();
        self.stats.record_processing_time(started.elapsed_micros());
    }
}
