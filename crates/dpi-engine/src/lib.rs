//! OpenDPI Inspection Engine
//!
//! Passive, in-line deep packet inspection over already-parsed L4 payloads.
//! The caller supplies the 5-tuple, the application-layer bytes, a timestamp
//! and a direction flag; the engine tracks per-flow sessions, reassembles
//! both directions, classifies the application protocol, evaluates pattern
//! rules and surfaces alerts through a bounded ring.
//!
//! ## Features
//!
//! - **Flow Table**: sharded concurrent map, bounded capacity, cooperative expiry
//! - **Protocol Classifier**: HTTP/DNS/TLS/SMTP/SMB dissectors + port heuristics
//! - **Rule Engine**: regex and literal patterns compiled at registration
//! - **Anomaly Detector**: protocol-behavior deviations surfaced as alerts
//! - **Alert Ring**: bounded FIFO with overwrite-oldest overflow
//!
//! The packet path is fully synchronous; the engine spawns no threads and is
//! safe to drive from many workers at once. Packets on different flows run in
//! parallel, packets on the same flow serialize on that session's lock.

pub mod alerts;
pub mod anomaly;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod protocols;
pub mod rules;
pub mod session;
pub mod stats;
pub mod table;

pub use alerts::{Alert, AlertRing, AlertSeverity, MAX_PAYLOAD_SAMPLE};
pub use classifier::Classifier;
pub use config::{EngineConfig, TlsMode};
pub use engine::DpiEngine;
pub use protocols::{Dissection, Protocol, ProtocolData};
pub use rules::{Category, Rule, RuleEngine, RuleKind};
pub use session::{Anomaly, Classification, Session, SessionSnapshot, SessionState};
pub use stats::StatsSnapshot;
pub use table::FlowTable;

pub use dpi_common::{DpiError, DpiResult, FlowKey};
