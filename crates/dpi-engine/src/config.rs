//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// TLS handling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsMode {
    /// No TLS handling at all
    Disabled,
    /// Capture records only
    Passthrough,
    /// Declared, not implemented
    Decrypt,
    /// Record-layer and ClientHello inspection
    Inspect,
}

impl Default for TlsMode {
    fn default() -> Self {
        Self::Passthrough
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// TLS handling mode (global; per-flow override is declared only)
    pub tls_mode: TlsMode,

    /// Toggle the protocol anomaly detector
    pub enable_anomaly_detection: bool,

    /// Reserved; no effect
    pub enable_malware_detection: bool,

    /// Idle threshold used by the expiry sweep (seconds)
    pub reassembly_timeout_sec: u64,

    /// Flow table capacity
    pub max_concurrent_sessions: usize,

    /// Rule table capacity
    pub max_rules: usize,

    /// Alert ring capacity
    pub max_alerts: usize,

    /// Per-direction reassembly buffer cap (bytes)
    pub max_buffer_bytes: usize,

    /// Soft memory ceiling in MB; 0 disables the check
    pub memory_limit_mb: u64,

    /// Informational: caller is expected to drain the ring promptly
    pub log_all_alerts: bool,

    /// Reserved
    pub log_tls_keys: bool,

    /// Reserved
    pub log_dir: Option<PathBuf>,

    /// Mask non-ASCII bytes and email/IP-like spans in payload samples
    pub redact_pii: bool,

    /// Zero the host octet of alert tuples
    pub anonymize_ips: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tls_mode: TlsMode::default(),
            enable_anomaly_detection: true,
            enable_malware_detection: false,
            reassembly_timeout_sec: 300,
            max_concurrent_sessions: 100_000,
            max_rules: 10_000,
            max_alerts: 1_000_000,
            max_buffer_bytes: 16 * 1024 * 1024,
            memory_limit_mb: 0,
            log_all_alerts: false,
            log_tls_keys: false,
            log_dir: None,
            redact_pii: false,
            anonymize_ips: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();

        assert_eq!(config.tls_mode, TlsMode::Passthrough);
        assert!(config.enable_anomaly_detection);
        assert_eq!(config.reassembly_timeout_sec, 300);
        assert_eq!(config.max_concurrent_sessions, 100_000);
        assert_eq!(config.max_alerts, 1_000_000);
        assert_eq!(config.max_buffer_bytes, 16 * 1024 * 1024);
    }
}
