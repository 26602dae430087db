//! Error types for OpenDPI

use thiserror::Error;

/// OpenDPI error type
#[derive(Error, Debug)]
pub enum DpiError {
    /// Flow table at configured capacity
    #[error("flow table full")]
    FlowTableFull,

    /// Memory ceiling reached
    #[error("memory limit exceeded: {0} MB in use")]
    MemoryLimit(u64),

    /// Rule table at configured capacity
    #[error("rule table full")]
    RuleTableFull,

    /// Pattern failed to compile at registration
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}

/// Result type for OpenDPI
pub type DpiResult<T> = Result<T, DpiError>;
