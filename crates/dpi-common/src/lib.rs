//! OpenDPI Common - Shared types for the deep packet inspection engine
//!
//! This crate provides the primitives every inspection component depends on:
//! - Flow keys and hashing
//! - Nanosecond timestamps
//! - Lock-free counters
//! - Error handling

#![warn(missing_docs)]

pub mod error;
pub mod flow;

pub use error::*;
pub use flow::*;

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic nanosecond timestamp for sub-microsecond timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Get current timestamp (nanoseconds since epoch)
    #[inline(always)]
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64;
        Self(nanos)
    }

    /// Wrap a caller-supplied nanosecond value
    #[inline(always)]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Get nanoseconds value
    #[inline(always)]
    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Duration since this timestamp in microseconds
    #[inline(always)]
    pub fn elapsed_micros(&self) -> u64 {
        (Self::now().0.saturating_sub(self.0)) / 1000
    }
}

/// High-performance counter for lock-free metrics
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    /// Create new counter
    pub const fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Increment and return previous value
    #[inline(always)]
    pub fn inc(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    /// Add value and return previous
    #[inline(always)]
    pub fn add(&self, val: u64) -> u64 {
        self.0.fetch_add(val, Ordering::Relaxed)
    }

    /// Subtract value and return previous
    #[inline(always)]
    pub fn sub(&self, val: u64) -> u64 {
        self.0.fetch_sub(val, Ordering::Relaxed)
    }

    /// Get current value
    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
