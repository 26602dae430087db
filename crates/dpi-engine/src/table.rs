//! Concurrent flow table
//!
//! Sharded map from 5-tuple to session. Shard locks are held only for
//! lookup/insert/remove; everything per-packet happens under the session's
//! own mutex, so packets on different flows never contend.

use crate::session::Session;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dpi_common::{DpiError, DpiResult, FlowKey};
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared handle to a live session
pub type SessionRef = Arc<Mutex<Session>>;

/// Bounded map of flow tuple to session
pub struct FlowTable {
    sessions: DashMap<FlowKey, SessionRef>,
    capacity: usize,
}

impl FlowTable {
    /// Create a table bounded to `capacity` live sessions
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: DashMap::with_capacity(capacity.min(1 << 16)),
            capacity,
        }
    }

    /// Look up a live session
    #[inline]
    pub fn get(&self, key: &FlowKey) -> Option<SessionRef> {
        self.sessions.get(key).map(|entry| entry.value().clone())
    }

    /// Fetch the session for `key`, creating it if absent and capacity allows
    ///
    /// Returns the session and whether this call created it. New flows are
    /// refused (never evicted for) once the table is at capacity.
    pub fn get_or_insert_with<F>(&self, key: FlowKey, make: F) -> DpiResult<(SessionRef, bool)>
    where
        F: FnOnce() -> Session,
    {
        if let Some(session) = self.get(&key) {
            return Ok((session, false));
        }

        if self.sessions.len() >= self.capacity {
            return Err(DpiError::FlowTableFull);
        }

        match self.sessions.entry(key) {
            Entry::Occupied(entry) => Ok((entry.get().clone(), false)),
            Entry::Vacant(entry) => {
                let session = Arc::new(Mutex::new(make()));
                entry.insert(session.clone());
                Ok((session, true))
            }
        }
    }

    /// Tear down a session
    pub fn remove(&self, key: &FlowKey) -> Option<SessionRef> {
        self.sessions.remove(key).map(|(_, session)| session)
    }

    /// Keys of sessions idle longer than `timeout_sec` as of `now_ns`
    ///
    /// The sweep is cooperative: the caller pairs this with `remove` (or the
    /// engine's `terminate_session`); the table never expires flows itself.
    pub fn expired(&self, now_ns: u64, timeout_sec: u64) -> Vec<FlowKey> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().lock().is_expired(now_ns, timeout_sec))
            .map(|entry| *entry.key())
            .collect()
    }

    /// Drain every session, returning the handles
    pub fn drain(&self) -> Vec<SessionRef> {
        let keys: Vec<FlowKey> = self.sessions.iter().map(|e| *e.key()).collect();
        keys.iter()
            .filter_map(|k| self.remove(k))
            .collect()
    }

    /// Live session count
    #[inline]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Configured capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
