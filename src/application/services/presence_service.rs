//! Presence/Typing Tracker
//!
//! Process-local typing state with TTL expiry. Deliberately kept out of the
//! durable store: a crash silently loses all typing state, which is
//! acceptable since it is advisory only.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Default typing indicator lifetime without a fresh heartbeat.
const DEFAULT_TYPING_TTL: Duration = Duration::from_secs(10);

/// In-memory typing tracker, keyed room → identity → expiry.
pub struct PresenceTracker {
    typing: DashMap<i64, HashMap<String, Instant>>,
    ttl: Duration,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TYPING_TTL)
    }

    /// Create with custom TTL
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            typing: DashMap::new(),
            ttl,
        }
    }

    /// Configured entry lifetime, also sent to clients so they can age
    /// indicators out locally.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mark an identity as typing in a room. Overwrites any previous entry,
    /// refreshing its expiry (heartbeat semantics).
    pub fn set_typing(&self, room_id: i64, identity: &str) {
        let expires_at = Instant::now() + self.ttl;
        self.typing
            .entry(room_id)
            .or_default()
            .insert(identity.to_string(), expires_at);
    }

    /// Remove a typing entry. Returns whether a live entry was present.
    pub fn clear_typing(&self, room_id: i64, identity: &str) -> bool {
        let now = Instant::now();
        match self.typing.get_mut(&room_id) {
            Some(mut entries) => entries
                .remove(identity)
                .map(|expires_at| now < expires_at)
                .unwrap_or(false),
            None => false,
        }
    }

    /// Identities currently typing in a room. Prunes expired entries.
    pub fn active_typers(&self, room_id: i64) -> Vec<String> {
        let now = Instant::now();
        let Some(mut entries) = self.typing.get_mut(&room_id) else {
            return Vec::new();
        };
        entries.retain(|_, expires_at| now < *expires_at);
        let mut typers: Vec<String> = entries.keys().cloned().collect();
        typers.sort();
        typers
    }

    /// Drop an identity's typing entries in the given rooms. Called when a
    /// session closes.
    pub fn clear_rooms_for(&self, identity: &str, room_ids: &[i64]) {
        for room_id in room_ids {
            self.clear_typing(*room_id, identity);
        }
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}
