//! WebSocket Session Management

use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Connection lifecycle: `Connecting → Authenticated → Joined → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Authenticated,
    Joined,
    Closed,
}

/// Per-connection transient state. Holds no authoritative data: sequence
/// numbers and membership always come from the store and registry.
#[derive(Debug)]
pub struct SessionState {
    pub connection_id: String,
    pub identity: String,
    pub phase: SessionPhase,
    pub joined_rooms: HashSet<i64>,
    pub last_activity: Instant,
}

impl SessionState {
    pub fn new(connection_id: String) -> Self {
        Self {
            connection_id,
            identity: String::new(),
            phase: SessionPhase::Connecting,
            joined_rooms: HashSet::new(),
            last_activity: Instant::now(),
        }
    }

    pub fn authenticate(&mut self, identity: String) {
        self.identity = identity;
        self.phase = SessionPhase::Authenticated;
        self.touch();
    }

    pub fn join(&mut self, room_id: i64) {
        self.joined_rooms.insert(room_id);
        self.phase = SessionPhase::Joined;
    }

    pub fn is_joined(&self, room_id: i64) -> bool {
        self.joined_rooms.contains(&room_id)
    }

    pub fn close(&mut self) {
        self.phase = SessionPhase::Closed;
    }

    /// Record inbound activity; any frame resets the idle clock.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_idle(&self, window: Duration) -> bool {
        self.last_activity.elapsed() > window
    }
}
