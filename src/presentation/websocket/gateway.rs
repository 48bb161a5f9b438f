//! WebSocket Gateway
//!
//! Session registry and room fan-out. The gateway holds no authoritative
//! state: only transient connection bookkeeping. Outbound queues are
//! bounded; a session that cannot keep up is closed with a `SlowConsumer`
//! reason instead of silently dropping events or buffering without limit.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;

use super::messages::{close_codes, ServerEvent};
use crate::application::events::{EventPublisher, RoomEvent};
use crate::infrastructure::metrics;

/// Why the server is terminating a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    IdleTimeout,
    Unauthenticated,
    SlowConsumer,
}

impl CloseReason {
    pub fn code(&self) -> u16 {
        match self {
            CloseReason::IdleTimeout => close_codes::IDLE_TIMEOUT,
            CloseReason::Unauthenticated => close_codes::UNAUTHENTICATED,
            CloseReason::SlowConsumer => close_codes::SLOW_CONSUMER,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CloseReason::IdleTimeout => "idle timeout",
            CloseReason::Unauthenticated => "unauthenticated",
            CloseReason::SlowConsumer => "slow consumer",
        }
    }
}

/// Connected session with its bounded outbound queue and close signal.
pub struct ConnectedSession {
    pub connection_id: String,
    pub identity: String,
    sender: mpsc::Sender<ServerEvent>,
    close_tx: watch::Sender<Option<CloseReason>>,
    rooms: Mutex<HashSet<i64>>,
}

/// WebSocket gateway managing all connections.
pub struct Gateway {
    /// Active sessions by connection id
    sessions: DashMap<String, Arc<ConnectedSession>>,
    /// Identity to connection ids (a participant can have several sessions)
    identity_sessions: DashMap<String, Vec<String>>,
    /// Room id to connection ids, the fan-out lists
    room_sessions: DashMap<i64, Vec<String>>,
}

impl Gateway {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            identity_sessions: DashMap::new(),
            room_sessions: DashMap::new(),
        }
    }

    /// Register a new authenticated session. Returns the close-signal
    /// receiver the connection handler watches.
    pub fn register_session(
        &self,
        connection_id: &str,
        identity: &str,
        sender: mpsc::Sender<ServerEvent>,
    ) -> watch::Receiver<Option<CloseReason>> {
        let (close_tx, close_rx) = watch::channel(None);
        let session = Arc::new(ConnectedSession {
            connection_id: connection_id.to_string(),
            identity: identity.to_string(),
            sender,
            close_tx,
            rooms: Mutex::new(HashSet::new()),
        });

        self.sessions.insert(connection_id.to_string(), session);
        self.identity_sessions
            .entry(identity.to_string())
            .or_default()
            .push(connection_id.to_string());

        metrics::SESSIONS_ACTIVE.inc();
        tracing::info!(identity, connection_id, "Session registered");

        close_rx
    }

    /// Add a session to a room's fan-out list.
    pub fn join_room(&self, connection_id: &str, room_id: i64) {
        let Some(session) = self.sessions.get(connection_id).map(|s| s.value().clone()) else {
            return;
        };
        if !session.rooms.lock().insert(room_id) {
            return;
        }
        self.room_sessions
            .entry(room_id)
            .or_default()
            .push(connection_id.to_string());
    }

    /// Remove a session from every fan-out list. Safe to call twice.
    pub fn unregister_session(&self, connection_id: &str) {
        let Some((_, session)) = self.sessions.remove(connection_id) else {
            return;
        };

        if let Some(mut ids) = self.identity_sessions.get_mut(&session.identity) {
            ids.retain(|id| id != connection_id);
        }
        self.identity_sessions
            .remove_if(&session.identity, |_, ids| ids.is_empty());

        let rooms: Vec<i64> = session.rooms.lock().iter().copied().collect();
        for room_id in rooms {
            if let Some(mut ids) = self.room_sessions.get_mut(&room_id) {
                ids.retain(|id| id != connection_id);
            }
            self.room_sessions.remove_if(&room_id, |_, ids| ids.is_empty());
        }

        metrics::SESSIONS_ACTIVE.dec();
        tracing::info!(
            identity = %session.identity,
            connection_id,
            "Session unregistered"
        );
    }

    /// Terminate a session with an explicit close reason. The connection
    /// handler observes the signal and sends the close frame; the session
    /// leaves all fan-out lists immediately.
    pub fn close(&self, connection_id: &str, reason: CloseReason) {
        if let Some(session) = self.sessions.get(connection_id).map(|s| s.value().clone()) {
            self.close_session(&session, reason);
        }
    }

    fn close_session(&self, session: &Arc<ConnectedSession>, reason: CloseReason) {
        if reason == CloseReason::SlowConsumer {
            metrics::SLOW_CONSUMER_CLOSES.inc();
        }
        tracing::warn!(
            identity = %session.identity,
            connection_id = %session.connection_id,
            reason = reason.label(),
            "Closing session"
        );
        let _ = session.close_tx.send(Some(reason));
        self.unregister_session(&session.connection_id);
    }

    /// Fan an event out to every live session joined to a room, skipping
    /// sessions of `exclude_identity` (typing signals do not echo back).
    pub fn broadcast_to_room(
        &self,
        room_id: i64,
        event: &ServerEvent,
        exclude_identity: Option<&str>,
    ) {
        // Clone the list so no shard lock is held while sending; a send may
        // close a session, which mutates these maps.
        let Some(ids) = self.room_sessions.get(&room_id).map(|ids| ids.value().clone()) else {
            return;
        };

        for connection_id in ids {
            let Some(session) = self.sessions.get(&connection_id).map(|s| s.value().clone())
            else {
                continue;
            };
            if exclude_identity == Some(session.identity.as_str()) {
                continue;
            }
            match session.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.close_session(&session, CloseReason::SlowConsumer);
                }
                // Receiver already gone; handler cleanup is in flight.
                Err(TrySendError::Closed(_)) => {}
            }
        }
    }

    /// Get session count
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Check if an identity has at least one live session
    pub fn is_identity_online(&self, identity: &str) -> bool {
        self.identity_sessions
            .get(identity)
            .map(|ids| !ids.is_empty())
            .unwrap_or(false)
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for Gateway {
    fn publish(&self, event: RoomEvent) {
        if matches!(event, RoomEvent::MessageCreated { .. }) {
            metrics::MESSAGES_APPENDED.inc();
        }
        let room_id = event.room_id();
        let exclude = event.excluded_identity().map(str::to_string);
        let wire_event = ServerEvent::from(event);
        self.broadcast_to_room(room_id, &wire_event, exclude.as_deref());
    }
}
