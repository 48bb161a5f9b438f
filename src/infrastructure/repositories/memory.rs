//! In-memory store
//!
//! A single shared state implementing both repository traits, used by the
//! integration suite and for local development without Postgres. The whole
//! state sits behind one mutex, so the increment+insert step is atomic here
//! the same way the Pg transaction makes it atomic in production.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::domain::{Message, MessageRepository, Room, RoomRepository, TOMBSTONE_BODY};
use crate::shared::error::AppError;

#[derive(Default)]
struct State {
    rooms: HashMap<i64, Room>,
    pair_index: HashMap<String, i64>,
    messages: HashMap<i64, Message>,
    /// Message ids per room in commit order
    room_messages: HashMap<i64, Vec<i64>>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    /// Number of upcoming appends to fail with a storage error; lets tests
    /// drive the retry and idempotent-resend paths.
    fail_appends: AtomicU32,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` append transactions fail as if the store were down.
    pub fn fail_next_appends(&self, n: u32) {
        self.fail_appends.store(n, Ordering::SeqCst);
    }

    fn take_append_failure(&self) -> bool {
        self.fail_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RoomRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Room>, AppError> {
        Ok(self.state.lock().rooms.get(&id).cloned())
    }

    async fn find_by_pair_key(&self, pair_key: &str) -> Result<Option<Room>, AppError> {
        let state = self.state.lock();
        Ok(state
            .pair_index
            .get(pair_key)
            .and_then(|id| state.rooms.get(id))
            .cloned())
    }

    async fn create(&self, room: &Room) -> Result<Option<Room>, AppError> {
        let mut state = self.state.lock();
        let pair_key = room.pair_key();
        if state.pair_index.contains_key(&pair_key) {
            return Ok(None);
        }
        state.pair_index.insert(pair_key, room.id);
        state.rooms.insert(room.id, room.clone());
        Ok(Some(room.clone()))
    }

    async fn find_by_participant(&self, identity: &str) -> Result<Vec<Room>, AppError> {
        let state = self.state.lock();
        let mut rooms: Vec<Room> = state
            .rooms
            .values()
            .filter(|r| r.is_participant(identity))
            .cloned()
            .collect();
        rooms.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        Ok(rooms)
    }

    async fn set_archived(&self, id: i64) -> Result<(), AppError> {
        let mut state = self.state.lock();
        match state.rooms.get_mut(&id) {
            Some(room) => {
                room.archived = true;
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Room {} not found", id))),
        }
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        Ok(self.state.lock().messages.get(&id).cloned())
    }

    async fn append(
        &self,
        room_id: i64,
        id: i64,
        sender_id: &str,
        body: &str,
        attachment_ref: Option<&str>,
    ) -> Result<Message, AppError> {
        if self.take_append_failure() {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut state = self.state.lock();
        let now = Utc::now();
        let room = state
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| AppError::NotFound(format!("Room {} not found", room_id)))?;

        room.last_sequence += 1;
        room.last_activity_at = now;
        let sequence = room.last_sequence;

        let message = Message {
            id,
            room_id,
            sender_id: sender_id.to_string(),
            sequence,
            body: body.to_string(),
            attachment_ref: attachment_ref.map(str::to_string),
            edited_at: None,
            deleted_at: None,
            created_at: now,
        };

        state.messages.insert(id, message.clone());
        state.room_messages.entry(room_id).or_default().push(id);
        Ok(message)
    }

    async fn update_body(
        &self,
        id: i64,
        body: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<Message, AppError> {
        let mut state = self.state.lock();
        match state.messages.get_mut(&id) {
            Some(message) => {
                message.body = body.to_string();
                message.edited_at = Some(edited_at);
                Ok(message.clone())
            }
            None => Err(AppError::NotFound(format!("Message {} not found", id))),
        }
    }

    async fn mark_deleted(&self, id: i64, deleted_at: DateTime<Utc>) -> Result<(), AppError> {
        let mut state = self.state.lock();
        if let Some(message) = state.messages.get_mut(&id) {
            if message.deleted_at.is_none() {
                message.body = TOMBSTONE_BODY.to_string();
                message.deleted_at = Some(deleted_at);
            }
        }
        Ok(())
    }

    async fn page_after(
        &self,
        room_id: i64,
        after_sequence: i64,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let state = self.state.lock();
        let mut messages: Vec<Message> = state
            .room_messages
            .get(&room_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.messages.get(id))
                    .filter(|m| m.sequence > after_sequence)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        messages.sort_by_key(|m| m.sequence);
        messages.truncate(limit.max(0) as usize);
        Ok(messages)
    }

    async fn page_latest(&self, room_id: i64, limit: i64) -> Result<Vec<Message>, AppError> {
        let state = self.state.lock();
        let mut messages: Vec<Message> = state
            .room_messages
            .get(&room_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.messages.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        messages.sort_by_key(|m| m.sequence);
        let skip = messages.len().saturating_sub(limit.max(0) as usize);
        Ok(messages.split_off(skip))
    }
}
