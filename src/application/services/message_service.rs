//! Message Store
//!
//! Appends, edits, soft-deletes and pages messages. Sequence assignment is
//! serialized per room behind a lazily created `tokio::sync::Mutex`; rooms
//! never share a lock, so unrelated conversations proceed fully in parallel.
//! Broadcast happens inside the same critical section, which keeps fan-out
//! order identical to commit order for every session.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use tokio::sync::Mutex;

use crate::application::events::{EventPublisher, RoomEvent};
use crate::application::services::authorization::RoomGuard;
use crate::application::services::presence_service::PresenceTracker;
use crate::domain::{Message, MessageRepository};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::validate_body;

/// Store tuning knobs, sourced from [`crate::config::ChatSettings`].
#[derive(Debug, Clone)]
pub struct MessageStoreConfig {
    /// Maximum message body length in characters
    pub max_body_length: usize,
    /// Page size when the caller does not specify one
    pub default_page_size: i64,
    /// Hard cap on the page size
    pub max_page_size: i64,
    /// How long a client message id is remembered for deduplication
    pub dedup_retention: Duration,
    /// Retries of the storage transaction before surfacing `Unavailable`
    pub append_retry_attempts: u32,
    /// Base backoff between retries, doubled per attempt with jitter
    pub append_retry_backoff: Duration,
}

impl Default for MessageStoreConfig {
    fn default() -> Self {
        Self {
            max_body_length: 4000,
            default_page_size: 50,
            max_page_size: 100,
            dedup_retention: Duration::from_secs(300),
            append_retry_attempts: 3,
            append_retry_backoff: Duration::from_millis(50),
        }
    }
}

/// One page of history, ascending by sequence.
///
/// `has_more` is true iff a message newer than the returned window exists;
/// cursor pagination is sequence-based and therefore stable under
/// concurrent appends.
#[derive(Debug, Clone)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

/// Dedup key: room, sender, client-chosen message id.
type SendKey = (i64, String, String);

pub struct MessageService {
    messages: Arc<dyn MessageRepository>,
    guard: Arc<RoomGuard>,
    presence: Arc<PresenceTracker>,
    id_generator: Arc<SnowflakeGenerator>,
    publisher: Arc<dyn EventPublisher>,
    /// Per-room serialization point for the increment+insert+broadcast step
    room_locks: DashMap<i64, Arc<Mutex<()>>>,
    /// Recently committed sends, for idempotent recovery after `Unavailable`
    recent_sends: DashMap<SendKey, (i64, Instant)>,
    config: MessageStoreConfig,
}

impl MessageService {
    pub fn new(
        messages: Arc<dyn MessageRepository>,
        guard: Arc<RoomGuard>,
        presence: Arc<PresenceTracker>,
        id_generator: Arc<SnowflakeGenerator>,
        publisher: Arc<dyn EventPublisher>,
        config: MessageStoreConfig,
    ) -> Self {
        Self {
            messages,
            guard,
            presence,
            id_generator,
            publisher,
            room_locks: DashMap::new(),
            recent_sends: DashMap::new(),
            config,
        }
    }

    /// Append a message to a room.
    ///
    /// A `client_msg_id` already seen from the same sender in the same room
    /// within the retention window returns the originally committed message
    /// instead of appending a duplicate.
    pub async fn append(
        &self,
        room_id: i64,
        sender_id: &str,
        body: &str,
        attachment_ref: Option<&str>,
        client_msg_id: &str,
    ) -> Result<Message, AppError> {
        validate_body(body, self.config.max_body_length)?;
        if client_msg_id.is_empty() {
            return Err(AppError::Validation("client_msg_id must not be empty".into()));
        }

        let room = self.guard.check_membership(sender_id, room_id).await?;
        if room.archived {
            return Err(AppError::RoomArchived);
        }

        let send_key: SendKey = (room_id, sender_id.to_string(), client_msg_id.to_string());
        if let Some(original) = self.replayed_send(&send_key).await? {
            return Ok(original);
        }

        let lock = self.room_lock(room_id);
        let _serialized = lock.lock().await;

        // Re-check under the lock: two in-flight sends with the same client
        // message id must still converge on one row.
        if let Some(original) = self.replayed_send(&send_key).await? {
            return Ok(original);
        }

        let message = self
            .append_with_retry(room_id, sender_id, body, attachment_ref)
            .await?;

        // Sending a message implicitly ends the sender's typing state.
        self.presence.clear_typing(room_id, sender_id);
        self.remember_send(send_key, message.id);

        tracing::debug!(
            room_id,
            sequence = message.sequence,
            message_id = message.id,
            "Message appended"
        );

        self.publisher.publish(RoomEvent::MessageCreated {
            message: message.clone(),
        });

        Ok(message)
    }

    /// Edit a message body. Sender-only; tombstones are terminal.
    pub async fn edit(
        &self,
        message_id: i64,
        editor_id: &str,
        new_body: &str,
    ) -> Result<Message, AppError> {
        validate_body(new_body, self.config.max_body_length)?;

        let existing = self
            .messages
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", message_id)))?;

        // Membership before ownership, so callers outside the room learn
        // nothing from probing foreign message ids.
        self.guard
            .check_membership(editor_id, existing.room_id)
            .await?;

        if existing.sender_id != editor_id {
            return Err(AppError::Forbidden("Only the sender may edit a message".into()));
        }
        if existing.is_deleted() {
            return Err(AppError::AlreadyDeleted);
        }

        let updated = self
            .messages
            .update_body(message_id, new_body, Utc::now())
            .await?;

        self.publisher.publish(RoomEvent::MessageEdited {
            message: updated.clone(),
        });

        Ok(updated)
    }

    /// Soft-delete a message. Sender-only and idempotent: deleting a
    /// tombstone is a no-op success and broadcasts nothing.
    pub async fn soft_delete(&self, message_id: i64, requester_id: &str) -> Result<(), AppError> {
        let existing = self
            .messages
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", message_id)))?;

        self.guard
            .check_membership(requester_id, existing.room_id)
            .await?;

        if existing.sender_id != requester_id {
            return Err(AppError::Forbidden(
                "Only the sender may delete a message".into(),
            ));
        }
        if existing.is_deleted() {
            return Ok(());
        }

        self.messages.mark_deleted(message_id, Utc::now()).await?;

        self.publisher.publish(RoomEvent::MessageDeleted {
            room_id: existing.room_id,
            message_id,
            sequence: existing.sequence,
        });

        Ok(())
    }

    /// Fetch a history page. With a cursor: messages with
    /// `sequence > after_sequence`, ascending, capped at `limit`. Without:
    /// the most recent `limit` messages, still ascending.
    pub async fn page(
        &self,
        room_id: i64,
        identity: &str,
        after_sequence: Option<i64>,
        limit: Option<i64>,
    ) -> Result<MessagePage, AppError> {
        let room = self.guard.check_membership(identity, room_id).await?;
        let limit = limit
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size);

        match after_sequence {
            Some(after) => {
                // Fetch one past the window to learn whether more exist.
                let mut messages = self.messages.page_after(room_id, after, limit + 1).await?;
                let has_more = messages.len() as i64 > limit;
                messages.truncate(limit as usize);
                Ok(MessagePage { messages, has_more })
            }
            None => {
                let messages = self.messages.page_latest(room_id, limit).await?;
                // The room row's counter covers appends committed after the
                // query was served.
                let has_more = messages
                    .last()
                    .map(|m| m.sequence < room.last_sequence)
                    .unwrap_or(false);
                Ok(MessagePage { messages, has_more })
            }
        }
    }

    fn room_lock(&self, room_id: i64) -> Arc<Mutex<()>> {
        self.room_locks
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Look up a previously committed send for this key, dropping the entry
    /// once the retention window has passed.
    async fn replayed_send(&self, key: &SendKey) -> Result<Option<Message>, AppError> {
        let message_id = match self.recent_sends.get(key) {
            Some(entry) => {
                let (message_id, committed_at) = *entry.value();
                if committed_at.elapsed() > self.config.dedup_retention {
                    drop(entry);
                    self.recent_sends.remove(key);
                    return Ok(None);
                }
                message_id
            }
            None => return Ok(None),
        };

        tracing::debug!(
            room_id = key.0,
            client_msg_id = %key.2,
            "Duplicate send replayed from dedup window"
        );
        self.messages.find_by_id(message_id).await
    }

    fn remember_send(&self, key: SendKey, message_id: i64) {
        // Opportunistic sweep keeps the map bounded without a background task.
        if self.recent_sends.len() > 10_000 {
            let retention = self.config.dedup_retention;
            self.recent_sends
                .retain(|_, (_, committed_at)| committed_at.elapsed() <= retention);
        }
        self.recent_sends.insert(key, (message_id, Instant::now()));
    }

    async fn append_with_retry(
        &self,
        room_id: i64,
        sender_id: &str,
        body: &str,
        attachment_ref: Option<&str>,
    ) -> Result<Message, AppError> {
        let mut attempt: u32 = 0;
        loop {
            let id = self.id_generator.generate();
            match self
                .messages
                .append(room_id, id, sender_id, body, attachment_ref)
                .await
            {
                Ok(message) => return Ok(message),
                Err(AppError::Database(e)) if attempt < self.config.append_retry_attempts => {
                    attempt += 1;
                    let backoff = self.backoff_for(attempt);
                    tracing::warn!(
                        room_id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Append transaction failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(AppError::Database(e)) => {
                    tracing::error!(room_id, error = %e, "Append exhausted retries");
                    return Err(AppError::Unavailable("Message store unavailable".into()));
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self.config.append_retry_backoff * 2u32.saturating_pow(attempt - 1);
        let jitter_ms = rand::rng().random_range(0..=base.as_millis().max(1) as u64 / 2);
        base + Duration::from_millis(jitter_ms)
    }
}
