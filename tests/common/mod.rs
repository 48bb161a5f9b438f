//! Common Test Utilities
//!
//! Shared fixtures: an in-memory application state, a stub token verifier
//! and settings tuned for fast tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::watch;

use dinetalk::application::services::TokenVerifier;
use dinetalk::config::{
    AuthSettings, ChatSettings, CorsSettings, DatabaseSettings, ServerSettings, Settings,
    SnowflakeSettings, WebSocketSettings,
};
use dinetalk::domain::{MessageRepository, RoomRepository};
use dinetalk::infrastructure::repositories::InMemoryStore;
use dinetalk::presentation::websocket::{CloseReason, ServerEvent};
use dinetalk::shared::error::AppError;
use dinetalk::startup::AppState;

/// Verifier accepting tokens of the form `token-<identity>`.
pub struct StubVerifier;

#[async_trait]
impl TokenVerifier for StubVerifier {
    async fn verify(&self, token: &str) -> Result<String, AppError> {
        token
            .strip_prefix("token-")
            .filter(|identity| !identity.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::Unauthenticated("Invalid token".into()))
    }
}

/// Settings tuned for tests: small queues, short backoff, tiny TTLs where
/// a test has to wait them out.
pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseSettings {
            url: "postgres://unused-in-tests".into(),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout: 1,
        },
        auth: AuthSettings {
            jwt_secret: "test-secret-test-secret-test-secret!".into(),
        },
        snowflake: SnowflakeSettings { machine_id: 1 },
        chat: ChatSettings {
            max_body_length: 4000,
            default_page_size: 50,
            max_page_size: 100,
            typing_ttl_secs: 10,
            dedup_retention_secs: 300,
            append_retry_attempts: 3,
            append_retry_backoff_ms: 2,
        },
        websocket: WebSocketSettings {
            max_message_size: 65536,
            outbound_queue_size: 64,
            auth_timeout_secs: 5,
            idle_timeout_secs: 60,
        },
        cors: CorsSettings {
            allowed_origins: vec![],
        },
        environment: "test".into(),
    }
}

/// Application state over a fresh in-memory store.
pub fn test_state() -> (AppState, Arc<InMemoryStore>) {
    test_state_with_settings(test_settings())
}

pub fn test_state_with_settings(settings: Settings) -> (AppState, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let room_repo: Arc<dyn RoomRepository> = store.clone();
    let message_repo: Arc<dyn MessageRepository> = store.clone();
    let state = AppState::assemble(room_repo, message_repo, Arc::new(StubVerifier), None, settings);
    (state, store)
}

/// Bearer header value the stub verifier accepts.
pub fn bearer(identity: &str) -> String {
    format!("Bearer token-{}", identity)
}

/// Register a fake live session on the gateway and join it to the rooms.
/// Returns the outbound event receiver and the close-signal receiver.
pub fn connect_session(
    state: &AppState,
    connection_id: &str,
    identity: &str,
    rooms: &[i64],
    queue_size: usize,
) -> (
    mpsc::Receiver<ServerEvent>,
    watch::Receiver<Option<CloseReason>>,
) {
    let (tx, rx) = mpsc::channel(queue_size);
    let close_rx = state.gateway.register_session(connection_id, identity, tx);
    for room_id in rooms {
        state.gateway.join_room(connection_id, *room_id);
    }
    (rx, close_rx)
}

/// Drain every event currently queued for a session.
pub fn drain_events(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
