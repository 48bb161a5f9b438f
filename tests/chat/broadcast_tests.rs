//! Gateway fan-out tests: commit-order broadcast, slow-consumer protection,
//! typing signals and archive notifications over live (fake) sessions.

use std::time::Duration;

use pretty_assertions::assert_eq;

use dinetalk::application::events::{EventPublisher, RoomEvent};
use dinetalk::presentation::websocket::{CloseReason, ServerEvent};

use crate::common::{connect_session, drain_events, test_settings, test_state, test_state_with_settings};

#[tokio::test]
async fn message_broadcasts_reach_all_room_sessions_in_commit_order() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    let (mut rx_a, _close_a) = connect_session(&state, "c1", "diner_1", &[room.id], 64);
    let (mut rx_b, _close_b) = connect_session(&state, "c2", "owner_1", &[room.id], 64);

    state
        .messages
        .append(room.id, "diner_1", "Hi", None, "a-1")
        .await
        .unwrap();
    state
        .messages
        .append(room.id, "owner_1", "Hello", None, "b-1")
        .await
        .unwrap();

    for rx in [&mut rx_a, &mut rx_b] {
        let events = drain_events(rx);
        let sequences: Vec<i64> = events
            .iter()
            .map(|e| match e {
                ServerEvent::Message { message } => message.sequence,
                other => panic!("unexpected event: {:?}", other),
            })
            .collect();
        assert_eq!(sequences, vec![1, 2]);
    }
}

#[tokio::test]
async fn rejected_sends_broadcast_nothing() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    let (mut rx_a, _close_a) = connect_session(&state, "c1", "diner_1", &[room.id], 64);
    let (mut rx_b, _close_b) = connect_session(&state, "c2", "owner_1", &[room.id], 64);

    let err = state
        .messages
        .append(room.id, "stranger", "knock knock", None, "x-1")
        .await
        .unwrap_err();
    assert!(matches!(err, dinetalk::shared::error::AppError::Forbidden(_)));

    assert!(drain_events(&mut rx_a).is_empty());
    assert!(drain_events(&mut rx_b).is_empty());
}

#[tokio::test]
async fn edits_and_deletes_broadcast_exactly_once() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();
    let message = state
        .messages
        .append(room.id, "diner_1", "typo", None, "c1")
        .await
        .unwrap();

    let (mut rx_b, _close_b) = connect_session(&state, "c2", "owner_1", &[room.id], 64);

    state
        .messages
        .edit(message.id, "diner_1", "fixed")
        .await
        .unwrap();
    state
        .messages
        .soft_delete(message.id, "diner_1")
        .await
        .unwrap();
    // Idempotent repeat must not re-broadcast.
    state
        .messages
        .soft_delete(message.id, "diner_1")
        .await
        .unwrap();

    let events = drain_events(&mut rx_b);
    assert_eq!(events.len(), 2);
    match &events[0] {
        ServerEvent::MessageEdited { message } => assert_eq!(message.body, "fixed"),
        other => panic!("unexpected event: {:?}", other),
    }
    match &events[1] {
        ServerEvent::MessageDeleted { sequence, .. } => assert_eq!(*sequence, 1),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn slow_consumer_is_closed_while_fast_peer_keeps_receiving() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    let (_rx_slow, mut close_slow) = connect_session(&state, "slow", "owner_1", &[room.id], 1);
    let (mut rx_fast, _close_fast) = connect_session(&state, "fast", "diner_1", &[room.id], 64);

    state
        .messages
        .append(room.id, "diner_1", "one", None, "c1")
        .await
        .unwrap();
    state
        .messages
        .append(room.id, "diner_1", "two", None, "c2")
        .await
        .unwrap();

    assert_eq!(
        *close_slow.borrow_and_update(),
        Some(CloseReason::SlowConsumer)
    );
    assert_eq!(state.gateway.session_count(), 1);

    let events = drain_events(&mut rx_fast);
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn typing_signal_skips_the_typist_and_expires_without_an_event() {
    let mut settings = test_settings();
    settings.chat.typing_ttl_secs = 1;
    let (state, _) = test_state_with_settings(settings);
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    let (mut rx_a, _close_a) = connect_session(&state, "c1", "diner_1", &[room.id], 64);
    let (mut rx_b, _close_b) = connect_session(&state, "c2", "owner_1", &[room.id], 64);

    // What the gateway does for a `typing_start` frame from diner_1.
    state.presence.set_typing(room.id, "diner_1");
    state.gateway.publish(RoomEvent::Typing {
        room_id: room.id,
        identity: "diner_1".into(),
        active: true,
        ttl_secs: Some(state.presence.ttl().as_secs()),
    });

    assert!(drain_events(&mut rx_a).is_empty(), "typist must not echo");
    let events = drain_events(&mut rx_b);
    assert_eq!(events.len(), 1);
    match &events[0] {
        ServerEvent::Typing {
            identity,
            active,
            ttl_secs,
            ..
        } => {
            assert_eq!(identity, "diner_1");
            assert!(*active);
            assert_eq!(*ttl_secs, Some(1));
        }
        other => panic!("unexpected event: {:?}", other),
    }

    // TTL elapses with no heartbeat: the entry ages out locally on each
    // client; the server pushes nothing further.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(state.presence.active_typers(room.id).is_empty());
    assert!(drain_events(&mut rx_b).is_empty());
}

#[tokio::test]
async fn typing_clears_when_the_typist_sends() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    state.presence.set_typing(room.id, "diner_1");
    assert_eq!(state.presence.active_typers(room.id), vec!["diner_1"]);

    state
        .messages
        .append(room.id, "diner_1", "done typing", None, "c1")
        .await
        .unwrap();

    assert!(state.presence.active_typers(room.id).is_empty());
}

#[tokio::test]
async fn archiving_notifies_live_sessions() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    let (mut rx_b, _close_b) = connect_session(&state, "c2", "owner_1", &[room.id], 64);

    state.rooms.archive(room.id, "diner_1").await.unwrap();

    let events = drain_events(&mut rx_b);
    assert_eq!(events.len(), 1);
    match &events[0] {
        ServerEvent::RoomArchived { room_id } => assert_eq!(room_id, &room.id.to_string()),
        other => panic!("unexpected event: {:?}", other),
    }
}
