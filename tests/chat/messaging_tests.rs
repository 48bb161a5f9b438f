//! Message Store tests: sequence assignment, edit/delete rules, pagination,
//! deduplication and retry behaviour.

use futures::future::join_all;
use pretty_assertions::assert_eq;

use dinetalk::domain::TOMBSTONE_BODY;
use dinetalk::shared::error::AppError;

use crate::common::test_state;

#[tokio::test]
async fn sequences_are_gap_free_from_one() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    for i in 1..=5 {
        let message = state
            .messages
            .append(room.id, "diner_1", &format!("message {}", i), None, &format!("c{}", i))
            .await
            .unwrap();
        assert_eq!(message.sequence, i as i64);
    }
}

#[tokio::test]
async fn concurrent_appends_never_share_a_sequence() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    let sends = (0..16).map(|i| {
        let messages = state.messages.clone();
        let room_id = room.id;
        tokio::spawn(async move {
            let sender = if i % 2 == 0 { "diner_1" } else { "owner_1" };
            messages
                .append(room_id, sender, &format!("message {}", i), None, &format!("c{}", i))
                .await
                .unwrap()
                .sequence
        })
    });

    let mut sequences: Vec<i64> = join_all(sends)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    sequences.sort_unstable();

    assert_eq!(sequences, (1..=16).collect::<Vec<i64>>());
}

#[tokio::test]
async fn sequences_are_independent_across_rooms() {
    let (state, _) = test_state();
    let room_a = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();
    let room_b = state.rooms.get_or_create("diner_1", "owner_2").await.unwrap();

    let m1 = state
        .messages
        .append(room_a.id, "diner_1", "hello", None, "c1")
        .await
        .unwrap();
    let m2 = state
        .messages
        .append(room_b.id, "diner_1", "hello", None, "c2")
        .await
        .unwrap();

    assert_eq!(m1.sequence, 1);
    assert_eq!(m2.sequence, 1);
}

#[tokio::test]
async fn only_the_sender_may_edit() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();
    let message = state
        .messages
        .append(room.id, "diner_1", "helo", None, "c1")
        .await
        .unwrap();

    let err = state
        .messages
        .edit(message.id, "owner_1", "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let edited = state
        .messages
        .edit(message.id, "diner_1", "hello")
        .await
        .unwrap();
    assert_eq!(edited.body, "hello");
    assert_eq!(edited.sequence, message.sequence);
    assert!(edited.edited_at.is_some());
}

#[tokio::test]
async fn editing_a_tombstone_fails() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();
    let message = state
        .messages
        .append(room.id, "diner_1", "typo", None, "c1")
        .await
        .unwrap();

    state
        .messages
        .soft_delete(message.id, "diner_1")
        .await
        .unwrap();

    let err = state
        .messages
        .edit(message.id, "diner_1", "fixed")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyDeleted));
}

#[tokio::test]
async fn soft_delete_is_sender_only_and_idempotent() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();
    let message = state
        .messages
        .append(room.id, "diner_1", "delete me", None, "c1")
        .await
        .unwrap();

    // Participants may not delete each other's messages.
    let err = state
        .messages
        .soft_delete(message.id, "owner_1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    state
        .messages
        .soft_delete(message.id, "diner_1")
        .await
        .unwrap();
    // Second delete is a no-op success.
    state
        .messages
        .soft_delete(message.id, "diner_1")
        .await
        .unwrap();

    let page = state
        .messages
        .page(room.id, "diner_1", Some(0), None)
        .await
        .unwrap();
    assert_eq!(page.messages.len(), 1);
    assert_eq!(page.messages[0].body, TOMBSTONE_BODY);
    assert!(page.messages[0].is_deleted());
    assert_eq!(page.messages[0].sequence, 1);
}

#[tokio::test]
async fn pagination_windows_are_exact() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();
    for i in 1..=10 {
        state
            .messages
            .append(room.id, "diner_1", &format!("message {}", i), None, &format!("c{}", i))
            .await
            .unwrap();
    }

    let page = state
        .messages
        .page(room.id, "diner_1", Some(4), Some(3))
        .await
        .unwrap();
    let sequences: Vec<i64> = page.messages.iter().map(|m| m.sequence).collect();
    assert_eq!(sequences, vec![5, 6, 7]);
    assert!(page.has_more);

    let page = state
        .messages
        .page(room.id, "diner_1", Some(7), Some(3))
        .await
        .unwrap();
    let sequences: Vec<i64> = page.messages.iter().map(|m| m.sequence).collect();
    assert_eq!(sequences, vec![8, 9, 10]);
    assert!(!page.has_more);

    let page = state
        .messages
        .page(room.id, "diner_1", Some(10), Some(3))
        .await
        .unwrap();
    assert!(page.messages.is_empty());
    assert!(!page.has_more);

    // No cursor: the most recent `limit`, still ascending.
    let page = state
        .messages
        .page(room.id, "diner_1", None, Some(4))
        .await
        .unwrap();
    let sequences: Vec<i64> = page.messages.iter().map(|m| m.sequence).collect();
    assert_eq!(sequences, vec![7, 8, 9, 10]);
    assert!(!page.has_more);
}

#[tokio::test]
async fn non_participants_get_forbidden_regardless_of_room_existence() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    // Existing room, stranger.
    let err = state
        .messages
        .append(room.id, "stranger", "let me in", None, "c1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = state
        .messages
        .page(room.id, "stranger", Some(0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // Unknown room: observably identical.
    let err = state
        .messages
        .append(999_999, "stranger", "anyone?", None, "c2")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn duplicate_client_msg_id_replays_the_original() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    let first = state
        .messages
        .append(room.id, "diner_1", "hello", None, "retry-1")
        .await
        .unwrap();
    let replay = state
        .messages
        .append(room.id, "diner_1", "hello", None, "retry-1")
        .await
        .unwrap();

    assert_eq!(first.id, replay.id);
    assert_eq!(first.sequence, replay.sequence);

    // The next distinct send continues the sequence without a gap.
    let next = state
        .messages
        .append(room.id, "diner_1", "hello again", None, "retry-2")
        .await
        .unwrap();
    assert_eq!(next.sequence, 2);
}

#[tokio::test]
async fn transient_store_failures_are_retried() {
    let (state, store) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    // Two failures, three retries configured: the append still lands.
    store.fail_next_appends(2);
    let message = state
        .messages
        .append(room.id, "diner_1", "eventually", None, "c1")
        .await
        .unwrap();
    assert_eq!(message.sequence, 1);

    // Outage longer than the retry budget surfaces `Unavailable`.
    store.fail_next_appends(10);
    let err = state
        .messages
        .append(room.id, "diner_1", "down", None, "c2")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unavailable(_)));
    store.fail_next_appends(0);

    // The caller resends with the same client id; exactly one row results.
    let resent = state
        .messages
        .append(room.id, "diner_1", "down", None, "c2")
        .await
        .unwrap();
    let replay = state
        .messages
        .append(room.id, "diner_1", "down", None, "c2")
        .await
        .unwrap();
    assert_eq!(resent.id, replay.id);
    assert_eq!(resent.sequence, 2);
}

#[tokio::test]
async fn body_validation_rejects_empty_and_oversized() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    let err = state
        .messages
        .append(room.id, "diner_1", "   ", None, "c1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let oversized = "x".repeat(4001);
    let err = state
        .messages
        .append(room.id, "diner_1", &oversized, None, "c2")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = state
        .messages
        .append(room.id, "diner_1", "hello", None, "")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn unknown_message_ids_are_not_found_for_members() {
    let (state, _) = test_state();
    state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    let err = state
        .messages
        .edit(424_242, "diner_1", "ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = state
        .messages
        .soft_delete(424_242, "diner_1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

/// The two-party conversation walk-through: send, reply, edit, delete,
/// then a cursor-zero resync sees both rows in order with the second
/// tombstoned.
#[tokio::test]
async fn conversation_walkthrough_with_resync() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    let hi = state
        .messages
        .append(room.id, "diner_1", "Hi", None, "a-1")
        .await
        .unwrap();
    assert_eq!(hi.sequence, 1);

    let hello = state
        .messages
        .append(room.id, "owner_1", "Hello", None, "b-1")
        .await
        .unwrap();
    assert_eq!(hello.sequence, 2);

    let edited = state
        .messages
        .edit(hi.id, "diner_1", "Hi there")
        .await
        .unwrap();
    assert!(edited.edited_at.is_some());
    assert_eq!(edited.sequence, 1);

    state
        .messages
        .soft_delete(hello.id, "owner_1")
        .await
        .unwrap();

    // Reconnecting client with last_seen_sequence = 0 pulls the delta.
    let page = state
        .messages
        .page(room.id, "owner_1", Some(0), None)
        .await
        .unwrap();
    assert_eq!(page.messages.len(), 2);
    assert!(!page.has_more);

    assert_eq!(page.messages[0].sequence, 1);
    assert_eq!(page.messages[0].body, "Hi there");
    assert!(!page.messages[0].is_deleted());

    assert_eq!(page.messages[1].sequence, 2);
    assert_eq!(page.messages[1].body, TOMBSTONE_BODY);
    assert!(page.messages[1].is_deleted());
}
