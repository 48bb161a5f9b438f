//! Room Registry tests: idempotent creation, activity ordering, archiving.

use futures::future::join_all;
use pretty_assertions::assert_eq;

use dinetalk::shared::error::AppError;

use crate::common::test_state;

#[tokio::test]
async fn get_or_create_is_idempotent_in_both_argument_orders() {
    let (state, _) = test_state();

    let first = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();
    let second = state.rooms.get_or_create("owner_1", "diner_1").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.participant_ids, second.participant_ids);
    assert!(!first.archived);
}

#[tokio::test]
async fn concurrent_creation_converges_on_one_room() {
    let (state, _) = test_state();

    let attempts = (0..8).map(|i| {
        let rooms = state.rooms.clone();
        tokio::spawn(async move {
            let (a, b) = if i % 2 == 0 {
                ("diner_1", "owner_1")
            } else {
                ("owner_1", "diner_1")
            };
            rooms.get_or_create(a, b).await.unwrap().id
        })
    });

    let ids: Vec<i64> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert!(ids.windows(2).all(|w| w[0] == w[1]), "ids diverged: {:?}", ids);
}

#[tokio::test]
async fn rooms_are_ordered_by_most_recent_activity() {
    let (state, _) = test_state();

    let first = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();
    let second = state.rooms.get_or_create("diner_1", "owner_2").await.unwrap();

    // Newest room leads until the older one sees traffic.
    let listed = state.rooms.list_rooms_for("diner_1").await.unwrap();
    assert_eq!(listed[0].id, second.id);

    state
        .messages
        .append(first.id, "diner_1", "are you open tonight?", None, "c1")
        .await
        .unwrap();

    let listed = state.rooms.list_rooms_for("diner_1").await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, first.id);
}

#[tokio::test]
async fn archived_rooms_reject_sends_but_stay_readable() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    state
        .messages
        .append(room.id, "diner_1", "hello", None, "c1")
        .await
        .unwrap();

    state.rooms.archive(room.id, "owner_1").await.unwrap();

    let err = state
        .messages
        .append(room.id, "diner_1", "anyone there?", None, "c2")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RoomArchived));

    // History and resync still work.
    let page = state
        .messages
        .page(room.id, "diner_1", Some(0), None)
        .await
        .unwrap();
    assert_eq!(page.messages.len(), 1);
}

#[tokio::test]
async fn archive_requires_membership() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    let err = state.rooms.archive(room.id, "stranger").await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn archive_is_idempotent() {
    let (state, _) = test_state();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    state.rooms.archive(room.id, "diner_1").await.unwrap();
    state.rooms.archive(room.id, "diner_1").await.unwrap();

    let listed = state.rooms.list_rooms_for("diner_1").await.unwrap();
    assert!(listed[0].archived);
}

#[tokio::test]
async fn conversation_with_yourself_is_rejected() {
    let (state, _) = test_state();

    let err = state
        .rooms
        .get_or_create("diner_1", "diner_1")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}
