//! Room API Tests
//!
//! Drives the plain request/response surface end to end: open a
//! conversation, list rooms, page history, archive.

use axum::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::json;

use dinetalk::application::dto::{HistoryResponse, RoomResponse};
use dinetalk::presentation::http::routes::create_router;
use dinetalk::startup::AppState;

use crate::common::{bearer, test_state};

fn server() -> (TestServer, AppState) {
    let (state, _) = test_state();
    let server = TestServer::new(create_router(state.clone())).unwrap();
    (server, state)
}

fn auth_header(identity: &str) -> HeaderValue {
    HeaderValue::from_str(&bearer(identity)).unwrap()
}

#[tokio::test]
async fn room_routes_require_a_token() {
    let (server, _) = server();

    let response = server.get("/api/v1/rooms").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = server
        .get("/api/v1/rooms")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer garbage"))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn opening_a_conversation_is_idempotent_and_visible_to_both() {
    let (server, _) = server();

    let response = server
        .post("/api/v1/rooms")
        .add_header(AUTHORIZATION, auth_header("diner_1"))
        .json(&json!({ "counterpart_id": "owner_1" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let room: RoomResponse = response.json();

    // The counterpart opening the same pair resolves the same room.
    let response = server
        .post("/api/v1/rooms")
        .add_header(AUTHORIZATION, auth_header("owner_1"))
        .json(&json!({ "counterpart_id": "diner_1" }))
        .await;
    let same: RoomResponse = response.json();
    assert_eq!(room.id, same.id);

    let response = server
        .get("/api/v1/rooms")
        .add_header(AUTHORIZATION, auth_header("owner_1"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let rooms: Vec<RoomResponse> = response.json();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].id, room.id);
}

#[tokio::test]
async fn opening_a_conversation_with_yourself_is_rejected() {
    let (server, _) = server();

    let response = server
        .post("/api/v1/rooms")
        .add_header(AUTHORIZATION, auth_header("diner_1"))
        .json(&json!({ "counterpart_id": "diner_1" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn history_pages_by_sequence_cursor() {
    let (server, state) = server();

    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();
    for i in 1..=5 {
        state
            .messages
            .append(room.id, "diner_1", &format!("message {}", i), None, &format!("c{}", i))
            .await
            .unwrap();
    }

    let response = server
        .get(&format!("/api/v1/rooms/{}/messages?after=2&limit=2", room.id))
        .add_header(AUTHORIZATION, auth_header("owner_1"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let history: HistoryResponse = response.json();
    let sequences: Vec<i64> = history.messages.iter().map(|m| m.sequence).collect();
    assert_eq!(sequences, vec![3, 4]);
    assert!(history.has_more);
}

#[tokio::test]
async fn foreign_room_history_is_forbidden() {
    let (server, state) = server();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    let response = server
        .get(&format!("/api/v1/rooms/{}/messages", room.id))
        .add_header(AUTHORIZATION, auth_header("stranger"))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    // Unknown rooms look exactly the same from outside.
    let response = server
        .get("/api/v1/rooms/999999/messages")
        .add_header(AUTHORIZATION, auth_header("stranger"))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_room_ids_are_rejected() {
    let (server, _) = server();

    let response = server
        .get("/api/v1/rooms/not-a-room/messages")
        .add_header(AUTHORIZATION, auth_header("diner_1"))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn archive_flow() {
    let (server, state) = server();
    let room = state.rooms.get_or_create("diner_1", "owner_1").await.unwrap();

    let response = server
        .post(&format!("/api/v1/rooms/{}/archive", room.id))
        .add_header(AUTHORIZATION, auth_header("diner_1"))
        .await;
    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);

    let response = server
        .get("/api/v1/rooms")
        .add_header(AUTHORIZATION, auth_header("owner_1"))
        .await;
    let rooms: Vec<RoomResponse> = response.json();
    assert!(rooms[0].archived);

    let response = server
        .post(&format!("/api/v1/rooms/{}/archive", room.id))
        .add_header(AUTHORIZATION, auth_header("stranger"))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}
