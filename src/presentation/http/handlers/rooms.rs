//! Room Handlers
//!
//! The plain request/response surface for non-live clients: open a
//! conversation, list rooms, fetch a history page, archive. All delegate
//! directly to the Room Registry and Message Store without touching the
//! gateway.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::application::dto::{HistoryQuery, HistoryResponse, MessageResponse, OpenRoomRequest, RoomResponse};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

/// Open (or resolve) the conversation with a counterpart
pub async fn open_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<OpenRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), AppError> {
    body.validate().map_err(validation_error)?;

    let room = state
        .rooms
        .get_or_create(&auth.identity, &body.counterpart_id)
        .await?;

    Ok((StatusCode::CREATED, Json(RoomResponse::from(room))))
}

/// List the caller's rooms, most recent activity first
pub async fn list_rooms(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<RoomResponse>>, AppError> {
    let rooms = state.rooms.list_rooms_for(&auth.identity).await?;
    Ok(Json(rooms.into_iter().map(RoomResponse::from).collect()))
}

/// Fetch a history page by sequence cursor
pub async fn get_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(room_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let room_id: i64 = room_id
        .parse()
        .map_err(|_| AppError::Validation("Invalid room ID".into()))?;

    let page = state
        .messages
        .page(room_id, &auth.identity, query.after, query.limit)
        .await?;

    Ok(Json(HistoryResponse {
        messages: page
            .messages
            .into_iter()
            .map(MessageResponse::from)
            .collect(),
        has_more: page.has_more,
    }))
}

/// Archive a room; it stays readable but rejects new sends
pub async fn archive_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(room_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let room_id: i64 = room_id
        .parse()
        .map_err(|_| AppError::Validation("Invalid room ID".into()))?;

    state.rooms.archive(room_id, &auth.identity).await?;
    Ok(StatusCode::NO_CONTENT)
}
