//! Room Repository Implementation
//!
//! PostgreSQL implementation of room persistence. Creation relies on the
//! unique pair-key index: `ON CONFLICT DO NOTHING` makes concurrent
//! `get_or_create` calls for the same pair converge on the first writer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Room, RoomRepository};
use crate::shared::error::AppError;

pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    /// Creates a new PgRoomRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for room queries.
/// Maps to the rooms table schema defined in the migration.
#[derive(Debug, sqlx::FromRow)]
struct RoomRow {
    id: i64,
    participant_a: String,
    participant_b: String,
    archived: bool,
    last_sequence: i64,
    last_activity_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl RoomRow {
    fn into_room(self) -> Room {
        Room {
            id: self.id,
            participant_ids: vec![self.participant_a, self.participant_b],
            archived: self.archived,
            last_sequence: self.last_sequence,
            last_activity_at: self.last_activity_at,
            created_at: self.created_at,
        }
    }
}

const ROOM_COLUMNS: &str =
    "id, participant_a, participant_b, archived, last_sequence, last_activity_at, created_at";

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Room>, AppError> {
        let row = sqlx::query_as::<_, RoomRow>(&format!(
            "SELECT {} FROM rooms WHERE id = $1",
            ROOM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_room()))
    }

    async fn find_by_pair_key(&self, pair_key: &str) -> Result<Option<Room>, AppError> {
        let row = sqlx::query_as::<_, RoomRow>(&format!(
            "SELECT {} FROM rooms WHERE pair_key = $1",
            ROOM_COLUMNS
        ))
        .bind(pair_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_room()))
    }

    /// Insert-if-absent on the canonical pair key. `None` means another
    /// writer won the race and the caller should re-fetch.
    async fn create(&self, room: &Room) -> Result<Option<Room>, AppError> {
        let row = sqlx::query_as::<_, RoomRow>(&format!(
            r#"
            INSERT INTO rooms (id, pair_key, participant_a, participant_b,
                               archived, last_sequence, last_activity_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (pair_key) DO NOTHING
            RETURNING {}
            "#,
            ROOM_COLUMNS
        ))
        .bind(room.id)
        .bind(room.pair_key())
        .bind(&room.participant_ids[0])
        .bind(&room.participant_ids[1])
        .bind(room.archived)
        .bind(room.last_sequence)
        .bind(room.last_activity_at)
        .bind(room.created_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_room()))
    }

    async fn find_by_participant(&self, identity: &str) -> Result<Vec<Room>, AppError> {
        let rows = sqlx::query_as::<_, RoomRow>(&format!(
            r#"
            SELECT {}
            FROM rooms
            WHERE participant_a = $1 OR participant_b = $1
            ORDER BY last_activity_at DESC
            "#,
            ROOM_COLUMNS
        ))
        .bind(identity)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_room()).collect())
    }

    async fn set_archived(&self, id: i64) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE rooms SET archived = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Room {} not found", id)));
        }

        Ok(())
    }
}
