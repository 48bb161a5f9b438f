//! Request DTOs
//!
//! Deserialization targets for the REST surface, with `validator` derives.

use serde::Deserialize;
use validator::Validate;

/// Open (or resolve) a conversation with a counterpart.
#[derive(Debug, Deserialize, Validate)]
pub struct OpenRoomRequest {
    /// Identity of the other party (diner or restaurant owner)
    #[validate(length(min = 1, message = "counterpart_id must not be empty"))]
    pub counterpart_id: String,
}

/// History page query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Sequence cursor; messages strictly after this sequence are returned
    pub after: Option<i64>,
    /// Page size, clamped server-side
    pub limit: Option<i64>,
}
