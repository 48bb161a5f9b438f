//! Data Transfer Objects
//!
//! Request and response shapes for the REST surface and gateway payloads.

pub mod request;
pub mod response;

pub use request::{HistoryQuery, OpenRoomRequest};
pub use response::{HistoryResponse, MessageResponse, RoomResponse};
