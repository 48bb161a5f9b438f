//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **RoomGuard**: membership checks ahead of every room operation
//! - **RoomService**: room lifecycle and participant listings
//! - **MessageService**: append/edit/soft-delete/page with per-room
//!   sequence serialization and send deduplication
//! - **PresenceTracker**: ephemeral typing state with TTL expiry
//! - **TokenVerifier**: external token verification seam

pub mod auth_service;
pub mod authorization;
pub mod message_service;
pub mod presence_service;
pub mod room_service;

pub use auth_service::{Claims, JwtVerifier, TokenVerifier};
pub use authorization::RoomGuard;
pub use message_service::{MessagePage, MessageService, MessageStoreConfig};
pub use presence_service::PresenceTracker;
pub use room_service::RoomService;
