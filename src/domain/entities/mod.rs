//! # Domain Entities
//!
//! Core domain entities of the messaging engine.
//!
//! - **Room**: a durable conversation scoped to a fixed two-party
//!   participant set (diner and restaurant owner)
//! - **Message**: an ordered message within a room, soft-deletable
//!
//! Each entity has an associated repository trait defining data access
//! operations. These traits are implemented in the infrastructure layer,
//! following the dependency inversion principle.

mod message;
mod room;

pub use message::{Message, MessageRepository, TOMBSTONE_BODY};
pub use room::{Room, RoomRepository};
