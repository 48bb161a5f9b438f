//! Repository Implementations
//!
//! Concrete implementations of the repository traits defined in the domain
//! layer.
//!
//! - **PgRoomRepository** / **PgMessageRepository**: PostgreSQL, the
//!   production durable store; the message append path is a single
//!   transaction around the room-counter increment and the row insert.
//! - **InMemoryStore**: one shared state implementing both traits, used by
//!   the integration suite and local development.

pub mod memory;
pub mod message_repository;
pub mod room_repository;

pub use memory::InMemoryStore;
pub use message_repository::PgMessageRepository;
pub use room_repository::PgRoomRepository;
