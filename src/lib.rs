//! # DineTalk Library
//!
//! The real-time messaging engine of a restaurant discovery platform:
//! - Durable two-party rooms between diners and restaurant owners
//! - Ordered messages with gap-free per-room sequence numbers
//! - Soft-delete, sequence-cursor pagination and reconnection resync
//! - Ephemeral typing/presence signals
//! - WebSocket gateway with bounded per-session queues, plus a small REST
//!   surface for non-live clients
//!
//! ## Module Structure
//!
//! ```text
//! dinetalk/
//! +-- config/         Configuration management
//! +-- domain/         Entities and repository traits
//! +-- application/    Services, room events, and DTOs
//! +-- infrastructure/ Database, repositories, metrics
//! +-- presentation/   HTTP routes and WebSocket gateway
//! +-- shared/         Common utilities (errors, snowflake IDs)
//! ```

// Configuration module
pub mod config;

// Domain layer - Entities and repository traits
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
