//! # Domain Layer
//!
//! Core entities and repository traits of the messaging engine, independent
//! of any framework or infrastructure concern. Repository traits define the
//! contract the durable store has to satisfy; the one non-negotiable is the
//! atomic increment-and-insert on the message append path.

pub mod entities;

pub use entities::*;
