//! WebSocket Gateway
//!
//! Real-time communication via WebSocket connections.

pub mod gateway;
pub mod handler;
pub mod messages;
pub mod session;

pub use gateway::{CloseReason, Gateway};
pub use handler::ws_handler;
pub use messages::{ClientEvent, ServerEvent};
pub use session::{SessionPhase, SessionState};
