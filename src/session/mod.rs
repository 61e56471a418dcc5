//! Session Module
//!
//! Per-connection state and inbound message queue.
//!
//! ## Responsibilities
//! - Connection and quick match state machines
//! - Bounded FIFO of inbound messages with a leaf-level lock
//! - Fixed slot table addressed by id, with generation-checked handles

mod queue;
mod state;
mod table;

pub use queue::MessageQueue;
pub use state::{QuickMatchStatus, SessionState, SessionStatus};
pub use table::{Session, SessionHandle, SessionTable};

/// Stable integer id of a session slot
pub type SessionId = usize;
