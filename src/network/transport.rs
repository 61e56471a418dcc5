//! Transport boundary
//!
//! The core only ever sends whole frames to a session id and asks for a
//! connection to be dropped; sockets stay behind this trait.

use crate::error::Result;
use crate::protocol::{encode, MessageType, SystemNotice};
use crate::session::SessionId;

/// Outbound side of a connection engine
pub trait Transport: Send + Sync {
    /// Blocking send of one encoded frame
    fn send(&self, session_id: SessionId, frame: &[u8]) -> Result<()>;

    /// Drop the connection behind a session id; idempotent
    fn disconnect(&self, session_id: SessionId);
}

/// Encode then send; an oversized frame fails before anything is sent
pub fn send_frame(
    transport: &dyn Transport,
    session_id: SessionId,
    message_type: MessageType,
    payload: &[u8],
) -> Result<()> {
    let frame = encode(message_type, payload)?;
    transport.send(session_id, &frame)
}

/// Best-effort notice, failures are only logged
pub fn send_notice(transport: &dyn Transport, session_id: SessionId, notice: SystemNotice) {
    if let Err(e) = send_frame(transport, session_id, notice.message_type(), &notice.payload()) {
        tracing::debug!("Could not send {:?} to session {}: {}", notice, session_id, e);
    }
}
