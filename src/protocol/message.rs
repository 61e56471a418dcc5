//! Message definitions
//!
//! A decoded frame plus the local routing metadata attached to it.

use bytes::Bytes;

use crate::session::SessionId;

/// Type tag carried in every frame header
pub type MessageType = i32;

/// A decoded message routed to or from a session
///
/// `session_id` is local bookkeeping only; the codec never writes it.
/// `Clone` shares the payload buffer, use [`Message::copy`] for an
/// independent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Type tag from the frame header
    pub message_type: MessageType,

    /// Originating (inbound) or target (outbound) session
    pub session_id: SessionId,

    /// Raw payload bytes, header excluded
    pub payload: Bytes,
}

impl Message {
    /// Create a message for the given session
    pub fn new(session_id: SessionId, message_type: MessageType, payload: impl Into<Bytes>) -> Self {
        Self {
            message_type,
            session_id,
            payload: payload.into(),
        }
    }

    /// Deep copy with a payload buffer that does not alias this one
    pub fn copy(&self) -> Self {
        Self {
            message_type: self.message_type,
            session_id: self.session_id,
            payload: Bytes::copy_from_slice(&self.payload),
        }
    }

    /// Total encoded size of this message, header included
    pub fn frame_len(&self) -> usize {
        super::HEADER_SIZE + self.payload.len()
    }
}

/// An entry of a session's inbound queue
///
/// Connection open/close notifications travel through the same queue as
/// application frames so a session sees its whole lifecycle in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// The transport accepted a connection for this slot
    Open,

    /// The transport lost the connection for this slot
    Close,

    /// An application frame
    Frame(Message),
}
