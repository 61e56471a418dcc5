//! System notices
//!
//! Frames the server sends outside any request/answer pair.
//!
//! - 901: MAX_CONNECTION_REACHED - Payload: empty
//! - 902: DISCONNECTED           - Payload: reason (4)
//! - 903: SERVER_SHUTTING_DOWN   - Payload: empty
//! - 904: ADMIN_MESSAGE          - Payload: text (str)
//! - 905: ACCOUNT_MAINTENANCE    - Payload: empty

use bytes::Bytes;

use crate::error::{DisconnectReason, Result, SkirmishError};
use super::{MessageType, PayloadReader, PayloadWriter};

/// A frame sent by the server on its own initiative
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemNotice {
    /// No session slot is free for this connection
    MaxConnectionReached,

    /// The server is about to drop this connection
    Disconnected { reason: DisconnectReason },

    /// The request was not processed because the server is shutting down
    ServerShuttingDown,

    /// Text pushed by an administrator
    AdminMessage { text: String },

    /// The account was locked; the connection is dropped next
    AccountMaintenance,
}

impl SystemNotice {
    pub const MAX_CONNECTION_REACHED: MessageType = 901;
    pub const DISCONNECTED: MessageType = 902;
    pub const SERVER_SHUTTING_DOWN: MessageType = 903;
    pub const ADMIN_MESSAGE: MessageType = 904;
    pub const ACCOUNT_MAINTENANCE: MessageType = 905;

    pub fn message_type(&self) -> MessageType {
        match self {
            Self::MaxConnectionReached => Self::MAX_CONNECTION_REACHED,
            Self::Disconnected { .. } => Self::DISCONNECTED,
            Self::ServerShuttingDown => Self::SERVER_SHUTTING_DOWN,
            Self::AdminMessage { .. } => Self::ADMIN_MESSAGE,
            Self::AccountMaintenance => Self::ACCOUNT_MAINTENANCE,
        }
    }

    pub fn payload(&self) -> Bytes {
        match self {
            Self::Disconnected { reason } => PayloadWriter::new().put_i32(reason.code()).finish(),
            Self::AdminMessage { text } => PayloadWriter::new().put_string(text).finish(),
            _ => Bytes::new(),
        }
    }

    /// Whether a tag belongs to the notice range
    pub fn is_notice(message_type: MessageType) -> bool {
        (Self::MAX_CONNECTION_REACHED..=Self::ACCOUNT_MAINTENANCE).contains(&message_type)
    }

    pub fn decode(message_type: MessageType, payload: Bytes) -> Result<Self> {
        match message_type {
            Self::MAX_CONNECTION_REACHED => Ok(Self::MaxConnectionReached),
            Self::SERVER_SHUTTING_DOWN => Ok(Self::ServerShuttingDown),
            Self::ACCOUNT_MAINTENANCE => Ok(Self::AccountMaintenance),
            Self::ADMIN_MESSAGE => {
                let mut reader = PayloadReader::new(payload);
                let text = reader.read_string("admin message")?;
                reader.finish("admin message")?;
                Ok(Self::AdminMessage { text })
            }
            Self::DISCONNECTED => {
                let mut reader = PayloadReader::new(payload);
                let code = reader.read_i32("disconnect reason")?;
                let reason = DisconnectReason::from_code(code).ok_or_else(|| {
                    SkirmishError::wrong_protocol(format!("Unknown disconnect reason {}", code))
                })?;
                Ok(Self::Disconnected { reason })
            }
            other => Err(SkirmishError::wrong_protocol(format!(
                "Unknown notice type {}",
                other
            ))),
        }
    }
}
