//! Updater protocol
//!
//! The updater only checks that its protocol version matches the server.
//!
//! ### Requests
//! - 401: UPDATER_CONNECT - Payload: version (4)

use bytes::Bytes;

use crate::error::{Result, SkirmishError};
use super::{encode, ConnectStatus, Message, MessageType, PayloadReader, PayloadWriter};

pub const UPDATER_CONNECT: MessageType = 401;
pub const UPDATER_CONNECT_ANSWER: MessageType = 501;

/// A parsed updater request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterRequest {
    Connect { version: i32 },
}

impl UpdaterRequest {
    pub fn decode(message: &Message) -> Result<Self> {
        if message.message_type != UPDATER_CONNECT {
            return Err(SkirmishError::wrong_protocol(format!(
                "Unknown updater request type: {}",
                message.message_type
            )));
        }

        let mut reader = PayloadReader::new(message.payload.clone());
        let version = reader.read_i32("version")?;
        reader.finish("updater request")?;
        Ok(Self::Connect { version })
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let Self::Connect { version } = self;
        encode(UPDATER_CONNECT, &PayloadWriter::new().put_i32(*version).finish())
    }
}

/// An updater answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterAnswer {
    Connect { status: ConnectStatus },
}

impl UpdaterAnswer {
    pub fn message_type(&self) -> MessageType {
        UPDATER_CONNECT_ANSWER
    }

    pub fn payload(&self) -> Bytes {
        let Self::Connect { status } = self;
        PayloadWriter::new().put_i32(*status as i32).finish()
    }

    pub fn decode(message_type: MessageType, payload: Bytes) -> Result<Self> {
        if message_type != UPDATER_CONNECT_ANSWER {
            return Err(SkirmishError::wrong_protocol(format!(
                "Unknown updater answer type: {}",
                message_type
            )));
        }
        let mut reader = PayloadReader::new(payload);
        let code = reader.read_i32("connect status")?;
        let status = ConnectStatus::from_code(code).ok_or_else(|| {
            SkirmishError::wrong_protocol(format!("Unknown connect status {}", code))
        })?;
        Ok(Self::Connect { status })
    }
}
