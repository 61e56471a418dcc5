//! Protocol Module
//!
//! Defines the wire protocol shared by the user, admin and updater roles.
//!
//! ## Frame Format
//! ```text
//! ┌──────────────┬──────────────┬─────────────────────────────┐
//! │ TotalLen (4) │  TypeTag (4) │           Payload           │
//! └──────────────┴──────────────┴─────────────────────────────┘
//! ```
//! Both header fields are big-endian `i32`. `TotalLen` counts the whole
//! frame, header included, and never exceeds [`MAX_MESSAGE_SIZE`]. The
//! session id a message belongs to is never on the wire.
//!
//! ### Type Tag Ranges
//! - 1..=8:     user requests (answers are request + 100)
//! - 201..=206: admin requests (answers are request + 100)
//! - 401:       updater requests (answers are request + 100)
//! - 901..=903: system notices sent by the server

mod codec;
mod message;
mod notice;
mod wire;

pub mod admin;
pub mod updater;
pub mod user;

pub use codec::{
    decode, encode, encode_message, read_frame, write_frame, HEADER_SIZE, MAX_MESSAGE_SIZE,
    MAX_PAYLOAD_SIZE,
};
pub use message::{Inbound, Message, MessageType};
pub use notice::SystemNotice;
pub use wire::{PayloadReader, PayloadWriter};

/// Status of a CONNECT-style answer, shared by every role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ConnectStatus {
    Ok = 0,
    VersionError = 1,
}

impl ConnectStatus {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::VersionError),
            _ => None,
        }
    }
}
