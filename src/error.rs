//! Error types for Skirmish
//!
//! Provides a unified error type for all operations.
//!
//! The dispatch step of each role worker is the only place where an error is
//! turned into a connection teardown; see [`SkirmishError::is_disconnect`].

use std::fmt;

use thiserror::Error;

use crate::session::SessionId;

/// Result type alias using SkirmishError
pub type Result<T> = std::result::Result<T, SkirmishError>;

/// Reason carried by a disconnect-class error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum DisconnectReason {
    WrongProtocol = 1,
    MaximumConnectionReached = 2,
    SessionNotOpened = 3,
    NotLoggedIn = 4,
}

impl DisconnectReason {
    /// Wire code sent in a DISCONNECTED notice
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::WrongProtocol),
            2 => Some(Self::MaximumConnectionReached),
            3 => Some(Self::SessionNotOpened),
            4 => Some(Self::NotLoggedIn),
            _ => None,
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WrongProtocol => "WRONG_PROTOCOL",
            Self::MaximumConnectionReached => "MAXIMUM_CONNECTION_REACHED",
            Self::SessionNotOpened => "SESSION_NOT_OPENED",
            Self::NotLoggedIn => "NOT_LOGGED_IN",
        };
        f.write_str(name)
    }
}

/// A bounded resource that ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    SessionSlots,
    SessionQueue,
    WaitingList,
    GamePool,
    ServerShuttingDown,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SessionSlots => "session slots",
            Self::SessionQueue => "session message queue",
            Self::WaitingList => "quick match waiting list",
            Self::GamePool => "game pool",
            Self::ServerShuttingDown => "server is shutting down",
        };
        f.write_str(name)
    }
}

/// Unified error type for Skirmish operations
#[derive(Debug, Error)]
pub enum SkirmishError {
    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol violation ({reason}): {message}")]
    ProtocolViolation {
        reason: DisconnectReason,
        message: String,
    },

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Session Errors
    // -------------------------------------------------------------------------
    #[error("Session {0} not found")]
    SessionNotFound(SessionId),

    #[error("Session {0} is closed")]
    SessionClosed(SessionId),

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(Resource),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SkirmishError {
    /// Build a protocol violation with the WRONG_PROTOCOL reason
    pub fn wrong_protocol(message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            reason: DisconnectReason::WrongProtocol,
            message: message.into(),
        }
    }

    /// Build a protocol violation with an explicit reason
    pub fn violation(reason: DisconnectReason, message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            reason,
            message: message.into(),
        }
    }

    /// Whether the connection that produced this error must be torn down
    ///
    /// `UnexpectedMessage` is the only request-level failure that keeps the
    /// connection alive.
    pub fn is_disconnect(&self) -> bool {
        !matches!(self, Self::UnexpectedMessage(_))
    }

    /// Whether this error comes from the transport rather than the client
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Transport(_))
    }

    /// Reason reported to the client before teardown, if any
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        match self {
            Self::ProtocolViolation { reason, .. } => Some(*reason),
            Self::ResourceExhausted(Resource::SessionSlots) => {
                Some(DisconnectReason::MaximumConnectionReached)
            }
            // A conforming client waits for its answers instead of flooding
            Self::ResourceExhausted(Resource::SessionQueue) => Some(DisconnectReason::WrongProtocol),
            Self::SessionNotFound(_) | Self::Encoding(_) => Some(DisconnectReason::WrongProtocol),
            _ => None,
        }
    }
}

impl From<bincode::Error> for SkirmishError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
