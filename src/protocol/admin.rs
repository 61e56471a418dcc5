//! Admin protocol
//!
//! Requests sent by the administration tool. Answers carrying structured
//! data (user lists, statistics) are bincode-encoded after the status field.
//!
//! ### Requests
//! - 201: ADMIN_CONNECT         - Payload: version (4)
//! - 202: ADMIN_LOGIN           - Payload: login (str) + password (str)
//! - 203: ADMIN_LOGOUT          - Payload: empty
//! - 204: SHUTDOWN_SERVER       - Payload: seconds (4)
//! - 205: CONNECTED_USERS_INFOS - Payload: empty
//! - 206: SERVER_STATS          - Payload: empty
//! - 207: BAN_USERS             - Payload: days (4, 0 = until unbanned) + logins (list)
//! - 208: UNBAN_USERS           - Payload: logins (list)
//! - 209: LOCK_USERS            - Payload: logins (list)
//! - 210: UNLOCK_USERS          - Payload: logins (list)
//! - 211: SEND_MSG_TO_USERS     - Payload: text (str) + for all (1) + logins (list)

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkirmishError};
use super::{encode, ConnectStatus, Message, MessageType, PayloadReader, PayloadWriter};

/// Admin request tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum AdminRequestType {
    Connect = 201,
    Login = 202,
    Logout = 203,
    ShutdownServer = 204,
    ConnectedUsersInfos = 205,
    ServerStats = 206,
    BanUsers = 207,
    UnbanUsers = 208,
    LockUsers = 209,
    UnlockUsers = 210,
    SendMessageToUsers = 211,
}

impl AdminRequestType {
    pub fn from_tag(tag: MessageType) -> Option<Self> {
        match tag {
            201 => Some(Self::Connect),
            202 => Some(Self::Login),
            203 => Some(Self::Logout),
            204 => Some(Self::ShutdownServer),
            205 => Some(Self::ConnectedUsersInfos),
            206 => Some(Self::ServerStats),
            207 => Some(Self::BanUsers),
            208 => Some(Self::UnbanUsers),
            209 => Some(Self::LockUsers),
            210 => Some(Self::UnlockUsers),
            211 => Some(Self::SendMessageToUsers),
            _ => None,
        }
    }

    pub fn tag(self) -> MessageType {
        self as MessageType
    }

    pub fn answer_tag(self) -> MessageType {
        self.tag() + ANSWER_OFFSET
    }
}

const ANSWER_OFFSET: MessageType = 100;

/// A parsed admin request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminRequest {
    Connect { version: i32 },
    Login { login: String, password: String },
    Logout,
    ShutdownServer { seconds: i32 },
    ConnectedUsersInfos,
    ServerStats,
    BanUsers { days: i32, logins: Vec<String> },
    UnbanUsers { logins: Vec<String> },
    LockUsers { logins: Vec<String> },
    UnlockUsers { logins: Vec<String> },
    /// Sent to every logged user when `for_all_users` is set, else to `logins`
    SendMessageToUsers {
        text: String,
        for_all_users: bool,
        logins: Vec<String>,
    },
}

impl AdminRequest {
    pub fn request_type(&self) -> AdminRequestType {
        match self {
            Self::Connect { .. } => AdminRequestType::Connect,
            Self::Login { .. } => AdminRequestType::Login,
            Self::Logout => AdminRequestType::Logout,
            Self::ShutdownServer { .. } => AdminRequestType::ShutdownServer,
            Self::ConnectedUsersInfos => AdminRequestType::ConnectedUsersInfos,
            Self::ServerStats => AdminRequestType::ServerStats,
            Self::BanUsers { .. } => AdminRequestType::BanUsers,
            Self::UnbanUsers { .. } => AdminRequestType::UnbanUsers,
            Self::LockUsers { .. } => AdminRequestType::LockUsers,
            Self::UnlockUsers { .. } => AdminRequestType::UnlockUsers,
            Self::SendMessageToUsers { .. } => AdminRequestType::SendMessageToUsers,
        }
    }

    pub fn decode(message: &Message) -> Result<Self> {
        let request_type = AdminRequestType::from_tag(message.message_type).ok_or_else(|| {
            SkirmishError::wrong_protocol(format!(
                "Unknown admin request type: {}",
                message.message_type
            ))
        })?;

        let mut reader = PayloadReader::new(message.payload.clone());
        let request = match request_type {
            AdminRequestType::Connect => Self::Connect {
                version: reader.read_i32("version")?,
            },
            AdminRequestType::Login => Self::Login {
                login: reader.read_string("login")?,
                password: reader.read_string("password")?,
            },
            AdminRequestType::Logout => Self::Logout,
            AdminRequestType::ShutdownServer => Self::ShutdownServer {
                seconds: reader.read_i32("seconds before shutdown")?,
            },
            AdminRequestType::ConnectedUsersInfos => Self::ConnectedUsersInfos,
            AdminRequestType::ServerStats => Self::ServerStats,
            AdminRequestType::BanUsers => Self::BanUsers {
                days: reader.read_i32("ban days")?,
                logins: reader.read_string_list("logins")?,
            },
            AdminRequestType::UnbanUsers => Self::UnbanUsers {
                logins: reader.read_string_list("logins")?,
            },
            AdminRequestType::LockUsers => Self::LockUsers {
                logins: reader.read_string_list("logins")?,
            },
            AdminRequestType::UnlockUsers => Self::UnlockUsers {
                logins: reader.read_string_list("logins")?,
            },
            AdminRequestType::SendMessageToUsers => Self::SendMessageToUsers {
                text: reader.read_string("message text")?,
                for_all_users: reader.read_u8("for all users flag")? != 0,
                logins: reader.read_string_list("logins")?,
            },
        };

        reader.finish("admin request")?;
        Ok(request)
    }

    pub fn payload(&self) -> Bytes {
        let writer = PayloadWriter::new();
        match self {
            Self::Connect { version } => writer.put_i32(*version),
            Self::Login { login, password } => writer.put_string(login).put_string(password),
            Self::ShutdownServer { seconds } => writer.put_i32(*seconds),
            Self::Logout | Self::ConnectedUsersInfos | Self::ServerStats => writer,
            Self::BanUsers { days, logins } => writer.put_i32(*days).put_string_list(logins),
            Self::UnbanUsers { logins } | Self::LockUsers { logins } | Self::UnlockUsers { logins } => {
                writer.put_string_list(logins)
            }
            Self::SendMessageToUsers {
                text,
                for_all_users,
                logins,
            } => writer
                .put_string(text)
                .put_u8(u8::from(*for_all_users))
                .put_string_list(logins),
        }
        .finish()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self.request_type().tag(), &self.payload())
    }
}

// =============================================================================
// Answers
// =============================================================================

/// One open user session as seen by an admin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub session_id: u32,
    pub login: Option<String>,
    pub logged_in: bool,
    pub quick_match: String,
}

/// Server-wide counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStats {
    pub open_user_sessions: u32,
    pub waiting_players: u32,
    pub live_matches: u32,
    /// -1 when no shutdown is scheduled
    pub seconds_before_shutdown: i32,
}

/// Outcome of a moderation request for one login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationResult {
    pub login: String,
    /// False when the login does not exist
    pub applied: bool,
}

/// An admin answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAnswer {
    Connect { status: ConnectStatus },
    Login { accepted: bool },
    Logout,
    ShutdownServer { seconds: i32 },
    ConnectedUsersInfos(Vec<UserInfo>),
    ServerStats(ServerStats),
    BanUsers(Vec<ModerationResult>),
    UnbanUsers(Vec<ModerationResult>),
    LockUsers(Vec<ModerationResult>),
    UnlockUsers(Vec<ModerationResult>),
    /// Number of sessions the message was sent to
    SendMessageToUsers { delivered: u32 },
}

impl AdminAnswer {
    pub fn request_type(&self) -> AdminRequestType {
        match self {
            Self::Connect { .. } => AdminRequestType::Connect,
            Self::Login { .. } => AdminRequestType::Login,
            Self::Logout => AdminRequestType::Logout,
            Self::ShutdownServer { .. } => AdminRequestType::ShutdownServer,
            Self::ConnectedUsersInfos(_) => AdminRequestType::ConnectedUsersInfos,
            Self::ServerStats(_) => AdminRequestType::ServerStats,
            Self::BanUsers(_) => AdminRequestType::BanUsers,
            Self::UnbanUsers(_) => AdminRequestType::UnbanUsers,
            Self::LockUsers(_) => AdminRequestType::LockUsers,
            Self::UnlockUsers(_) => AdminRequestType::UnlockUsers,
            Self::SendMessageToUsers { .. } => AdminRequestType::SendMessageToUsers,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.request_type().answer_tag()
    }

    /// Build the answer payload: status (4) + fields
    pub fn payload(&self) -> Result<Bytes> {
        let writer = PayloadWriter::new();
        let payload = match self {
            Self::Connect { status } => writer.put_i32(*status as i32),
            Self::Login { accepted } => writer.put_i32(if *accepted { 0 } else { 1 }),
            Self::Logout => writer.put_i32(0),
            Self::ShutdownServer { seconds } => writer.put_i32(0).put_i32(*seconds),
            Self::ConnectedUsersInfos(users) => writer.put_i32(0).put_slice(&bincode::serialize(users)?),
            Self::ServerStats(stats) => writer.put_i32(0).put_slice(&bincode::serialize(stats)?),
            Self::BanUsers(results)
            | Self::UnbanUsers(results)
            | Self::LockUsers(results)
            | Self::UnlockUsers(results) => writer.put_i32(0).put_slice(&bincode::serialize(results)?),
            Self::SendMessageToUsers { delivered } => writer.put_i32(0).put_i32(*delivered as i32),
        };
        Ok(payload.finish())
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self.message_type(), &self.payload()?)
    }

    /// Parse an answer (admin tool side)
    pub fn decode(message_type: MessageType, payload: Bytes) -> Result<Self> {
        let request_type = message_type
            .checked_sub(ANSWER_OFFSET)
            .and_then(AdminRequestType::from_tag)
            .ok_or_else(|| {
                SkirmishError::wrong_protocol(format!("Unknown admin answer type: {}", message_type))
            })?;

        let mut reader = PayloadReader::new(payload);
        let status = reader.read_i32("answer status")?;

        let answer = match request_type {
            AdminRequestType::Connect => Self::Connect {
                status: ConnectStatus::from_code(status).ok_or_else(|| {
                    SkirmishError::wrong_protocol(format!("Unknown connect status {}", status))
                })?,
            },
            AdminRequestType::Login => Self::Login { accepted: status == 0 },
            AdminRequestType::Logout => Self::Logout,
            AdminRequestType::ShutdownServer => Self::ShutdownServer {
                seconds: reader.read_i32("seconds before shutdown")?,
            },
            AdminRequestType::ConnectedUsersInfos => {
                Self::ConnectedUsersInfos(bincode::deserialize(&reader.read_rest())?)
            }
            AdminRequestType::ServerStats => Self::ServerStats(bincode::deserialize(&reader.read_rest())?),
            AdminRequestType::BanUsers => Self::BanUsers(bincode::deserialize(&reader.read_rest())?),
            AdminRequestType::UnbanUsers => Self::UnbanUsers(bincode::deserialize(&reader.read_rest())?),
            AdminRequestType::LockUsers => Self::LockUsers(bincode::deserialize(&reader.read_rest())?),
            AdminRequestType::UnlockUsers => Self::UnlockUsers(bincode::deserialize(&reader.read_rest())?),
            AdminRequestType::SendMessageToUsers => Self::SendMessageToUsers {
                delivered: reader.read_i32("delivered count")?.max(0) as u32,
            },
        };

        reader.finish("admin answer")?;
        Ok(answer)
    }
}
