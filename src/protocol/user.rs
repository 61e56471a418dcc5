//! User protocol
//!
//! Requests sent by game clients and the answers the server sends back.
//! Each request maps to exactly one answer type (`request tag + 100`);
//! answers pushed by pairing or by a match reuse the answer type of the
//! request that started the flow.
//!
//! ### Requests
//! - 1: CONNECT            - Payload: version (4)
//! - 2: LOGIN              - Payload: login (str) + password (str)
//! - 3: LOGOUT             - Payload: empty
//! - 4: QUICK_MATCH        - Payload: empty
//! - 5: CANCEL_QUICK_MATCH - Payload: empty
//! - 6: LAUNCH_MATCH       - Payload: accept (1)
//! - 7: LOADING            - Payload: progress (1)
//! - 8: GAME_COMMAND       - Payload: kind (1) + action bytes
//! - 9: CHAT_MESSAGE       - Payload: text (str)

use bytes::Bytes;

use crate::error::{Result, SkirmishError};
use super::{encode, ConnectStatus, Message, MessageType, PayloadReader, PayloadWriter};

/// User request tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum UserRequestType {
    Connect = 1,
    Login = 2,
    Logout = 3,
    QuickMatch = 4,
    CancelQuickMatch = 5,
    LaunchMatch = 6,
    Loading = 7,
    GameCommand = 8,
    ChatMessage = 9,
}

impl UserRequestType {
    pub fn from_tag(tag: MessageType) -> Option<Self> {
        match tag {
            1 => Some(Self::Connect),
            2 => Some(Self::Login),
            3 => Some(Self::Logout),
            4 => Some(Self::QuickMatch),
            5 => Some(Self::CancelQuickMatch),
            6 => Some(Self::LaunchMatch),
            7 => Some(Self::Loading),
            8 => Some(Self::GameCommand),
            9 => Some(Self::ChatMessage),
            _ => None,
        }
    }

    pub fn tag(self) -> MessageType {
        self as MessageType
    }

    /// Tag of the answer paired with this request
    pub fn answer_tag(self) -> MessageType {
        self.tag() + ANSWER_OFFSET
    }
}

const ANSWER_OFFSET: MessageType = 100;

/// Loading progress reported by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LoadingProgress {
    InProgress = 0,
    Finished = 1,
}

/// In-match command sent by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameCommand {
    /// Opaque action handed to the rules engine
    Action(Bytes),

    /// Abandon the match
    LeaveGame,
}

const GAME_COMMAND_ACTION: u8 = 0;
const GAME_COMMAND_LEAVE: u8 = 1;

/// A parsed user request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRequest {
    Connect { version: i32 },
    Login { login: String, password: String },
    Logout,
    QuickMatch,
    CancelQuickMatch,
    LaunchMatch { accept: bool },
    Loading { progress: LoadingProgress },
    GameCommand(GameCommand),
    /// Chat line for the opponent of the current match
    ChatMessage { text: String },
}

impl UserRequest {
    /// Get the request type
    pub fn request_type(&self) -> UserRequestType {
        match self {
            Self::Connect { .. } => UserRequestType::Connect,
            Self::Login { .. } => UserRequestType::Login,
            Self::Logout => UserRequestType::Logout,
            Self::QuickMatch => UserRequestType::QuickMatch,
            Self::CancelQuickMatch => UserRequestType::CancelQuickMatch,
            Self::LaunchMatch { .. } => UserRequestType::LaunchMatch,
            Self::Loading { .. } => UserRequestType::Loading,
            Self::GameCommand(_) => UserRequestType::GameCommand,
            Self::ChatMessage { .. } => UserRequestType::ChatMessage,
        }
    }

    /// Parse a request from a decoded message
    pub fn decode(message: &Message) -> Result<Self> {
        let request_type = UserRequestType::from_tag(message.message_type).ok_or_else(|| {
            SkirmishError::wrong_protocol(format!(
                "Unknown user request type: {}",
                message.message_type
            ))
        })?;

        let mut reader = PayloadReader::new(message.payload.clone());
        let request = match request_type {
            UserRequestType::Connect => Self::Connect {
                version: reader.read_i32("version")?,
            },
            UserRequestType::Login => Self::Login {
                login: reader.read_string("login")?,
                password: reader.read_string("password")?,
            },
            UserRequestType::Logout => Self::Logout,
            UserRequestType::QuickMatch => Self::QuickMatch,
            UserRequestType::CancelQuickMatch => Self::CancelQuickMatch,
            UserRequestType::LaunchMatch => Self::LaunchMatch {
                accept: reader.read_u8("accept flag")? != 0,
            },
            UserRequestType::Loading => {
                let progress = match reader.read_u8("loading progress")? {
                    0 => LoadingProgress::InProgress,
                    1 => LoadingProgress::Finished,
                    other => {
                        return Err(SkirmishError::wrong_protocol(format!(
                            "Unknown loading progress: {}",
                            other
                        )))
                    }
                };
                Self::Loading { progress }
            }
            UserRequestType::GameCommand => match reader.read_u8("game command kind")? {
                GAME_COMMAND_ACTION => Self::GameCommand(GameCommand::Action(reader.read_rest())),
                GAME_COMMAND_LEAVE => Self::GameCommand(GameCommand::LeaveGame),
                other => {
                    return Err(SkirmishError::wrong_protocol(format!(
                        "Unknown game command kind: {}",
                        other
                    )))
                }
            },
            UserRequestType::ChatMessage => Self::ChatMessage {
                text: reader.read_string("chat text")?,
            },
        };

        reader.finish("user request")?;
        Ok(request)
    }

    /// Build the request payload
    pub fn payload(&self) -> Bytes {
        let writer = PayloadWriter::new();
        match self {
            Self::Connect { version } => writer.put_i32(*version),
            Self::Login { login, password } => writer.put_string(login).put_string(password),
            Self::Logout | Self::QuickMatch | Self::CancelQuickMatch => writer,
            Self::LaunchMatch { accept } => writer.put_u8(u8::from(*accept)),
            Self::Loading { progress } => writer.put_u8(*progress as u8),
            Self::GameCommand(GameCommand::Action(action)) => {
                writer.put_u8(GAME_COMMAND_ACTION).put_slice(action)
            }
            Self::GameCommand(GameCommand::LeaveGame) => writer.put_u8(GAME_COMMAND_LEAVE),
            Self::ChatMessage { text } => writer.put_string(text),
        }
        .finish()
    }

    /// Encode the request into a frame
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self.request_type().tag(), &self.payload())
    }
}

// =============================================================================
// Answers
// =============================================================================

/// Outcome of a LOGIN request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum LoginStatus {
    Ok = 0,
    UnknownLogin = 1,
    WrongPassword = 2,
    AccountBanned = 3,
    AccountLocked = 4,
    AlreadyLogged = 5,
}

impl LoginStatus {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::UnknownLogin),
            2 => Some(Self::WrongPassword),
            3 => Some(Self::AccountBanned),
            4 => Some(Self::AccountLocked),
            5 => Some(Self::AlreadyLogged),
            _ => None,
        }
    }
}

/// Answers to QUICK_MATCH, including the one pushed by a pairing pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuickMatchAnswer {
    LookingForOpponent,
    OpponentFound { opponent: String },
    AlreadyLookingForOpponent,
    ServerBusy,
}

/// Answers to CANCEL_QUICK_MATCH, also sent to a player who declined a launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelQuickMatchAnswer {
    QuickMatchCancelled,
    AlreadyInMatch,
}

/// Answers to LAUNCH_MATCH
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchMatchAnswer {
    Launch { seat: u8, opponent: String },
    OpponentCancelled,
}

/// Opponent loading progress relayed by a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingAnswer {
    OpponentLoading,
    OpponentLoadingFinished,
    OpponentDropped,
}

/// In-match events sent by a match
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameCommandAnswer {
    GameStart,
    Action { seat: u8, action: Bytes },
    ActionRejected,
    /// `winner` 0 means a draw
    GameFinished { winner: u8 },
    PlayerLeft { seat: u8 },
}

/// A user answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAnswer {
    /// `seconds_before_shutdown` is -1 when no shutdown is scheduled
    Connect { status: ConnectStatus, seconds_before_shutdown: i32 },
    Login { status: LoginStatus, login: Option<String> },
    Logout,
    QuickMatch(QuickMatchAnswer),
    CancelQuickMatch(CancelQuickMatchAnswer),
    LaunchMatch(LaunchMatchAnswer),
    Loading(LoadingAnswer),
    GameCommand(GameCommandAnswer),
    /// Chat line relayed from the player in `seat`
    ChatMessage { seat: u8, text: String },
}

impl UserAnswer {
    /// Request type this answer belongs to
    pub fn request_type(&self) -> UserRequestType {
        match self {
            Self::Connect { .. } => UserRequestType::Connect,
            Self::Login { .. } => UserRequestType::Login,
            Self::Logout => UserRequestType::Logout,
            Self::QuickMatch(_) => UserRequestType::QuickMatch,
            Self::CancelQuickMatch(_) => UserRequestType::CancelQuickMatch,
            Self::LaunchMatch(_) => UserRequestType::LaunchMatch,
            Self::Loading(_) => UserRequestType::Loading,
            Self::GameCommand(_) => UserRequestType::GameCommand,
            Self::ChatMessage { .. } => UserRequestType::ChatMessage,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.request_type().answer_tag()
    }

    /// Build the answer payload: status (4) + fields
    pub fn payload(&self) -> Bytes {
        let writer = PayloadWriter::new();
        match self {
            Self::Connect { status, seconds_before_shutdown } => {
                writer.put_i32(*status as i32).put_i32(*seconds_before_shutdown)
            }
            Self::Login { status, login } => {
                let writer = writer.put_i32(*status as i32);
                match login {
                    Some(login) => writer.put_string(login),
                    None => writer,
                }
            }
            Self::Logout => writer.put_i32(0),
            Self::QuickMatch(answer) => match answer {
                QuickMatchAnswer::LookingForOpponent => writer.put_i32(0),
                QuickMatchAnswer::OpponentFound { opponent } => writer.put_i32(1).put_string(opponent),
                QuickMatchAnswer::AlreadyLookingForOpponent => writer.put_i32(2),
                QuickMatchAnswer::ServerBusy => writer.put_i32(3),
            },
            Self::CancelQuickMatch(answer) => match answer {
                CancelQuickMatchAnswer::QuickMatchCancelled => writer.put_i32(0),
                CancelQuickMatchAnswer::AlreadyInMatch => writer.put_i32(1),
            },
            Self::LaunchMatch(answer) => match answer {
                LaunchMatchAnswer::Launch { seat, opponent } => {
                    writer.put_i32(0).put_u8(*seat).put_string(opponent)
                }
                LaunchMatchAnswer::OpponentCancelled => writer.put_i32(1),
            },
            Self::Loading(answer) => match answer {
                LoadingAnswer::OpponentLoading => writer.put_i32(0),
                LoadingAnswer::OpponentLoadingFinished => writer.put_i32(1),
                LoadingAnswer::OpponentDropped => writer.put_i32(2),
            },
            Self::GameCommand(answer) => match answer {
                GameCommandAnswer::GameStart => writer.put_i32(0),
                GameCommandAnswer::Action { seat, action } => {
                    writer.put_i32(1).put_u8(*seat).put_slice(action)
                }
                GameCommandAnswer::ActionRejected => writer.put_i32(2),
                GameCommandAnswer::GameFinished { winner } => writer.put_i32(3).put_u8(*winner),
                GameCommandAnswer::PlayerLeft { seat } => writer.put_i32(4).put_u8(*seat),
            },
            Self::ChatMessage { seat, text } => writer.put_i32(0).put_u8(*seat).put_string(text),
        }
        .finish()
    }

    /// Encode the answer into a frame
    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(self.message_type(), &self.payload())
    }

    /// Parse an answer (client side)
    pub fn decode(message_type: MessageType, payload: Bytes) -> Result<Self> {
        let request_type = message_type
            .checked_sub(ANSWER_OFFSET)
            .and_then(UserRequestType::from_tag)
            .ok_or_else(|| {
                SkirmishError::wrong_protocol(format!("Unknown user answer type: {}", message_type))
            })?;

        let mut reader = PayloadReader::new(payload);
        let status = reader.read_i32("answer status")?;
        let unknown = || {
            SkirmishError::wrong_protocol(format!(
                "Unknown status {} for {:?} answer",
                status, request_type
            ))
        };

        let answer = match request_type {
            UserRequestType::Connect => Self::Connect {
                status: ConnectStatus::from_code(status).ok_or_else(unknown)?,
                seconds_before_shutdown: reader.read_i32("seconds before shutdown")?,
            },
            UserRequestType::Login => {
                let status = LoginStatus::from_code(status).ok_or_else(unknown)?;
                let login = if status == LoginStatus::Ok {
                    Some(reader.read_string("login")?)
                } else {
                    None
                };
                Self::Login { status, login }
            }
            UserRequestType::Logout => Self::Logout,
            UserRequestType::QuickMatch => Self::QuickMatch(match status {
                0 => QuickMatchAnswer::LookingForOpponent,
                1 => QuickMatchAnswer::OpponentFound {
                    opponent: reader.read_string("opponent")?,
                },
                2 => QuickMatchAnswer::AlreadyLookingForOpponent,
                3 => QuickMatchAnswer::ServerBusy,
                _ => return Err(unknown()),
            }),
            UserRequestType::CancelQuickMatch => Self::CancelQuickMatch(match status {
                0 => CancelQuickMatchAnswer::QuickMatchCancelled,
                1 => CancelQuickMatchAnswer::AlreadyInMatch,
                _ => return Err(unknown()),
            }),
            UserRequestType::LaunchMatch => Self::LaunchMatch(match status {
                0 => LaunchMatchAnswer::Launch {
                    seat: reader.read_u8("seat")?,
                    opponent: reader.read_string("opponent")?,
                },
                1 => LaunchMatchAnswer::OpponentCancelled,
                _ => return Err(unknown()),
            }),
            UserRequestType::Loading => Self::Loading(match status {
                0 => LoadingAnswer::OpponentLoading,
                1 => LoadingAnswer::OpponentLoadingFinished,
                2 => LoadingAnswer::OpponentDropped,
                _ => return Err(unknown()),
            }),
            UserRequestType::GameCommand => Self::GameCommand(match status {
                0 => GameCommandAnswer::GameStart,
                1 => GameCommandAnswer::Action {
                    seat: reader.read_u8("seat")?,
                    action: reader.read_rest(),
                },
                2 => GameCommandAnswer::ActionRejected,
                3 => GameCommandAnswer::GameFinished {
                    winner: reader.read_u8("winner")?,
                },
                4 => GameCommandAnswer::PlayerLeft {
                    seat: reader.read_u8("seat")?,
                },
                _ => return Err(unknown()),
            }),
            UserRequestType::ChatMessage => match status {
                0 => Self::ChatMessage {
                    seat: reader.read_u8("seat")?,
                    text: reader.read_string("chat text")?,
                },
                _ => return Err(unknown()),
            },
        };

        reader.finish("user answer")?;
        Ok(answer)
    }
}
