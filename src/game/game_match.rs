//! A live match between two paired players
//!
//! ```text
//! WAITING_ACK ─both accept→ LOADING ─both loaded→ STARTED ─rules finish→ FINISHED
//!      │                       │                     │                      │
//!      └─decline→ released     └─leave→ released     └─leave→ released      └─leave→ released
//! ```
//!
//! Every event runs under the match lock. Player sessions are only reached
//! through generation-checked handles, so a player whose slot was closed or
//! reused is never written to.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, SkirmishError};
use crate::network::Transport;
use crate::protocol::user::{
    CancelQuickMatchAnswer, GameCommand, GameCommandAnswer, LaunchMatchAnswer, LoadingAnswer,
    LoadingProgress, QuickMatchAnswer, UserAnswer,
};
use crate::session::{QuickMatchStatus, SessionHandle, SessionId, SessionTable};

use super::{MatchId, RulesEngine, Seat, Verdict};

/// Lifecycle of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    WaitingAck,
    Loading,
    Started,
    Finished,
    Released,
}

impl fmt::Display for MatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WaitingAck => "WAITING_ACK",
            Self::Loading => "LOADING",
            Self::Started => "STARTED",
            Self::Finished => "FINISHED",
            Self::Released => "RELEASED",
        };
        f.write_str(name)
    }
}

/// What the caller must do after feeding an event to a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchProgress {
    Running,
    /// The match just reached RELEASED and must be removed from the pool
    Released,
}

struct Player {
    handle: SessionHandle,
    login: String,
    answered_launch: bool,
    accepted_launch: bool,
    loading_finished: bool,
    /// Set once the player disconnected or a send to it failed
    gone: bool,
}

impl Player {
    fn new(handle: SessionHandle, login: String) -> Self {
        Self {
            handle,
            login,
            answered_launch: false,
            accepted_launch: false,
            loading_finished: false,
            gone: false,
        }
    }
}

struct MatchInner {
    state: MatchState,
    players: [Player; 2],
    rules: Box<dyn RulesEngine>,
}

/// A match owned by the game pool
pub struct Match {
    id: MatchId,
    handles: [SessionHandle; 2],
    sessions: Arc<SessionTable>,
    transport: Arc<dyn Transport>,
    inner: Mutex<MatchInner>,
}

impl Match {
    pub(crate) fn new(
        id: MatchId,
        players: [(SessionHandle, String); 2],
        sessions: Arc<SessionTable>,
        transport: Arc<dyn Transport>,
        rules: Box<dyn RulesEngine>,
    ) -> Self {
        let [(first, first_login), (second, second_login)] = players;
        Self {
            id,
            handles: [first, second],
            sessions,
            transport,
            inner: Mutex::new(MatchInner {
                state: MatchState::WaitingAck,
                players: [Player::new(first, first_login), Player::new(second, second_login)],
                rules,
            }),
        }
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn state(&self) -> MatchState {
        self.inner.lock().state
    }

    /// Handles of both players, first seat first
    pub fn players(&self) -> [SessionHandle; 2] {
        self.handles
    }

    /// Seat of the session, if it plays in this match
    pub fn seat_of(&self, session_id: SessionId) -> Option<Seat> {
        if self.handles[0].id == session_id {
            Some(Seat::First)
        } else if self.handles[1].id == session_id {
            Some(Seat::Second)
        } else {
            None
        }
    }

    fn require_seat(&self, session_id: SessionId) -> Result<Seat> {
        self.seat_of(session_id).ok_or_else(|| {
            SkirmishError::UnexpectedMessage(format!(
                "Session {} does not play in match {}",
                session_id, self.id
            ))
        })
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Tell both players who they were paired with
    pub fn announce(&self) {
        let mut inner = self.inner.lock();
        if inner.state != MatchState::WaitingAck {
            return;
        }
        for seat in [Seat::First, Seat::Second] {
            let opponent = inner.players[seat.opponent().index()].login.clone();
            self.send(
                &mut inner,
                seat,
                UserAnswer::QuickMatch(QuickMatchAnswer::OpponentFound { opponent }),
            );
        }
    }

    /// LAUNCH_MATCH with accept set
    pub fn on_receive_launch(&self, session_id: SessionId) -> Result<MatchProgress> {
        let seat = self.require_seat(session_id)?;
        let mut inner = self.inner.lock();
        self.on_launch(&mut inner, seat, true)
    }

    /// LAUNCH_MATCH with accept cleared
    pub fn on_receive_cancel(&self, session_id: SessionId) -> Result<MatchProgress> {
        let seat = self.require_seat(session_id)?;
        let mut inner = self.inner.lock();
        self.on_launch(&mut inner, seat, false)
    }

    pub fn on_receive_loading(&self, session_id: SessionId, progress: LoadingProgress) -> Result<MatchProgress> {
        let seat = self.require_seat(session_id)?;
        let mut inner = self.inner.lock();
        if inner.state != MatchState::Loading {
            tracing::warn!("Match {}: loading progress while {}, ignored", self.id, inner.state);
            return Ok(MatchProgress::Running);
        }

        match progress {
            LoadingProgress::InProgress => {
                self.send(&mut inner, seat.opponent(), UserAnswer::Loading(LoadingAnswer::OpponentLoading));
            }
            LoadingProgress::Finished => {
                if inner.players[seat.index()].loading_finished {
                    return Ok(MatchProgress::Running);
                }
                inner.players[seat.index()].loading_finished = true;
                self.advance(&inner, seat, QuickMatchStatus::LoadingFinished);
                self.send(
                    &mut inner,
                    seat.opponent(),
                    UserAnswer::Loading(LoadingAnswer::OpponentLoadingFinished),
                );

                if inner.players.iter().all(|player| player.loading_finished) {
                    inner.state = MatchState::Started;
                    inner.rules.on_start();
                    for seat in [Seat::First, Seat::Second] {
                        self.advance(&inner, seat, QuickMatchStatus::Fighting);
                        self.send(&mut inner, seat, UserAnswer::GameCommand(GameCommandAnswer::GameStart));
                    }
                    tracing::info!("Match {} started", self.id);
                }
            }
        }
        Ok(MatchProgress::Running)
    }

    pub fn on_receive_command(&self, session_id: SessionId, command: &GameCommand) -> Result<MatchProgress> {
        let seat = self.require_seat(session_id)?;
        let mut inner = self.inner.lock();
        match command {
            GameCommand::LeaveGame => Ok(self.on_leave(&mut inner, seat)),
            GameCommand::Action(action) => {
                if inner.state != MatchState::Started {
                    tracing::warn!("Match {}: action from seat {} while {}, ignored", self.id, seat.number(), inner.state);
                    return Ok(MatchProgress::Running);
                }

                match inner.rules.on_action(seat, action) {
                    Verdict::Relay => {
                        let answer = GameCommandAnswer::Action {
                            seat: seat.number(),
                            action: action.clone(),
                        };
                        self.send(&mut inner, seat.opponent(), UserAnswer::GameCommand(answer));
                    }
                    Verdict::Reject => {
                        self.send(&mut inner, seat, UserAnswer::GameCommand(GameCommandAnswer::ActionRejected));
                    }
                    Verdict::Finish { winner } => {
                        let answer = GameCommandAnswer::Action {
                            seat: seat.number(),
                            action: action.clone(),
                        };
                        self.send(&mut inner, seat.opponent(), UserAnswer::GameCommand(answer));
                        inner.state = MatchState::Finished;
                        let winner = winner.map_or(0, Seat::number);
                        for seat in [Seat::First, Seat::Second] {
                            self.send(
                                &mut inner,
                                seat,
                                UserAnswer::GameCommand(GameCommandAnswer::GameFinished { winner }),
                            );
                        }
                        tracing::info!("Match {} finished, winner seat {}", self.id, winner);
                    }
                }
                Ok(MatchProgress::Running)
            }
        }
    }

    /// Relay a chat line to the opponent, whatever the match state
    pub fn on_receive_chat(&self, session_id: SessionId, text: &str) -> Result<()> {
        let seat = self.require_seat(session_id)?;
        let mut inner = self.inner.lock();
        if inner.state == MatchState::Released {
            return Err(SkirmishError::UnexpectedMessage(format!(
                "Match {}: chat after release",
                self.id
            )));
        }
        let answer = UserAnswer::ChatMessage {
            seat: seat.number(),
            text: text.to_string(),
        };
        self.send(&mut inner, seat.opponent(), answer);
        Ok(())
    }

    /// The session of a player is being closed or logged out
    pub fn on_player_disconnected(&self, session_id: SessionId) -> MatchProgress {
        let Some(seat) = self.seat_of(session_id) else {
            return MatchProgress::Running;
        };
        let mut inner = self.inner.lock();
        inner.players[seat.index()].gone = true;
        tracing::debug!("Match {}: seat {} disconnected while {}", self.id, seat.number(), inner.state);
        self.on_leave(&mut inner, seat)
    }

    // =========================================================================
    // Internal Flow
    // =========================================================================

    fn on_launch(&self, inner: &mut MatchInner, seat: Seat, accepted: bool) -> Result<MatchProgress> {
        if inner.state != MatchState::WaitingAck {
            return Err(SkirmishError::UnexpectedMessage(format!(
                "Match {}: launch answer while {}",
                self.id, inner.state
            )));
        }
        let player = &mut inner.players[seat.index()];
        if player.answered_launch {
            return Err(SkirmishError::wrong_protocol(format!(
                "Match {}: seat {} answered launch twice",
                self.id,
                seat.number()
            )));
        }
        player.answered_launch = true;
        player.accepted_launch = accepted;
        if accepted {
            self.advance(inner, seat, QuickMatchStatus::WaitingForOpponent);
        }

        if !inner.players.iter().all(|player| player.answered_launch) {
            return Ok(MatchProgress::Running);
        }

        if inner.players.iter().all(|player| player.accepted_launch) {
            inner.state = MatchState::Loading;
            for seat in [Seat::First, Seat::Second] {
                self.advance(inner, seat, QuickMatchStatus::Loading);
                let opponent = inner.players[seat.opponent().index()].login.clone();
                let answer = LaunchMatchAnswer::Launch {
                    seat: seat.number(),
                    opponent,
                };
                self.send(inner, seat, UserAnswer::LaunchMatch(answer));
            }
            tracing::info!("Match {} loading", self.id);
            return Ok(MatchProgress::Running);
        }

        for seat in [Seat::First, Seat::Second] {
            let answer = if inner.players[seat.index()].accepted_launch {
                UserAnswer::LaunchMatch(LaunchMatchAnswer::OpponentCancelled)
            } else {
                UserAnswer::CancelQuickMatch(CancelQuickMatchAnswer::QuickMatchCancelled)
            };
            self.send(inner, seat, answer);
        }
        tracing::info!("Match {} declined", self.id);
        Ok(self.release(inner))
    }

    fn on_leave(&self, inner: &mut MatchInner, seat: Seat) -> MatchProgress {
        let opponent = seat.opponent();
        match inner.state {
            MatchState::WaitingAck => {
                if inner.players[seat.index()].answered_launch {
                    // Still waiting on the opponent, whose answer settles the match
                    inner.players[seat.index()].accepted_launch = false;
                    return MatchProgress::Running;
                }
                self.on_launch(inner, seat, false).unwrap_or(MatchProgress::Running)
            }
            MatchState::Loading => {
                self.send(inner, opponent, UserAnswer::Loading(LoadingAnswer::OpponentDropped));
                self.release(inner)
            }
            MatchState::Started => {
                let answer = GameCommandAnswer::GameFinished {
                    winner: opponent.number(),
                };
                self.send(inner, opponent, UserAnswer::GameCommand(answer));
                self.send_player_left(inner, seat);
                self.release(inner)
            }
            MatchState::Finished => {
                self.send_player_left(inner, seat);
                self.release(inner)
            }
            MatchState::Released => MatchProgress::Running,
        }
    }

    fn send_player_left(&self, inner: &mut MatchInner, seat: Seat) {
        let answer = GameCommandAnswer::PlayerLeft { seat: seat.number() };
        self.send(inner, seat.opponent(), UserAnswer::GameCommand(answer));
    }

    /// Detach both sessions and mark the match released
    fn release(&self, inner: &mut MatchInner) -> MatchProgress {
        inner.state = MatchState::Released;
        for player in &inner.players {
            self.sessions.with_current(player.handle, |state| {
                if state.match_id() == Some(self.id) {
                    state.release_match();
                }
            });
        }
        tracing::debug!("Match {} released", self.id);
        MatchProgress::Released
    }

    fn advance(&self, inner: &MatchInner, seat: Seat, next: QuickMatchStatus) {
        let handle = inner.players[seat.index()].handle;
        let outcome = self.sessions.with_current(handle, |state| {
            if state.match_id() == Some(self.id) {
                state.advance_quick_match(next)
            } else {
                Ok(())
            }
        });
        if let Some(Err(e)) = outcome {
            tracing::error!("Match {}: {}", self.id, e);
        }
    }

    /// Best-effort send; a failed player is not written to again
    fn send(&self, inner: &mut MatchInner, seat: Seat, answer: UserAnswer) {
        let player = &mut inner.players[seat.index()];
        if player.gone {
            return;
        }
        if self.sessions.with_current(player.handle, |_| ()).is_none() {
            player.gone = true;
            return;
        }

        let result = answer
            .encode()
            .and_then(|frame| self.transport.send(player.handle.id, &frame));
        if let Err(e) = result {
            tracing::warn!(
                "Match {}: could not reach seat {} (session {}): {}",
                self.id,
                seat.number(),
                player.handle.id,
                e
            );
            player.gone = true;
        }
    }
}

impl fmt::Debug for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("id", &self.id)
            .field("players", &self.handles)
            .field("state", &self.state())
            .finish()
    }
}
