//! Session state machine
//!
//! Two independent axes guarded together by a session's general lock:
//!
//! ```text
//! connection:  CLOSED ─open→ CONNECTING ─connect→ CONNECTED ─login→ LOGGED
//!                 ▲                                   ▲──logout──┘
//!                 └───────────── close (from any state) ─────────────
//!
//! quick match: NOT_WAITING → LOOKING_FOR_OPPONENT → OPPONENT_FOUND
//!              → WAITING_FOR_OPPONENT → LOADING → LOADING_FINISHED → FIGHTING
//!              (cancel: LOOKING_FOR_OPPONENT → NOT_WAITING only;
//!               release of the match or close: any → NOT_WAITING)
//! ```
//!
//! Transitions are crate-private: only the session manager, the quick match
//! waiting list and a match holding a validated handle may call them.

use std::fmt;

use crate::account::Account;
use crate::error::{Result, SkirmishError};
use crate::game::MatchId;

use super::SessionId;

/// Connection status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Closed,
    Connecting,
    Connected,
    Logged,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "CLOSED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Logged => "LOGGED",
        };
        f.write_str(name)
    }
}

/// Quick match status of a session
///
/// Declaration order is the progression order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QuickMatchStatus {
    NotWaiting,
    LookingForOpponent,
    OpponentFound,
    WaitingForOpponent,
    Loading,
    LoadingFinished,
    Fighting,
}

impl QuickMatchStatus {
    /// The single legal forward step, if any
    pub fn next(self) -> Option<Self> {
        match self {
            Self::NotWaiting => Some(Self::LookingForOpponent),
            Self::LookingForOpponent => Some(Self::OpponentFound),
            Self::OpponentFound => Some(Self::WaitingForOpponent),
            Self::WaitingForOpponent => Some(Self::Loading),
            Self::Loading => Some(Self::LoadingFinished),
            Self::LoadingFinished => Some(Self::Fighting),
            Self::Fighting => None,
        }
    }

    /// Whether a session in this status must hold a match reference
    pub fn requires_match(self) -> bool {
        self >= Self::OpponentFound
    }
}

impl fmt::Display for QuickMatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotWaiting => "NOT_WAITING",
            Self::LookingForOpponent => "LOOKING_FOR_OPPONENT",
            Self::OpponentFound => "OPPONENT_FOUND",
            Self::WaitingForOpponent => "WAITING_FOR_OPPONENT",
            Self::Loading => "LOADING",
            Self::LoadingFinished => "LOADING_FINISHED",
            Self::Fighting => "FIGHTING",
        };
        f.write_str(name)
    }
}

/// Fields guarded by a session's general lock
#[derive(Debug, Clone)]
pub struct SessionState {
    id: SessionId,
    status: SessionStatus,
    quick_match: QuickMatchStatus,
    account: Option<Account>,
    match_id: Option<MatchId>,
    /// Bumped on every open so stale handles to a reused slot are detected
    generation: u32,
}

impl SessionState {
    pub(crate) fn new(id: SessionId) -> Self {
        Self {
            id,
            status: SessionStatus::Closed,
            quick_match: QuickMatchStatus::NotWaiting,
            account: None,
            match_id: None,
            generation: 0,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn quick_match(&self) -> QuickMatchStatus {
        self.quick_match
    }

    pub fn account(&self) -> Option<&Account> {
        self.account.as_ref()
    }

    pub fn match_id(&self) -> Option<MatchId> {
        self.match_id
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_closed(&self) -> bool {
        self.status == SessionStatus::Closed
    }

    pub fn is_logged_in(&self) -> bool {
        self.status == SessionStatus::Logged
    }

    /// Login of the attached account, if logged in
    pub fn login_name(&self) -> Option<&str> {
        self.account.as_ref().map(|account| account.login.as_str())
    }

    // =========================================================================
    // Connection Transitions
    // =========================================================================

    fn expect_status(&self, expected: SessionStatus, operation: &str) -> Result<()> {
        if self.status != expected {
            return Err(SkirmishError::wrong_protocol(format!(
                "Session {}: {} requires {}, session is {}",
                self.id, operation, expected, self.status
            )));
        }
        Ok(())
    }

    /// CLOSED → CONNECTING
    pub(crate) fn open(&mut self) -> Result<()> {
        self.expect_status(SessionStatus::Closed, "open")?;
        self.status = SessionStatus::Connecting;
        self.quick_match = QuickMatchStatus::NotWaiting;
        self.match_id = None;
        self.account = None;
        self.generation = self.generation.wrapping_add(1);
        Ok(())
    }

    /// CONNECTING → CONNECTED
    pub(crate) fn connect(&mut self) -> Result<()> {
        self.expect_status(SessionStatus::Connecting, "connect")?;
        self.status = SessionStatus::Connected;
        Ok(())
    }

    /// CONNECTED → LOGGED
    pub(crate) fn login(&mut self, account: Account) -> Result<()> {
        self.expect_status(SessionStatus::Connected, "login")?;
        self.status = SessionStatus::Logged;
        self.account = Some(account);
        self.quick_match = QuickMatchStatus::NotWaiting;
        self.match_id = None;
        Ok(())
    }

    /// LOGGED → CONNECTED, returns the detached account
    ///
    /// The quick match axis goes back to NOT_WAITING; the caller leaves the
    /// waiting list and abandons the match first.
    pub(crate) fn logout(&mut self) -> Result<Account> {
        self.expect_status(SessionStatus::Logged, "logout")?;
        self.status = SessionStatus::Connected;
        self.quick_match = QuickMatchStatus::NotWaiting;
        self.match_id = None;
        self.account
            .take()
            .ok_or_else(|| SkirmishError::wrong_protocol(format!("Session {}: logged without account", self.id)))
    }

    /// Any → CLOSED, returns the account that was attached, if any
    pub(crate) fn close(&mut self) -> Option<Account> {
        self.status = SessionStatus::Closed;
        self.quick_match = QuickMatchStatus::NotWaiting;
        self.match_id = None;
        self.account.take()
    }

    // =========================================================================
    // Quick Match Transitions
    // =========================================================================

    fn expect_quick_match(&self, expected: QuickMatchStatus, operation: &str) -> Result<()> {
        if self.quick_match != expected {
            return Err(SkirmishError::wrong_protocol(format!(
                "Session {}: {} requires quick match status {}, session is {}",
                self.id, operation, expected, self.quick_match
            )));
        }
        Ok(())
    }

    /// NOT_WAITING → LOOKING_FOR_OPPONENT
    pub(crate) fn start_looking(&mut self) -> Result<()> {
        self.expect_status(SessionStatus::Logged, "quick match")?;
        self.expect_quick_match(QuickMatchStatus::NotWaiting, "quick match")?;
        self.quick_match = QuickMatchStatus::LookingForOpponent;
        Ok(())
    }

    /// LOOKING_FOR_OPPONENT → NOT_WAITING
    pub(crate) fn cancel_looking(&mut self) -> Result<()> {
        self.expect_quick_match(QuickMatchStatus::LookingForOpponent, "cancel quick match")?;
        self.quick_match = QuickMatchStatus::NotWaiting;
        Ok(())
    }

    /// LOOKING_FOR_OPPONENT → OPPONENT_FOUND, attaching the match
    pub(crate) fn opponent_found(&mut self, match_id: MatchId) -> Result<()> {
        self.expect_quick_match(QuickMatchStatus::LookingForOpponent, "pairing")?;
        self.quick_match = QuickMatchStatus::OpponentFound;
        self.match_id = Some(match_id);
        Ok(())
    }

    /// One forward step along the in-match part of the quick match axis
    pub(crate) fn advance_quick_match(&mut self, next: QuickMatchStatus) -> Result<()> {
        if self.match_id.is_none() || !next.requires_match() || self.quick_match.next() != Some(next) {
            return Err(SkirmishError::wrong_protocol(format!(
                "Session {}: illegal quick match step {} → {}",
                self.id, self.quick_match, next
            )));
        }
        self.quick_match = next;
        Ok(())
    }

    /// Detach the match and return to NOT_WAITING
    pub(crate) fn release_match(&mut self) {
        self.quick_match = QuickMatchStatus::NotWaiting;
        self.match_id = None;
    }
}
