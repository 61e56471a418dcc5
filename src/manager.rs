//! Session manager
//!
//! Opens, connects, logs in and closes the sessions of one role. The
//! opened-sessions index is a list lock: it is taken before any session
//! state lock, never after.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::account::{Account, AuthError};
use crate::error::{DisconnectReason, Resource, Result, SkirmishError};
use crate::protocol::admin::UserInfo;
use crate::protocol::ConnectStatus;
use crate::server_data::Role;
use crate::session::{Session, SessionId, SessionStatus, SessionTable};

pub struct SessionManager {
    role: Role,
    table: Arc<SessionTable>,
    opened: Mutex<Vec<SessionId>>,
    max_open: usize,
}

impl SessionManager {
    /// Manager over a fresh table of `slot_count` sessions
    pub fn new(role: Role, slot_count: usize, queue_capacity: usize) -> Self {
        Self {
            role,
            table: Arc::new(SessionTable::new(slot_count, queue_capacity)),
            opened: Mutex::new(Vec::with_capacity(slot_count)),
            max_open: slot_count,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn table(&self) -> &Arc<SessionTable> {
        &self.table
    }

    pub fn get_session(&self, id: SessionId) -> Result<&Session> {
        self.table.get(id)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// CLOSED → CONNECTING, registering the session as opened
    pub fn open_session(&self, id: SessionId) -> Result<()> {
        let session = self.table.get(id)?;
        let mut opened = self.opened.lock();
        if opened.len() >= self.max_open {
            return Err(SkirmishError::ResourceExhausted(Resource::SessionSlots));
        }

        session.lock_state().open()?;
        opened.push(id);
        tracing::debug!("{} session {} opened ({} open)", self.role, id, opened.len());
        Ok(())
    }

    /// Validate the announced version and move CONNECTING → CONNECTED
    ///
    /// A version mismatch is answered, not a violation; the session stays
    /// CONNECTING.
    pub fn connect(&self, id: SessionId, version: i32, expected: i32) -> Result<ConnectStatus> {
        let session = self.table.get(id)?;
        let mut state = session.lock_state();
        if state.status() != SessionStatus::Connecting {
            return Err(SkirmishError::wrong_protocol(format!(
                "{} session {}: CONNECT while {}",
                self.role,
                id,
                state.status()
            )));
        }
        if version != expected {
            tracing::info!(
                "{} session {}: version {} refused (expected {})",
                self.role,
                id,
                version,
                expected
            );
            return Ok(ConnectStatus::VersionError);
        }
        state.connect()?;
        Ok(ConnectStatus::Ok)
    }

    /// CONNECTED → LOGGED using `authenticate` to produce the account
    ///
    /// A refused authentication is answered, not a violation.
    pub fn login(
        &self,
        id: SessionId,
        authenticate: impl FnOnce() -> std::result::Result<Account, AuthError>,
    ) -> Result<std::result::Result<Account, AuthError>> {
        let session = self.table.get(id)?;
        let mut state = session.lock_state();
        if state.status() != SessionStatus::Connected {
            return Err(SkirmishError::wrong_protocol(format!(
                "{} session {}: LOGIN while {}",
                self.role,
                id,
                state.status()
            )));
        }

        match authenticate() {
            Ok(account) => {
                state.login(account.clone())?;
                tracing::info!("{} session {} logged in as {}", self.role, id, account.login);
                Ok(Ok(account))
            }
            Err(refused) => {
                tracing::info!("{} session {}: login refused ({:?})", self.role, id, refused);
                Ok(Err(refused))
            }
        }
    }

    /// LOGGED → CONNECTED, returns the detached account
    pub fn logout(&self, id: SessionId) -> Result<Account> {
        let session = self.table.get(id)?;
        let account = session.lock_state().logout()?;
        tracing::info!("{} session {} logged out ({})", self.role, id, account.login);
        Ok(account)
    }

    /// Any → CLOSED; unregisters the session and closes its queue
    ///
    /// Returns the account that was attached so the caller can hand it back
    /// to the account store.
    pub fn close_session(&self, id: SessionId) -> Result<Option<Account>> {
        let session = self.table.get(id)?;
        let mut opened = self.opened.lock();
        let (was_open, account) = {
            let mut state = session.lock_state();
            (!state.is_closed(), state.close())
        };
        opened.retain(|&open| open != id);
        session.queue().close();

        if was_open {
            tracing::debug!("{} session {} closed ({} open)", self.role, id, opened.len());
        }
        Ok(account)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Fail with NOT_LOGGED_IN unless the session is LOGGED
    pub fn require_logged(&self, id: SessionId) -> Result<()> {
        let status = self.table.get(id)?.status();
        if status != SessionStatus::Logged {
            return Err(SkirmishError::violation(
                DisconnectReason::NotLoggedIn,
                format!("{} session {} is {}", self.role, id, status),
            ));
        }
        Ok(())
    }

    /// Open session logged in as `login`, if any
    pub fn find_logged(&self, login: &str) -> Option<SessionId> {
        let opened = self.opened.lock();
        opened.iter().copied().find(|&id| {
            self.table
                .get(id)
                .map_or(false, |session| session.lock_state().login_name() == Some(login))
        })
    }

    pub fn opened_sessions(&self) -> Vec<SessionId> {
        self.opened.lock().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.max_open
    }

    /// Description of every open session, in opening order
    pub fn session_infos(&self) -> Vec<UserInfo> {
        let opened = self.opened.lock();
        opened
            .iter()
            .filter_map(|&id| self.table.get(id).ok())
            .map(|session| {
                let state = session.lock_state();
                UserInfo {
                    session_id: state.id() as u32,
                    login: state.login_name().map(str::to_string),
                    logged_in: state.is_logged_in(),
                    quick_match: state.quick_match().to_string(),
                }
            })
            .collect()
    }
}
