//! Server Data
//!
//! Shared state of a running server: one engine per role, the quick match
//! waiting list, the game pool, the account store and the shutdown state.
//!
//! ## Inbound Flow
//! ```text
//! reader thread ──push──▶ session queue
//!               ──notify(id)──▶ role channel ──▶ worker ──▶ dispatch
//! ```
//! A notification only says "this session has something"; the worker pops
//! under the session's dispatch lock, so a notification for an already
//! drained queue is a no-op.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use crate::account::AccountStore;
use crate::config::Config;
use crate::error::{Result, SkirmishError};
use crate::game::{GamePool, RulesFactory};
use crate::manager::SessionManager;
use crate::matchmaking::QuickMatch;
use crate::network::{send_frame, send_notice, Transport};
use crate::protocol::admin::ServerStats;
use crate::protocol::{Inbound, MessageType, SystemNotice};
use crate::session::SessionId;

/// The three connection roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Admin,
    Updater,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Admin, Role::Updater];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Updater => "updater",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Role Engine
// =============================================================================

/// Sessions, transport and inbound channel of one role
pub struct RoleEngine {
    manager: SessionManager,
    transport: Arc<dyn Transport>,
    notify_tx: Sender<SessionId>,
    notify_rx: Receiver<SessionId>,
}

impl RoleEngine {
    pub fn new(role: Role, slot_count: usize, config: &Config, transport: Arc<dyn Transport>) -> Self {
        let (notify_tx, notify_rx) = channel::bounded(config.role_queue_capacity);
        Self {
            manager: SessionManager::new(role, slot_count, config.session_queue_capacity),
            transport,
            notify_tx,
            notify_rx,
        }
    }

    pub fn role(&self) -> Role {
        self.manager.role()
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Queue an inbound event for a session and wake a worker
    ///
    /// Blocks while the role channel is full.
    pub fn deliver(&self, id: SessionId, inbound: Inbound) -> Result<()> {
        self.manager.get_session(id)?.push_message(inbound)?;
        self.notify(id)
    }

    /// Queue the final Close of a connection, bypassing the queue capacity
    pub fn deliver_close(&self, id: SessionId) -> Result<()> {
        self.manager.get_session(id)?.push_close()?;
        self.notify(id)
    }

    fn notify(&self, id: SessionId) -> Result<()> {
        self.notify_tx
            .send(id)
            .map_err(|_| SkirmishError::Transport(format!("{} inbound channel closed", self.role())))
    }

    /// A transport accepted a connection on slot `id`
    pub fn connection_opened(&self, id: SessionId) -> Result<()> {
        self.manager.get_session(id)?.queue().reopen();
        self.deliver(id, Inbound::Open)
    }

    /// Next session with pending work, if one shows up within `timeout`
    pub fn next_ready(&self, timeout: Duration) -> Option<SessionId> {
        match self.notify_rx.recv_timeout(timeout) {
            Ok(id) => Some(id),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn pending_notifications(&self) -> usize {
        self.notify_rx.len()
    }

    pub fn send(&self, id: SessionId, message_type: MessageType, payload: &[u8]) -> Result<()> {
        send_frame(self.transport.as_ref(), id, message_type, payload)
    }

    pub fn send_notice(&self, id: SessionId, notice: SystemNotice) {
        send_notice(self.transport.as_ref(), id, notice)
    }
}

// =============================================================================
// Shutdown
// =============================================================================

/// Scheduled shutdown and the "being killed" flag
///
/// Once killed, workers answer new requests with SERVER_SHUTTING_DOWN and
/// exit when their channel is drained.
#[derive(Default)]
pub struct ShutdownState {
    deadline: Mutex<Option<Instant>>,
    being_killed: AtomicBool,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the shutdown `seconds` from now, replacing any earlier one
    pub fn schedule(&self, seconds: u32) {
        *self.deadline.lock() = Some(Instant::now() + Duration::from_secs(u64::from(seconds)));
        tracing::info!("Server shutdown scheduled in {}s", seconds);
    }

    /// Remaining seconds before shutdown, -1 if none is scheduled
    pub fn seconds_before_shutdown(&self) -> i32 {
        match *self.deadline.lock() {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now()).as_secs();
                i32::try_from(remaining).unwrap_or(i32::MAX)
            }
            None => -1,
        }
    }

    /// Flip to killed once the deadline passed; returns whether killed
    pub fn poll(&self) -> bool {
        if self.is_being_killed() {
            return true;
        }
        let expired = matches!(*self.deadline.lock(), Some(deadline) if Instant::now() >= deadline);
        if expired {
            self.kill();
        }
        expired
    }

    pub fn kill(&self) {
        if !self.being_killed.swap(true, Ordering::SeqCst) {
            tracing::info!("Server is being killed");
        }
    }

    pub fn is_being_killed(&self) -> bool {
        self.being_killed.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Server Data
// =============================================================================

/// Outbound transports, one per role
pub struct Transports {
    pub user: Arc<dyn Transport>,
    pub admin: Arc<dyn Transport>,
    pub updater: Arc<dyn Transport>,
}

pub struct ServerData {
    config: Config,
    users: RoleEngine,
    admins: RoleEngine,
    updaters: RoleEngine,
    quick_match: QuickMatch,
    games: GamePool,
    accounts: Arc<dyn AccountStore>,
    shutdown: ShutdownState,
}

impl ServerData {
    pub fn new(
        config: Config,
        accounts: Arc<dyn AccountStore>,
        transports: Transports,
        rules: RulesFactory,
    ) -> Result<Self> {
        config.validate()?;

        let users = RoleEngine::new(Role::User, config.max_user_sessions, &config, Arc::clone(&transports.user));
        let admins = RoleEngine::new(Role::Admin, config.max_admin_sessions, &config, transports.admin);
        let updaters = RoleEngine::new(Role::Updater, config.max_updater_sessions, &config, transports.updater);
        let games = GamePool::new(
            config.max_live_matches,
            Arc::clone(users.manager().table()),
            transports.user,
            rules,
        );

        Ok(Self {
            quick_match: QuickMatch::new(config.max_waiting_players),
            config,
            users,
            admins,
            updaters,
            games,
            accounts,
            shutdown: ShutdownState::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self, role: Role) -> &RoleEngine {
        match role {
            Role::User => &self.users,
            Role::Admin => &self.admins,
            Role::Updater => &self.updaters,
        }
    }

    pub fn users(&self) -> &RoleEngine {
        &self.users
    }

    pub fn admins(&self) -> &RoleEngine {
        &self.admins
    }

    pub fn updaters(&self) -> &RoleEngine {
        &self.updaters
    }

    pub fn quick_match(&self) -> &QuickMatch {
        &self.quick_match
    }

    pub fn games(&self) -> &GamePool {
        &self.games
    }

    pub fn accounts(&self) -> &Arc<dyn AccountStore> {
        &self.accounts
    }

    pub fn shutdown(&self) -> &ShutdownState {
        &self.shutdown
    }

    /// Run one pairing pass and announce the new matches
    ///
    /// Each announcement holds the dispatch locks of both players, so the
    /// LOOKING_FOR_OPPONENT answer of a session is always sent before its
    /// OPPONENT_FOUND.
    pub fn run_pairing_pass(&self) -> usize {
        let table = self.users.manager().table();
        let created = self.quick_match.pairing_pass(&self.games, table);

        for game in &created {
            let [first, second] = game.players();
            let (low, high) = if first.id < second.id {
                (first.id, second.id)
            } else {
                (second.id, first.id)
            };
            let (Ok(low), Ok(high)) = (table.get(low), table.get(high)) else {
                continue;
            };
            let _low_guard = low.lock_dispatch();
            let _high_guard = high.lock_dispatch();
            game.announce();
        }
        created.len()
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            open_user_sessions: self.users.manager().open_count() as u32,
            waiting_players: self.quick_match.waiting_len() as u32,
            live_matches: self.games.len() as u32,
            seconds_before_shutdown: self.shutdown.seconds_before_shutdown(),
        }
    }
}
