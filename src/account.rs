//! Account Module
//!
//! Boundary to the identity store, consulted during LOGIN and by the admin
//! moderation requests, plus an in-memory store used by the server binary
//! and the tests.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::protocol::user::LoginStatus;

/// Snapshot of an account attached to a logged session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub login: String,
    pub wins: u32,
    pub losses: u32,
}

impl Account {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            wins: 0,
            losses: 0,
        }
    }
}

/// Why authentication was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    UnknownLogin,
    WrongPassword,
    Banned,
    Locked,
    AlreadyLogged,
}

impl AuthError {
    /// LOGIN answer status for this refusal
    pub fn login_status(self) -> LoginStatus {
        match self {
            Self::UnknownLogin => LoginStatus::UnknownLogin,
            Self::WrongPassword => LoginStatus::WrongPassword,
            Self::Banned => LoginStatus::AccountBanned,
            Self::Locked => LoginStatus::AccountLocked,
            Self::AlreadyLogged => LoginStatus::AlreadyLogged,
        }
    }
}

/// Identity store contract
pub trait AccountStore: Send + Sync {
    /// Check credentials and mark the account as logged in
    fn authenticate(&self, login: &str, password: &str) -> std::result::Result<Account, AuthError>;

    /// Clear the logged-in mark set by a successful `authenticate`
    fn logout(&self, account: &Account);

    /// Ban an account for `days` days, 0 meaning until unbanned
    ///
    /// Returns false if the login does not exist; the same holds for the
    /// other moderation calls.
    fn ban(&self, login: &str, days: u32) -> bool;

    fn unban(&self, login: &str) -> bool;

    fn lock(&self, login: &str) -> bool;

    fn unlock(&self, login: &str) -> bool;
}

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy)]
enum Ban {
    Forever,
    Until(Instant),
}

impl Ban {
    fn is_active(self) -> bool {
        match self {
            Self::Forever => true,
            Self::Until(end) => Instant::now() < end,
        }
    }
}

struct StoredAccount {
    password: String,
    account: Account,
    ban: Option<Ban>,
    locked: bool,
    logged: bool,
}

/// Account store kept in memory
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<String, StoredAccount>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace an account
    pub fn insert(&self, login: impl Into<String>, password: impl Into<String>) {
        let login = login.into();
        let stored = StoredAccount {
            password: password.into(),
            account: Account::new(login.clone()),
            ban: None,
            locked: false,
            logged: false,
        };
        self.accounts.write().insert(login, stored);
    }

    /// Apply `change` to a stored account; false if the login does not exist
    fn update(&self, login: &str, change: impl FnOnce(&mut StoredAccount)) -> bool {
        match self.accounts.write().get_mut(login) {
            Some(stored) => {
                change(stored);
                true
            }
            None => false,
        }
    }

    pub fn is_logged(&self, login: &str) -> bool {
        self.accounts.read().get(login).map_or(false, |stored| stored.logged)
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AccountStore for MemoryAccountStore {
    fn authenticate(&self, login: &str, password: &str) -> std::result::Result<Account, AuthError> {
        let mut accounts = self.accounts.write();
        let stored = accounts.get_mut(login).ok_or(AuthError::UnknownLogin)?;

        if stored.password != password {
            return Err(AuthError::WrongPassword);
        }
        if stored.ban.map_or(false, Ban::is_active) {
            return Err(AuthError::Banned);
        }
        if stored.locked {
            return Err(AuthError::Locked);
        }
        if stored.logged {
            return Err(AuthError::AlreadyLogged);
        }

        stored.logged = true;
        Ok(stored.account.clone())
    }

    fn logout(&self, account: &Account) {
        if let Some(stored) = self.accounts.write().get_mut(&account.login) {
            stored.logged = false;
        }
    }

    fn ban(&self, login: &str, days: u32) -> bool {
        let ban = match days {
            0 => Ban::Forever,
            days => Ban::Until(Instant::now() + Duration::from_secs(u64::from(days) * SECONDS_PER_DAY)),
        };
        self.update(login, |stored| stored.ban = Some(ban))
    }

    fn unban(&self, login: &str) -> bool {
        self.update(login, |stored| stored.ban = None)
    }

    fn lock(&self, login: &str) -> bool {
        self.update(login, |stored| stored.locked = true)
    }

    fn unlock(&self, login: &str) -> bool {
        self.update(login, |stored| stored.locked = false)
    }
}
