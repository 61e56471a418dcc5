//! Configuration for Skirmish
//!
//! Centralized configuration with sensible defaults.

use crate::error::{Result, SkirmishError};

/// Main configuration for a Skirmish server instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Protocol version clients must announce in CONNECT
    pub version: i32,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address for player traffic
    pub user_addr: String,

    /// TCP listen address for admin traffic
    pub admin_addr: String,

    /// TCP listen address for updater traffic
    pub updater_addr: String,

    /// Connection read timeout (milliseconds, 0 = none)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds, 0 = none)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Session Configuration
    // -------------------------------------------------------------------------
    /// Pre-allocated user session slots
    pub max_user_sessions: usize,

    /// Pre-allocated admin session slots
    pub max_admin_sessions: usize,

    /// Pre-allocated updater session slots
    pub max_updater_sessions: usize,

    /// Max pending inbound messages per session
    pub session_queue_capacity: usize,

    /// Max pending notifications per role inbound channel
    pub role_queue_capacity: usize,

    // -------------------------------------------------------------------------
    // Worker Configuration
    // -------------------------------------------------------------------------
    /// Worker threads serving the user role
    pub user_worker_threads: usize,

    /// Worker threads serving the admin role
    pub admin_worker_threads: usize,

    /// Worker threads serving the updater role
    pub updater_worker_threads: usize,

    // -------------------------------------------------------------------------
    // Matchmaking Configuration
    // -------------------------------------------------------------------------
    /// Max live matches owned by the game pool
    pub max_live_matches: usize,

    /// Max sessions in the quick match waiting list
    pub max_waiting_players: usize,

    /// Pairing pass interval when no arrival wakes the matchmaker (milliseconds)
    pub pairing_tick_ms: u64,

    // -------------------------------------------------------------------------
    // Lifecycle Configuration
    // -------------------------------------------------------------------------
    /// How often the supervisor and idle workers poll the shutdown state (milliseconds)
    pub shutdown_poll_ms: u64,

    /// Admin login accepted by ADMIN_LOGIN
    pub admin_login: String,

    /// Admin password accepted by ADMIN_LOGIN
    pub admin_password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            user_addr: "127.0.0.1:7000".to_string(),
            admin_addr: "127.0.0.1:7001".to_string(),
            updater_addr: "127.0.0.1:7002".to_string(),
            read_timeout_ms: 0,
            write_timeout_ms: 5000,
            max_user_sessions: 1024,
            max_admin_sessions: 8,
            max_updater_sessions: 64,
            session_queue_capacity: 64,
            role_queue_capacity: 4096,
            user_worker_threads: 4,
            admin_worker_threads: 1,
            updater_worker_threads: 1,
            max_live_matches: 512,
            max_waiting_players: 1024,
            pairing_tick_ms: 500,
            shutdown_poll_ms: 500,
            admin_login: "admin".to_string(),
            admin_password: "admin".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the configuration can run a server
    pub fn validate(&self) -> Result<()> {
        if self.max_user_sessions == 0 || self.max_admin_sessions == 0 || self.max_updater_sessions == 0 {
            return Err(SkirmishError::Config(
                "every role needs at least one session slot".to_string(),
            ));
        }
        if self.user_worker_threads == 0 || self.admin_worker_threads == 0 || self.updater_worker_threads == 0 {
            return Err(SkirmishError::Config(
                "every role needs at least one worker thread".to_string(),
            ));
        }
        if self.session_queue_capacity == 0 || self.role_queue_capacity == 0 {
            return Err(SkirmishError::Config("queue capacities must be positive".to_string()));
        }
        if self.pairing_tick_ms == 0 || self.shutdown_poll_ms == 0 {
            return Err(SkirmishError::Config("poll intervals must be positive".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the protocol version
    pub fn version(mut self, version: i32) -> Self {
        self.config.version = version;
        self
    }

    /// Set the user listen address
    pub fn user_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.user_addr = addr.into();
        self
    }

    /// Set the admin listen address
    pub fn admin_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.admin_addr = addr.into();
        self
    }

    /// Set the updater listen address
    pub fn updater_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.updater_addr = addr.into();
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the number of user session slots
    pub fn max_user_sessions(mut self, count: usize) -> Self {
        self.config.max_user_sessions = count;
        self
    }

    /// Set the number of admin session slots
    pub fn max_admin_sessions(mut self, count: usize) -> Self {
        self.config.max_admin_sessions = count;
        self
    }

    /// Set the number of updater session slots
    pub fn max_updater_sessions(mut self, count: usize) -> Self {
        self.config.max_updater_sessions = count;
        self
    }

    /// Set the per-session inbound queue capacity
    pub fn session_queue_capacity(mut self, count: usize) -> Self {
        self.config.session_queue_capacity = count;
        self
    }

    /// Set the per-role inbound channel capacity
    pub fn role_queue_capacity(mut self, count: usize) -> Self {
        self.config.role_queue_capacity = count;
        self
    }

    /// Set the number of user worker threads
    pub fn user_worker_threads(mut self, count: usize) -> Self {
        self.config.user_worker_threads = count;
        self
    }

    /// Set the number of admin worker threads
    pub fn admin_worker_threads(mut self, count: usize) -> Self {
        self.config.admin_worker_threads = count;
        self
    }

    /// Set the number of updater worker threads
    pub fn updater_worker_threads(mut self, count: usize) -> Self {
        self.config.updater_worker_threads = count;
        self
    }

    /// Set the game pool capacity
    pub fn max_live_matches(mut self, count: usize) -> Self {
        self.config.max_live_matches = count;
        self
    }

    /// Set the waiting list capacity
    pub fn max_waiting_players(mut self, count: usize) -> Self {
        self.config.max_waiting_players = count;
        self
    }

    /// Set the pairing tick (in milliseconds)
    pub fn pairing_tick_ms(mut self, ms: u64) -> Self {
        self.config.pairing_tick_ms = ms;
        self
    }

    /// Set the shutdown poll interval (in milliseconds)
    pub fn shutdown_poll_ms(mut self, ms: u64) -> Self {
        self.config.shutdown_poll_ms = ms;
        self
    }

    /// Set the admin credentials
    pub fn admin_credentials(mut self, login: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.admin_login = login.into();
        self.config.admin_password = password.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
