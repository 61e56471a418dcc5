//! # Skirmish
//!
//! Session lifecycle and quick match core of a two-player duel server:
//! - Fixed table of sessions per role (user, admin, updater)
//! - Framed binary protocol over TCP
//! - FIFO quick match pairing into a bounded game pool
//! - Per-role worker pools with strictly ordered per-session dispatch
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              TCP Listeners (user / admin / updater)          │
//! │                 one reader thread per connection             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  session queue + role channel
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Role Worker Pools                           │
//! │          (dispatch lock per session, any worker)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼─────────────────────┐
//!          ▼            ▼                     ▼
//!   ┌─────────────┐ ┌─────────────┐   ┌─────────────┐
//!   │   Session   │ │ Quick Match │──▶│  Game Pool  │
//!   │   Manager   │ │  (FIFO)     │   │  (Matches)  │
//!   └─────────────┘ └─────────────┘   └─────────────┘
//! ```
//!
//! ## Lock Order
//! session dispatch → waiting list / opened index → match → session state
//! → message queue. No lock is ever taken against this order. An admin
//! dispatch lock may be held while taking a user one, never the reverse.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod account;
pub mod dispatch;
pub mod game;
pub mod manager;
pub mod matchmaking;
pub mod network;
pub mod protocol;
pub mod server_data;
pub mod session;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, SkirmishError};
pub use config::Config;
pub use account::{Account, AccountStore, MemoryAccountStore};
pub use server_data::{Role, ServerData};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Skirmish
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
