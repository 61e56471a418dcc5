//! Game Module
//!
//! Matches created by quick match pairing and the pool that owns them.
//!
//! ## Ownership
//! - `GamePool` owns every live `Match`
//! - sessions only keep the `MatchId` of the match they play in
//! - a match keeps generation-checked `SessionHandle`s of its two players

mod game_match;
mod pool;
mod rules;

pub use game_match::{Match, MatchProgress, MatchState};
pub use pool::GamePool;
pub use rules::{relay_rules, RelayRules, RulesEngine, RulesFactory, Verdict};

/// Identifier of a live match
pub type MatchId = u64;

/// One of the two player positions in a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    First,
    Second,
}

impl Seat {
    pub fn opponent(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }

    /// Wire number of the seat (1 or 2)
    pub fn number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }
}
