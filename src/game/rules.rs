//! Rules engine boundary
//!
//! The gameplay rules are an external collaborator: a match hands every
//! player action to its engine and acts on the verdict.

use std::sync::Arc;

use super::Seat;

/// What a match should do with an action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Forward the action to the opponent
    Relay,

    /// Refuse the action, only its sender is told
    Reject,

    /// The match is over; `None` is a draw
    Finish { winner: Option<Seat> },
}

/// Gameplay rules of one match
pub trait RulesEngine: Send {
    /// Called once when both players finished loading
    fn on_start(&mut self) {}

    fn on_action(&mut self, seat: Seat, action: &[u8]) -> Verdict;
}

/// Builds a fresh rules engine for every match
pub type RulesFactory = Arc<dyn Fn() -> Box<dyn RulesEngine> + Send + Sync>;

/// Rules that forward every non-empty action to the opponent
#[derive(Debug, Default)]
pub struct RelayRules {
    relayed: u64,
}

impl RelayRules {
    pub fn relayed(&self) -> u64 {
        self.relayed
    }
}

impl RulesEngine for RelayRules {
    fn on_action(&mut self, _seat: Seat, action: &[u8]) -> Verdict {
        if action.is_empty() {
            return Verdict::Reject;
        }
        self.relayed += 1;
        Verdict::Relay
    }
}

/// Factory producing [`RelayRules`]
pub fn relay_rules() -> RulesFactory {
    Arc::new(|| Box::new(RelayRules::default()) as Box<dyn RulesEngine>)
}
