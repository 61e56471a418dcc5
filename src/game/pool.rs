//! Game pool
//!
//! Bounded owner of every live match. Matches never point back at the pool:
//! whoever feeds an event that returns [`MatchProgress::Released`] removes the
//! match here.
//!
//! [`MatchProgress::Released`]: super::MatchProgress::Released

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Resource, Result, SkirmishError};
use crate::network::Transport;
use crate::session::{SessionHandle, SessionTable};

use super::{Match, MatchId, RulesFactory};

pub struct GamePool {
    capacity: usize,
    next_id: AtomicU64,
    matches: Mutex<HashMap<MatchId, Arc<Match>>>,
    sessions: Arc<SessionTable>,
    transport: Arc<dyn Transport>,
    rules: RulesFactory,
}

impl GamePool {
    pub fn new(
        capacity: usize,
        sessions: Arc<SessionTable>,
        transport: Arc<dyn Transport>,
        rules: RulesFactory,
    ) -> Self {
        Self {
            capacity,
            next_id: AtomicU64::new(1),
            matches: Mutex::new(HashMap::new()),
            sessions,
            transport,
            rules,
        }
    }

    /// Create a match for two players
    ///
    /// Fails with `ResourceExhausted(GamePool)` when the pool is full.
    pub fn create(&self, players: [(SessionHandle, String); 2]) -> Result<Arc<Match>> {
        let mut matches = self.matches.lock();
        if matches.len() >= self.capacity {
            return Err(SkirmishError::ResourceExhausted(Resource::GamePool));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let game = Arc::new(Match::new(
            id,
            players,
            Arc::clone(&self.sessions),
            Arc::clone(&self.transport),
            (self.rules)(),
        ));
        matches.insert(id, Arc::clone(&game));
        tracing::debug!("Match {} created ({} live)", id, matches.len());
        Ok(game)
    }

    pub fn get(&self, id: MatchId) -> Option<Arc<Match>> {
        self.matches.lock().get(&id).cloned()
    }

    /// Remove a match, returns false if it was already gone
    pub fn release(&self, id: MatchId) -> bool {
        self.matches.lock().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.matches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.matches.lock().len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
