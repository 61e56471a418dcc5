//! Quick match waiting list
//!
//! FIFO of logged sessions looking for an opponent. The list lock is taken
//! before any session lock, and every LOOKING_FOR_OPPONENT transition happens
//! while it is held, so the list and the session statuses never disagree:
//! a session is in the list exactly when its quick match status is
//! LOOKING_FOR_OPPONENT.
//!
//! Pairing runs on the matchmaker thread, woken on every arrival and on a
//! fixed tick.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::{Resource, Result, SkirmishError};
use crate::game::{GamePool, Match};
use crate::protocol::user::QuickMatchAnswer;
use crate::session::{QuickMatchStatus, Session, SessionHandle, SessionId, SessionTable};

struct WaitingList {
    queue: VecDeque<SessionHandle>,
    /// An arrival happened since the last pairing pass
    pending: bool,
}

pub struct QuickMatch {
    capacity: usize,
    waiting: Mutex<WaitingList>,
    arrival: Condvar,
}

impl QuickMatch {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            waiting: Mutex::new(WaitingList {
                queue: VecDeque::with_capacity(capacity),
                pending: false,
            }),
            arrival: Condvar::new(),
        }
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Put a logged session at the tail of the waiting list
    ///
    /// A session already taking part in quick match gets
    /// ALREADY_LOOKING_FOR_OPPONENT, a full list gets SERVER_BUSY.
    pub fn request(&self, session: &Session) -> Result<QuickMatchAnswer> {
        let mut waiting = self.waiting.lock();
        let mut state = session.lock_state();

        if state.quick_match() != QuickMatchStatus::NotWaiting {
            return Ok(QuickMatchAnswer::AlreadyLookingForOpponent);
        }
        if waiting.queue.len() >= self.capacity {
            tracing::warn!(
                "Session {}: {} full ({} players)",
                session.id(),
                Resource::WaitingList,
                waiting.queue.len()
            );
            return Ok(QuickMatchAnswer::ServerBusy);
        }

        state.start_looking()?;
        waiting.queue.push_back(SessionHandle {
            id: session.id(),
            generation: state.generation(),
        });
        waiting.pending = true;
        drop(state);
        self.arrival.notify_one();

        tracing::debug!("Session {} looking for an opponent ({} waiting)", session.id(), waiting.queue.len());
        Ok(QuickMatchAnswer::LookingForOpponent)
    }

    /// Leave the waiting list; only legal while LOOKING_FOR_OPPONENT
    pub fn cancel(&self, session: &Session) -> Result<()> {
        let mut waiting = self.waiting.lock();
        let mut state = session.lock_state();
        state.cancel_looking()?;
        waiting.queue.retain(|handle| handle.id != session.id());
        tracing::debug!("Session {} cancelled quick match", session.id());
        Ok(())
    }

    /// Drop a closing session from the waiting list, if it is there
    pub fn remove(&self, session: &Session) -> bool {
        let mut waiting = self.waiting.lock();
        let mut state = session.lock_state();
        if state.quick_match() != QuickMatchStatus::LookingForOpponent {
            return false;
        }
        // cancel_looking cannot fail here, the status was just checked
        let _ = state.cancel_looking();
        waiting.queue.retain(|handle| handle.id != session.id());
        true
    }

    // =========================================================================
    // Pairing
    // =========================================================================

    /// Block until an arrival or the tick elapses
    pub fn wait_for_work(&self, tick: Duration) {
        let mut waiting = self.waiting.lock();
        if !waiting.pending {
            self.arrival.wait_for(&mut waiting, tick);
        }
    }

    /// Wake the matchmaker without an arrival
    pub fn wake(&self) {
        self.arrival.notify_all();
    }

    /// Pair waiting sessions two by two, oldest first
    ///
    /// Both sessions of a pair move to OPPONENT_FOUND with the new match id
    /// under their state locks, so neither is ever seen half-paired. When
    /// the pool is full the players stay in the list for a later pass.
    /// Returns the created matches; announcing them is up to the caller.
    pub fn pairing_pass(&self, pool: &GamePool, sessions: &SessionTable) -> Vec<Arc<Match>> {
        let mut waiting = self.waiting.lock();
        waiting.pending = false;
        let mut created = Vec::new();

        while waiting.queue.len() >= 2 {
            let (first, second) = (waiting.queue[0], waiting.queue[1]);

            // Step 1: Drop entries whose session moved on
            let Some(first_login) = looking_login(sessions, first) else {
                tracing::error!("Session {} in waiting list but not looking, dropped", first.id);
                waiting.queue.pop_front();
                continue;
            };
            let Some(second_login) = looking_login(sessions, second) else {
                tracing::error!("Session {} in waiting list but not looking, dropped", second.id);
                waiting.queue.remove(1);
                continue;
            };

            // Step 2: Create the match
            let game = match pool.create([(first, first_login), (second, second_login)]) {
                Ok(game) => game,
                Err(SkirmishError::ResourceExhausted(resource)) => {
                    tracing::warn!(
                        "{} full, {} players keep waiting",
                        resource,
                        waiting.queue.len()
                    );
                    break;
                }
                Err(e) => {
                    tracing::error!("Could not create match: {}", e);
                    break;
                }
            };

            // Step 3: Attach both sessions atomically
            if let Err(e) = attach(sessions, first.id, second.id, &game) {
                tracing::error!("Could not attach match {}: {}", game.id(), e);
                pool.release(game.id());
                break;
            }

            waiting.queue.pop_front();
            waiting.queue.pop_front();
            tracing::info!(
                "Match {} paired sessions {} and {}",
                game.id(),
                first.id,
                second.id
            );
            created.push(game);
        }

        created
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn waiting_len(&self) -> usize {
        self.waiting.lock().queue.len()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.waiting.lock().queue.iter().any(|handle| handle.id == id)
    }

    /// Waiting session ids, oldest first
    pub fn waiting_ids(&self) -> Vec<SessionId> {
        self.waiting.lock().queue.iter().map(|handle| handle.id).collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn looking_login(sessions: &SessionTable, handle: SessionHandle) -> Option<String> {
    sessions
        .with_current(handle, |state| {
            if state.quick_match() == QuickMatchStatus::LookingForOpponent {
                state.login_name().map(str::to_string)
            } else {
                None
            }
        })
        .flatten()
}

fn attach(sessions: &SessionTable, first: SessionId, second: SessionId, game: &Match) -> Result<()> {
    let (mut first_state, mut second_state) = sessions.lock_pair(first, second)?;
    if first_state.quick_match() != QuickMatchStatus::LookingForOpponent
        || second_state.quick_match() != QuickMatchStatus::LookingForOpponent
    {
        return Err(SkirmishError::wrong_protocol("paired session stopped looking"));
    }
    first_state.opponent_found(game.id())?;
    second_state.opponent_found(game.id())?;
    Ok(())
}
