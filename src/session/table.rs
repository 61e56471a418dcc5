//! Session table
//!
//! Fixed arena of session slots allocated once at startup and addressed by
//! integer id. A [`SessionHandle`] pairs an id with the generation the slot
//! had when the handle was taken, so a reference kept across a close/open
//! cycle is detected as stale instead of aliasing the new connection.

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Result, SkirmishError};
use crate::protocol::Inbound;

use super::{MessageQueue, QuickMatchStatus, SessionId, SessionState, SessionStatus};

/// Stable reference to one connection occupying a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub id: SessionId,
    pub generation: u32,
}

/// One session slot
///
/// ## Locks
/// - `dispatch`: serializes message handling for this session, taken first
/// - `state`: the general lock for status, account and match fields
/// - the queue's own lock, always innermost
pub struct Session {
    id: SessionId,
    dispatch: Mutex<()>,
    state: Mutex<SessionState>,
    queue: MessageQueue,
}

impl Session {
    fn new(id: SessionId, queue_capacity: usize) -> Self {
        Self {
            id,
            dispatch: Mutex::new(()),
            state: Mutex::new(SessionState::new(id)),
            queue: MessageQueue::new(id, queue_capacity),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> SessionState {
        self.state.lock().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.lock().status()
    }

    pub fn quick_match_status(&self) -> QuickMatchStatus {
        self.state.lock().quick_match()
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id,
            generation: self.state.lock().generation(),
        }
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock()
    }

    pub(crate) fn lock_dispatch(&self) -> MutexGuard<'_, ()> {
        self.dispatch.lock()
    }

    // =========================================================================
    // Message Queue
    // =========================================================================

    pub fn push_message(&self, inbound: Inbound) -> Result<()> {
        self.queue.push(inbound)
    }

    /// Queue the final Close even when the queue is full
    pub fn push_close(&self) -> Result<()> {
        self.queue.push_close()
    }

    /// Blocks until a message arrives or the session closes
    pub fn pop_message(&self) -> Result<Inbound> {
        self.queue.pop()
    }

    pub fn pop_message_timeout(&self, timeout: Duration) -> Result<Option<Inbound>> {
        self.queue.pop_timeout(timeout)
    }

    pub fn try_pop_message(&self) -> Option<Inbound> {
        self.queue.try_pop()
    }

    pub fn pending_messages(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn queue(&self) -> &MessageQueue {
        &self.queue
    }
}

/// Pre-allocated table of sessions for one role
pub struct SessionTable {
    slots: Box<[Session]>,
}

impl SessionTable {
    pub fn new(slot_count: usize, queue_capacity: usize) -> Self {
        let slots = (0..slot_count)
            .map(|id| Session::new(id, queue_capacity))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { slots }
    }

    /// Bounds-checked lookup
    pub fn get(&self, id: SessionId) -> Result<&Session> {
        self.slots.get(id).ok_or(SkirmishError::SessionNotFound(id))
    }

    pub fn is_valid_id(&self, id: SessionId) -> bool {
        id < self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Run `f` on the state of the connection `handle` refers to
    ///
    /// Returns `None` if the slot was closed or reused since the handle was
    /// taken.
    pub(crate) fn with_current<R>(&self, handle: SessionHandle, f: impl FnOnce(&mut SessionState) -> R) -> Option<R> {
        let session = self.slots.get(handle.id)?;
        let mut state = session.lock_state();
        if state.is_closed() || state.generation() != handle.generation {
            return None;
        }
        Some(f(&mut state))
    }

    /// Lock the states of two distinct sessions, lower id first
    ///
    /// Guards are returned in argument order.
    pub(crate) fn lock_pair(
        &self,
        a: SessionId,
        b: SessionId,
    ) -> Result<(MutexGuard<'_, SessionState>, MutexGuard<'_, SessionState>)> {
        if a == b {
            return Err(SkirmishError::wrong_protocol(format!("Session {} paired with itself", a)));
        }
        let (first, second) = (self.get(a)?, self.get(b)?);
        if a < b {
            let guard_a = first.lock_state();
            let guard_b = second.lock_state();
            Ok((guard_a, guard_b))
        } else {
            let guard_b = second.lock_state();
            let guard_a = first.lock_state();
            Ok((guard_a, guard_b))
        }
    }
}
