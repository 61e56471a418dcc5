//! Session inbound queue
//!
//! Bounded FIFO with its own lock. This lock is always the innermost one:
//! no other lock is ever acquired while it is held, so the transport reader
//! can push while a worker is busy changing the session's state.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Resource, Result, SkirmishError};
use crate::protocol::Inbound;

use super::SessionId;

struct QueueInner {
    messages: VecDeque<Inbound>,
    closed: bool,
}

/// Thread-safe inbound queue of one session
pub struct MessageQueue {
    session_id: SessionId,
    capacity: usize,
    inner: Mutex<QueueInner>,
    available: Condvar,
}

impl MessageQueue {
    /// Create a closed queue; it accepts messages once reopened
    pub fn new(session_id: SessionId, capacity: usize) -> Self {
        Self {
            session_id,
            capacity,
            inner: Mutex::new(QueueInner {
                messages: VecDeque::with_capacity(capacity),
                closed: true,
            }),
            available: Condvar::new(),
        }
    }

    /// Append a message
    ///
    /// Fails with `SessionClosed` on a closed queue and with
    /// `ResourceExhausted` when the queue is full.
    pub fn push(&self, inbound: Inbound) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(SkirmishError::SessionClosed(self.session_id));
        }
        if inner.messages.len() >= self.capacity {
            return Err(SkirmishError::ResourceExhausted(Resource::SessionQueue));
        }
        inner.messages.push_back(inbound);
        drop(inner);

        self.available.notify_one();
        Ok(())
    }

    /// Append the final Close of a connection, ignoring the capacity
    ///
    /// A reader whose queue overflowed must still be able to hand its session
    /// back. Fails only with `SessionClosed`.
    pub fn push_close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(SkirmishError::SessionClosed(self.session_id));
        }
        inner.messages.push_back(Inbound::Close);
        drop(inner);

        self.available.notify_one();
        Ok(())
    }

    /// Remove the oldest message, blocking until one is available
    ///
    /// Fails with `SessionClosed` once the queue is closed instead of
    /// blocking forever.
    pub fn pop(&self) -> Result<Inbound> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(inbound) = inner.messages.pop_front() {
                return Ok(inbound);
            }
            if inner.closed {
                return Err(SkirmishError::SessionClosed(self.session_id));
            }
            self.available.wait(&mut inner);
        }
    }

    /// Like [`pop`](Self::pop) but gives up after `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<Inbound>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if let Some(inbound) = inner.messages.pop_front() {
                return Ok(Some(inbound));
            }
            if inner.closed {
                return Err(SkirmishError::SessionClosed(self.session_id));
            }
            if self.available.wait_until(&mut inner, deadline).timed_out() {
                return Ok(inner.messages.pop_front());
            }
        }
    }

    /// Remove the oldest message without blocking
    pub fn try_pop(&self) -> Option<Inbound> {
        self.inner.lock().messages.pop_front()
    }

    /// Close the queue, dropping pending messages and waking blocked poppers
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        inner.messages.clear();
        drop(inner);

        self.available.notify_all();
    }

    /// Reopen for a new connection, discarding anything left from the old one
    pub fn reopen(&self) {
        let mut inner = self.inner.lock();
        inner.closed = false;
        inner.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}
