//! TCP transport
//!
//! Maps session ids to sockets. A slot is handed out again only once both
//! sides are done with it: the reader thread delivered its final Close and
//! the server dropped the connection. That keeps a late event of an old
//! connection from ever reaching the session of a new one.

use std::io::{BufWriter, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, SkirmishError};
use crate::server_data::Role;
use crate::session::SessionId;

use super::Transport;

struct Slot {
    writer: Arc<Mutex<BufWriter<TcpStream>>>,
    stream: TcpStream,
    peer_addr: String,
    reader_done: bool,
    server_closed: bool,
}

/// Socket registry of one role
pub struct TcpTransport {
    role: Role,
    slots: Mutex<Vec<Option<Slot>>>,
}

impl TcpTransport {
    pub fn new(role: Role, slot_count: usize) -> Self {
        let mut slots = Vec::with_capacity(slot_count);
        slots.resize_with(slot_count, || None);
        Self {
            role,
            slots: Mutex::new(slots),
        }
    }

    /// Bind an accepted stream to the lowest free slot
    ///
    /// Returns `None` when every slot is taken.
    pub fn register(&self, stream: &TcpStream) -> Result<Option<SessionId>> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let mut slots = self.slots.lock();
        let Some(id) = slots.iter().position(Option::is_none) else {
            tracing::warn!("{}: no free slot for {}", self.role, peer_addr);
            return Ok(None);
        };

        slots[id] = Some(Slot {
            writer: Arc::new(Mutex::new(BufWriter::new(stream.try_clone()?))),
            stream: stream.try_clone()?,
            peer_addr,
            reader_done: false,
            server_closed: false,
        });
        Ok(Some(id))
    }

    /// Whether the reader of `id` should still deliver its Close
    pub(crate) fn reader_closing(&self, id: SessionId) -> bool {
        let slots = self.slots.lock();
        matches!(slots.get(id), Some(Some(slot)) if !slot.server_closed)
    }

    /// The reader of `id` exited; frees the slot if the server is done too
    pub(crate) fn reader_finished(&self, id: SessionId) {
        let mut slots = self.slots.lock();
        let Some(entry) = slots.get_mut(id) else {
            return;
        };
        let free = match entry {
            Some(slot) => {
                slot.reader_done = true;
                slot.server_closed
            }
            None => false,
        };
        if free {
            *entry = None;
        }
    }

    pub fn peer_addr(&self, id: SessionId) -> Option<String> {
        let slots = self.slots.lock();
        slots.get(id)?.as_ref().map(|slot| slot.peer_addr.clone())
    }

    pub fn connection_count(&self) -> usize {
        self.slots.lock().iter().filter(|slot| slot.is_some()).count()
    }

    /// Drop every connection, used once the workers stopped
    pub fn disconnect_all(&self) {
        let count = self.slots.lock().len();
        for id in 0..count {
            self.disconnect(id);
        }
    }
}

impl Transport for TcpTransport {
    fn send(&self, session_id: SessionId, frame: &[u8]) -> Result<()> {
        let writer = {
            let slots = self.slots.lock();
            match slots.get(session_id) {
                Some(Some(slot)) if !slot.server_closed => Arc::clone(&slot.writer),
                _ => return Err(SkirmishError::SessionClosed(session_id)),
            }
        };

        let mut writer = writer.lock();
        let result = writer.write_all(frame).and_then(|_| writer.flush());
        if let Err(e) = result {
            // Wake the reader so the Close path runs
            let _ = writer.get_ref().shutdown(Shutdown::Both);
            return Err(SkirmishError::Io(e));
        }
        Ok(())
    }

    fn disconnect(&self, session_id: SessionId) {
        let mut slots = self.slots.lock();
        let Some(entry) = slots.get_mut(session_id) else {
            return;
        };
        let free = match entry {
            Some(slot) => {
                if !slot.server_closed {
                    slot.server_closed = true;
                    let _ = slot.stream.shutdown(Shutdown::Both);
                    tracing::debug!("{}: dropped connection {} ({})", self.role, session_id, slot.peer_addr);
                }
                slot.reader_done
            }
            None => false,
        };
        if free {
            *entry = None;
        }
    }
}
