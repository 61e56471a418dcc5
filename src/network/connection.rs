//! Connection Reader
//!
//! Blocking reader of one client connection. Every decoded frame is queued
//! on the session; the worker pool does the rest. A client that outruns its
//! bounded queue is told so and its connection is closed.

use std::io::{BufReader, ErrorKind};
use std::net::TcpStream;

use crate::error::{DisconnectReason, Result, SkirmishError};
use crate::protocol::{read_frame, Inbound, Message, SystemNotice};
use crate::server_data::RoleEngine;
use crate::session::SessionId;

use super::TcpTransport;

/// Reading side of a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    session_id: SessionId,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    pub fn new(stream: TcpStream, session_id: SessionId) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(Self {
            reader: BufReader::new(stream),
            session_id,
            peer_addr,
        })
    }

    /// Read until the peer goes away, then deliver the final Close
    pub fn run(mut self, engine: &RoleEngine, transport: &TcpTransport) {
        tracing::debug!("{} connection {} established from {}", engine.role(), self.session_id, self.peer_addr);

        if let Err(e) = self.read_loop(engine) {
            tracing::debug!("{} connection {} stopped: {}", engine.role(), self.session_id, e);
        }

        // The Close must go through even if the queue overflowed
        if transport.reader_closing(self.session_id) {
            if let Err(e) = engine.deliver_close(self.session_id) {
                tracing::debug!("Close for session {} not delivered: {}", self.session_id, e);
            }
        }
        transport.reader_finished(self.session_id);
    }

    fn read_loop(&mut self, engine: &RoleEngine) -> Result<()> {
        loop {
            let (message_type, payload) = match read_frame(&mut self.reader) {
                Ok(frame) => frame,
                Err(SkirmishError::Io(ref e)) if is_disconnect(e.kind()) => {
                    tracing::debug!("Client {} disconnected", self.peer_addr);
                    return Ok(());
                }
                Err(e) if e.is_transport() => return Err(e),
                Err(e) => {
                    tracing::warn!("Malformed frame from {}: {}", self.peer_addr, e);
                    engine.send_notice(
                        self.session_id,
                        SystemNotice::Disconnected {
                            reason: DisconnectReason::WrongProtocol,
                        },
                    );
                    return Err(e);
                }
            };

            tracing::trace!("Received message {} from {}", message_type, self.peer_addr);
            let message = Message::new(self.session_id, message_type, payload);
            if let Err(e) = engine.deliver(self.session_id, Inbound::Frame(message)) {
                if let Some(reason) = e.disconnect_reason() {
                    tracing::warn!("Client {} dropped: {}", self.peer_addr, e);
                    engine.send_notice(self.session_id, SystemNotice::Disconnected { reason });
                }
                return Err(e);
            }
        }
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::WouldBlock
            | ErrorKind::TimedOut
    )
}
