//! Network Module
//!
//! TCP front end of the three roles.
//!
//! ## Architecture
//! - One non-blocking acceptor thread per role
//! - One blocking reader thread per connection
//! - Per-role worker pools fed through the role channel
//! - A matchmaker thread running pairing passes
//! - The calling thread supervises the shutdown countdown

mod connection;
mod server;
mod tcp;
mod transport;

pub use connection::Connection;
pub use server::Server;
pub use tcp::TcpTransport;
pub use transport::{send_frame, send_notice, Transport};
