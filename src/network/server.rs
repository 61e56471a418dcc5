//! TCP Server
//!
//! Binds the three role listeners and runs every thread of the server.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::account::AccountStore;
use crate::config::Config;
use crate::dispatch;
use crate::error::{Result, SkirmishError};
use crate::game::{relay_rules, RulesFactory};
use crate::protocol::{write_frame, SystemNotice};
use crate::server_data::{Role, ServerData, Transports};

use super::{Connection, TcpTransport, Transport};

/// Pause between two accept attempts on an idle listener
const ACCEPT_POLL: Duration = Duration::from_millis(20);

struct Listener {
    role: Role,
    listener: TcpListener,
    transport: Arc<TcpTransport>,
}

/// TCP server for Skirmish
pub struct Server {
    data: Arc<ServerData>,
    listeners: Vec<Listener>,
}

impl Server {
    /// Bind all listeners with the default relay rules
    pub fn bind(config: Config, accounts: Arc<dyn AccountStore>) -> Result<Self> {
        Self::bind_with_rules(config, accounts, relay_rules())
    }

    pub fn bind_with_rules(config: Config, accounts: Arc<dyn AccountStore>, rules: RulesFactory) -> Result<Self> {
        config.validate()?;

        let mut listeners = Vec::with_capacity(Role::ALL.len());
        for role in Role::ALL {
            let (addr, slots) = match role {
                Role::User => (&config.user_addr, config.max_user_sessions),
                Role::Admin => (&config.admin_addr, config.max_admin_sessions),
                Role::Updater => (&config.updater_addr, config.max_updater_sessions),
            };
            let listener = TcpListener::bind(addr.as_str())?;
            listener.set_nonblocking(true)?;
            tracing::info!("{} listener bound to {}", role, listener.local_addr()?);
            listeners.push(Listener {
                role,
                listener,
                transport: Arc::new(TcpTransport::new(role, slots)),
            });
        }

        let transport = |role: Role| -> Arc<dyn Transport> {
            let listener = &listeners[role_index(role)];
            Arc::clone(&listener.transport) as Arc<dyn Transport>
        };
        let transports = Transports {
            user: transport(Role::User),
            admin: transport(Role::Admin),
            updater: transport(Role::Updater),
        };

        let data = Arc::new(ServerData::new(config, accounts, transports, rules)?);
        Ok(Self { data, listeners })
    }

    /// Address a role listener is actually bound to
    pub fn local_addr(&self, role: Role) -> Result<SocketAddr> {
        Ok(self.listeners[role_index(role)].listener.local_addr()?)
    }

    /// Shared state, also the handle used to stop the server
    pub fn data(&self) -> Arc<ServerData> {
        Arc::clone(&self.data)
    }

    /// Run until the server is killed (blocking)
    pub fn run(self) -> Result<()> {
        let data = self.data;
        let config = data.config().clone();
        let mut threads: Vec<JoinHandle<()>> = Vec::new();
        let transports: Vec<Arc<TcpTransport>> =
            self.listeners.iter().map(|l| Arc::clone(&l.transport)).collect();

        // Step 1: Workers
        for role in Role::ALL {
            let count = match role {
                Role::User => config.user_worker_threads,
                Role::Admin => config.admin_worker_threads,
                Role::Updater => config.updater_worker_threads,
            };
            for n in 0..count {
                let data = Arc::clone(&data);
                threads.push(spawn(format!("{}-worker-{}", role, n), move || worker_loop(&data, role))?);
            }
        }

        // Step 2: Matchmaker
        {
            let data = Arc::clone(&data);
            threads.push(spawn("matchmaker".to_string(), move || matchmaker_loop(&data))?);
        }

        // Step 3: Acceptors
        for listener in self.listeners {
            let data = Arc::clone(&data);
            let name = format!("{}-acceptor", listener.role);
            threads.push(spawn(name, move || accept_loop(&data, listener))?);
        }

        tracing::info!("Server running");

        // Step 4: Supervise the shutdown countdown
        let poll = Duration::from_millis(config.shutdown_poll_ms);
        while !data.shutdown().poll() {
            thread::sleep(poll);
        }

        data.quick_match().wake();
        for handle in threads {
            if handle.join().is_err() {
                tracing::error!("A server thread panicked");
            }
        }
        for transport in &transports {
            transport.disconnect_all();
        }

        tracing::info!("Server stopped");
        Ok(())
    }
}

fn role_index(role: Role) -> usize {
    match role {
        Role::User => 0,
        Role::Admin => 1,
        Role::Updater => 2,
    }
}

fn spawn(name: String, f: impl FnOnce() + Send + 'static) -> Result<JoinHandle<()>> {
    Ok(thread::Builder::new().name(name).spawn(f)?)
}

// =============================================================================
// Thread Loops
// =============================================================================

/// Serve a role until killed and drained
fn worker_loop(data: &ServerData, role: Role) {
    let engine = data.engine(role);
    let poll = Duration::from_millis(data.config().shutdown_poll_ms);
    loop {
        match engine.next_ready(poll) {
            Some(id) => dispatch::process_one(data, role, id),
            None if data.shutdown().is_being_killed() => break,
            None => {}
        }
    }
    tracing::debug!("{} worker stopped", role);
}

fn matchmaker_loop(data: &ServerData) {
    let tick = Duration::from_millis(data.config().pairing_tick_ms);
    while !data.shutdown().is_being_killed() {
        data.quick_match().wait_for_work(tick);
        if data.shutdown().is_being_killed() {
            break;
        }
        data.run_pairing_pass();
    }
    tracing::debug!("Matchmaker stopped");
}

fn accept_loop(data: &Arc<ServerData>, listener: Listener) {
    while !data.shutdown().is_being_killed() {
        match listener.listener.accept() {
            Ok((stream, addr)) => {
                if let Err(e) = accept(data, &listener, stream) {
                    tracing::warn!("{}: could not accept {}: {}", listener.role, addr, e);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                tracing::warn!("{}: accept failed: {}", listener.role, e);
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
    tracing::debug!("{} acceptor stopped", listener.role);
}

fn accept(data: &Arc<ServerData>, listener: &Listener, stream: TcpStream) -> Result<()> {
    let config = data.config();
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    if config.read_timeout_ms > 0 {
        stream.set_read_timeout(Some(Duration::from_millis(config.read_timeout_ms)))?;
    }
    if config.write_timeout_ms > 0 {
        stream.set_write_timeout(Some(Duration::from_millis(config.write_timeout_ms)))?;
    }

    let Some(id) = listener.transport.register(&stream)? else {
        let notice = SystemNotice::MaxConnectionReached;
        let mut writer = &stream;
        write_frame(&mut writer, notice.message_type(), &notice.payload())?;
        return Ok(());
    };

    let connection = Connection::new(stream, id)?;
    let engine = data.engine(listener.role);
    if let Err(e) = engine.connection_opened(id) {
        listener.transport.disconnect(id);
        listener.transport.reader_finished(id);
        return Err(e);
    }

    let role = listener.role;
    let reader_data = Arc::clone(data);
    let transport = Arc::clone(&listener.transport);
    let spawned = spawn(format!("{}-conn-{}", role, id), move || {
        connection.run(reader_data.engine(role), &transport)
    });
    if let Err(e) = spawned {
        // Nobody will read this connection, close it as its reader would
        if listener.transport.reader_closing(id) {
            if let Err(e) = engine.deliver_close(id) {
                tracing::debug!("Close for session {} not delivered: {}", id, e);
            }
        }
        listener.transport.reader_finished(id);
        return Err(SkirmishError::Transport(format!("reader thread for session {}: {}", id, e)));
    }
    Ok(())
}
