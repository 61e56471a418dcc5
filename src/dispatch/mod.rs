//! Dispatch Module
//!
//! One worker step: pop the next inbound event of a session under its
//! dispatch lock, route it to the role handler and turn failures into
//! connection teardowns.
//!
//! ## Failure Handling
//! - `UnexpectedMessage`: logged and dropped, the connection stays
//! - transport errors: session closed quietly
//! - everything else: best-effort notice, session closed, connection dropped

mod admin;
mod updater;
mod user;

use crate::error::{DisconnectReason, Resource, SkirmishError};
use crate::protocol::{Inbound, Message, SystemNotice};
use crate::server_data::{Role, ServerData};
use crate::session::{SessionId, SessionStatus};

/// Handle the next pending event of session `id`, if any
pub fn process_one(data: &ServerData, role: Role, id: SessionId) {
    let engine = data.engine(role);
    let session = match engine.manager().get_session(id) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("{} notification for unknown session: {}", role, e);
            return;
        }
    };

    let _dispatch = session.lock_dispatch();
    let Some(inbound) = session.try_pop_message() else {
        return;
    };

    let result = match inbound {
        Inbound::Open => {
            if data.shutdown().is_being_killed() {
                Err(SkirmishError::ResourceExhausted(Resource::ServerShuttingDown))
            } else {
                engine.manager().open_session(id)
            }
        }
        Inbound::Close => {
            tracing::debug!("{} session {}: peer closed", role, id);
            close_session(data, role, id);
            engine.transport().disconnect(id);
            return;
        }
        Inbound::Frame(message) => {
            if data.shutdown().is_being_killed() {
                tracing::debug!("{} session {}: request {} refused, shutting down", role, id, message.message_type);
                engine.send_notice(id, SystemNotice::ServerShuttingDown);
                return;
            }
            if session.status() == SessionStatus::Closed {
                Err(SkirmishError::violation(
                    DisconnectReason::SessionNotOpened,
                    format!("message {} before the session was opened", message.message_type),
                ))
            } else {
                route(data, role, &message)
            }
        }
    };

    if let Err(e) = result {
        handle_failure(data, role, id, e);
    }
}

fn route(data: &ServerData, role: Role, message: &Message) -> crate::Result<()> {
    tracing::trace!("{} session {}: message {}", role, message.session_id, message.message_type);
    match role {
        Role::User => user::handle(data, message),
        Role::Admin => admin::handle(data, message),
        Role::Updater => updater::handle(data, message),
    }
}

fn handle_failure(data: &ServerData, role: Role, id: SessionId, err: SkirmishError) {
    let engine = data.engine(role);

    if !err.is_disconnect() {
        tracing::warn!("{} session {}: {}", role, id, err);
        return;
    }

    if err.is_transport() {
        tracing::debug!("{} session {}: {}", role, id, err);
    } else {
        tracing::warn!("{} session {} dropped: {}", role, id, err);
        let notice = match err {
            SkirmishError::ResourceExhausted(Resource::SessionSlots) => Some(SystemNotice::MaxConnectionReached),
            SkirmishError::ResourceExhausted(Resource::ServerShuttingDown) => Some(SystemNotice::ServerShuttingDown),
            ref other => other.disconnect_reason().map(|reason| SystemNotice::Disconnected { reason }),
        };
        if let Some(notice) = notice {
            engine.send_notice(id, notice);
        }
    }

    close_session(data, role, id);
    engine.transport().disconnect(id);
}

/// Close a session of any role, releasing what it holds
pub(crate) fn close_session(data: &ServerData, role: Role, id: SessionId) {
    let result = match role {
        Role::User => user::close_user_session(data, id),
        Role::Admin | Role::Updater => data.engine(role).manager().close_session(id).map(|_| ()),
    };
    if let Err(e) = result {
        tracing::error!("{} session {}: close failed: {}", role, id, e);
    }
}
