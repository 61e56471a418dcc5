//! Admin request handling
//!
//! Moderation requests reach into the user role: a banned or locked user
//! who is online is dropped under its own dispatch lock. Admin dispatch
//! locks are always taken before user ones, never the other way round.

use crate::account::{Account, AuthError};
use crate::error::{Result, SkirmishError};
use crate::protocol::admin::{AdminAnswer, AdminRequest, ModerationResult};
use crate::protocol::{Message, SystemNotice};
use crate::server_data::ServerData;
use crate::session::SessionId;

use super::user::close_user_session;

pub(super) fn handle(data: &ServerData, message: &Message) -> Result<()> {
    let request = AdminRequest::decode(message)?;
    let id = message.session_id;
    let admins = data.admins();
    let manager = admins.manager();

    let answer = match request {
        AdminRequest::Connect { version } => AdminAnswer::Connect {
            status: manager.connect(id, version, data.config().version)?,
        },
        AdminRequest::Login { login, password } => {
            let config = data.config();
            let outcome = manager.login(id, || {
                if login == config.admin_login && password == config.admin_password {
                    Ok(Account::new(login.as_str()))
                } else {
                    Err(AuthError::WrongPassword)
                }
            })?;
            AdminAnswer::Login {
                accepted: outcome.is_ok(),
            }
        }
        AdminRequest::Logout => {
            manager.logout(id)?;
            AdminAnswer::Logout
        }
        AdminRequest::ShutdownServer { seconds } => {
            manager.require_logged(id)?;
            let delay = u32::try_from(seconds).map_err(|_| {
                SkirmishError::wrong_protocol(format!("Negative shutdown delay {}", seconds))
            })?;
            data.shutdown().schedule(delay);
            tracing::info!("Admin session {} scheduled shutdown in {}s", id, delay);
            AdminAnswer::ShutdownServer { seconds }
        }
        AdminRequest::ConnectedUsersInfos => {
            manager.require_logged(id)?;
            AdminAnswer::ConnectedUsersInfos(data.users().manager().session_infos())
        }
        AdminRequest::ServerStats => {
            manager.require_logged(id)?;
            AdminAnswer::ServerStats(data.stats())
        }
        AdminRequest::BanUsers { days, logins } => {
            manager.require_logged(id)?;
            let days = u32::try_from(days)
                .map_err(|_| SkirmishError::wrong_protocol(format!("Negative ban duration {}", days)))?;
            AdminAnswer::BanUsers(moderate(logins, |login| {
                let applied = data.accounts().ban(login, days);
                if applied {
                    tracing::info!("Admin session {} banned {} for {} days", id, login, days);
                    drop_user(data, login, None);
                }
                applied
            }))
        }
        AdminRequest::UnbanUsers { logins } => {
            manager.require_logged(id)?;
            AdminAnswer::UnbanUsers(moderate(logins, |login| data.accounts().unban(login)))
        }
        AdminRequest::LockUsers { logins } => {
            manager.require_logged(id)?;
            AdminAnswer::LockUsers(moderate(logins, |login| {
                let applied = data.accounts().lock(login);
                if applied {
                    tracing::info!("Admin session {} locked {}", id, login);
                    drop_user(data, login, Some(SystemNotice::AccountMaintenance));
                }
                applied
            }))
        }
        AdminRequest::UnlockUsers { logins } => {
            manager.require_logged(id)?;
            AdminAnswer::UnlockUsers(moderate(logins, |login| data.accounts().unlock(login)))
        }
        AdminRequest::SendMessageToUsers {
            text,
            for_all_users,
            logins,
        } => {
            manager.require_logged(id)?;
            let delivered = send_to_users(data, &text, |login| {
                for_all_users || logins.iter().any(|target| target == login)
            });
            tracing::info!("Admin session {}: message delivered to {} users", id, delivered);
            AdminAnswer::SendMessageToUsers { delivered }
        }
    };

    admins.send(id, answer.message_type(), &answer.payload()?)
}

fn moderate(logins: Vec<String>, mut apply: impl FnMut(&str) -> bool) -> Vec<ModerationResult> {
    logins
        .into_iter()
        .map(|login| {
            let applied = apply(&login);
            ModerationResult { login, applied }
        })
        .collect()
}

/// Close the user session logged in as `login`, if it is online
fn drop_user(data: &ServerData, login: &str, notice: Option<SystemNotice>) {
    let users = data.users();
    let Some(id) = users.manager().find_logged(login) else {
        return;
    };
    let Ok(session) = users.manager().get_session(id) else {
        return;
    };

    let _dispatch = session.lock_dispatch();
    // The session may have logged out or closed since the lookup
    if session.lock_state().login_name() != Some(login) {
        return;
    }
    if let Some(notice) = notice {
        users.send_notice(id, notice);
    }
    if let Err(e) = close_user_session(data, id) {
        tracing::error!("user session {}: close failed: {}", id, e);
    }
    users.transport().disconnect(id);
    tracing::info!("User session {} ({}) dropped by an administrator", id, login);
}

/// Push an admin message to every logged user accepted by `target`
fn send_to_users(data: &ServerData, text: &str, target: impl Fn(&str) -> bool) -> u32 {
    let users = data.users();
    let notice = SystemNotice::AdminMessage { text: text.to_string() };
    let payload = notice.payload();

    let recipients: Vec<SessionId> = users
        .manager()
        .opened_sessions()
        .into_iter()
        .filter(|&id| {
            users.manager().get_session(id).map_or(false, |session| {
                session.lock_state().login_name().map_or(false, &target)
            })
        })
        .collect();

    let mut delivered = 0;
    for id in recipients {
        match users.send(id, notice.message_type(), &payload) {
            Ok(()) => delivered += 1,
            Err(e) => tracing::debug!("Admin message not delivered to session {}: {}", id, e),
        }
    }
    delivered
}
