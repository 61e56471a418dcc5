//! User request handling

use std::sync::Arc;

use crate::error::{Result, SkirmishError};
use crate::game::{Match, MatchProgress};
use crate::protocol::user::{
    CancelQuickMatchAnswer, GameCommand, LoadingProgress, LoginStatus, UserAnswer, UserRequest,
};
use crate::protocol::Message;
use crate::server_data::ServerData;
use crate::session::{QuickMatchStatus, Session, SessionId};

pub(super) fn handle(data: &ServerData, message: &Message) -> Result<()> {
    let request = UserRequest::decode(message)?;
    let id = message.session_id;
    let users = data.users();
    let manager = users.manager();
    let session = manager.get_session(id)?;

    let answer = match request {
        UserRequest::Connect { version } => {
            let status = manager.connect(id, version, data.config().version)?;
            Some(UserAnswer::Connect {
                status,
                seconds_before_shutdown: data.shutdown().seconds_before_shutdown(),
            })
        }
        UserRequest::Login { login, password } => {
            let accounts = data.accounts();
            let answer = match manager.login(id, || accounts.authenticate(&login, &password))? {
                Ok(account) => UserAnswer::Login {
                    status: LoginStatus::Ok,
                    login: Some(account.login),
                },
                Err(refused) => UserAnswer::Login {
                    status: refused.login_status(),
                    login: None,
                },
            };
            Some(answer)
        }
        UserRequest::Logout => {
            manager.require_logged(id)?;
            leave_quick_match(data, session);
            let account = manager.logout(id)?;
            data.accounts().logout(&account);
            Some(UserAnswer::Logout)
        }
        UserRequest::QuickMatch => {
            manager.require_logged(id)?;
            Some(UserAnswer::QuickMatch(data.quick_match().request(session)?))
        }
        UserRequest::CancelQuickMatch => {
            manager.require_logged(id)?;
            cancel_quick_match(data, session)?;
            Some(UserAnswer::CancelQuickMatch(CancelQuickMatchAnswer::QuickMatchCancelled))
        }
        UserRequest::LaunchMatch { accept } => {
            manager.require_logged(id)?;
            launch_match(data, session, accept)?;
            None
        }
        UserRequest::Loading { progress } => {
            manager.require_logged(id)?;
            loading(data, session, progress)?;
            None
        }
        UserRequest::GameCommand(command) => {
            manager.require_logged(id)?;
            game_command(data, session, &command)?;
            None
        }
        UserRequest::ChatMessage { text } => {
            manager.require_logged(id)?;
            require_match(data, session, "CHAT_MESSAGE")?.on_receive_chat(id, &text)?;
            None
        }
    };

    if let Some(answer) = answer {
        users.send(id, answer.message_type(), &answer.payload())?;
    }
    Ok(())
}

fn cancel_quick_match(data: &ServerData, session: &Session) -> Result<()> {
    if let Err(e) = data.quick_match().cancel(session) {
        if session.snapshot().match_id().is_some() {
            let answer = UserAnswer::CancelQuickMatch(CancelQuickMatchAnswer::AlreadyInMatch);
            if let Err(send_err) = data.users().send(session.id(), answer.message_type(), &answer.payload()) {
                tracing::debug!("Could not send {:?} to session {}: {}", answer, session.id(), send_err);
            }
        }
        return Err(e);
    }
    Ok(())
}

/// Match the session is attached to, if it is still live
fn attached_match(data: &ServerData, session: &Session) -> Option<Arc<Match>> {
    session.snapshot().match_id().and_then(|id| data.games().get(id))
}

fn settle(data: &ServerData, game: &Match, progress: MatchProgress) {
    if progress == MatchProgress::Released && data.games().release(game.id()) {
        tracing::debug!("Match {} removed from pool ({} live)", game.id(), data.games().len());
    }
}

fn launch_match(data: &ServerData, session: &Session, accept: bool) -> Result<()> {
    let Some(game) = attached_match(data, session) else {
        tracing::debug!("Session {}: launch answer without a match, ignored", session.id());
        return Ok(());
    };
    let status = session.quick_match_status();
    if status != QuickMatchStatus::OpponentFound {
        return Err(SkirmishError::wrong_protocol(format!(
            "Session {}: LAUNCH_MATCH while {}",
            session.id(),
            status
        )));
    }

    let progress = if accept {
        game.on_receive_launch(session.id())?
    } else {
        game.on_receive_cancel(session.id())?
    };
    settle(data, &game, progress);
    Ok(())
}

fn loading(data: &ServerData, session: &Session, progress: LoadingProgress) -> Result<()> {
    let game = require_match(data, session, "LOADING")?;
    let status = session.quick_match_status();
    if status != QuickMatchStatus::Loading {
        return Err(SkirmishError::wrong_protocol(format!(
            "Session {}: LOADING while {}",
            session.id(),
            status
        )));
    }
    let progress = game.on_receive_loading(session.id(), progress)?;
    settle(data, &game, progress);
    Ok(())
}

fn game_command(data: &ServerData, session: &Session, command: &GameCommand) -> Result<()> {
    let game = require_match(data, session, "GAME_COMMAND")?;
    let progress = game.on_receive_command(session.id(), command)?;
    settle(data, &game, progress);
    Ok(())
}

/// In-match requests without a match are dropped, not fatal
fn require_match(data: &ServerData, session: &Session, request: &str) -> Result<Arc<Match>> {
    attached_match(data, session).ok_or_else(|| {
        SkirmishError::UnexpectedMessage(format!(
            "Session {}: {} without a match",
            session.id(),
            request
        ))
    })
}

/// Leave the waiting list and abandon the attached match, if any
fn leave_quick_match(data: &ServerData, session: &Session) {
    if data.quick_match().remove(session) {
        tracing::debug!("Session {} left the waiting list", session.id());
    }
    if let Some(game) = attached_match(data, session) {
        let progress = game.on_player_disconnected(session.id());
        settle(data, &game, progress);
    }
}

/// Remove a user session from quick match and its match, then close it
pub(super) fn close_user_session(data: &ServerData, id: SessionId) -> Result<()> {
    let manager = data.users().manager();
    let session = manager.get_session(id)?;

    leave_quick_match(data, session);

    // Close and hand the account back
    if let Some(account) = manager.close_session(id)? {
        data.accounts().logout(&account);
    }
    Ok(())
}
