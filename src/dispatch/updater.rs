//! Updater request handling

use crate::error::Result;
use crate::protocol::updater::{UpdaterAnswer, UpdaterRequest};
use crate::protocol::Message;
use crate::server_data::ServerData;

pub(super) fn handle(data: &ServerData, message: &Message) -> Result<()> {
    let UpdaterRequest::Connect { version } = UpdaterRequest::decode(message)?;
    let id = message.session_id;
    let updaters = data.updaters();

    let status = updaters.manager().connect(id, version, data.config().version)?;
    let answer = UpdaterAnswer::Connect { status };
    updaters.send(id, answer.message_type(), &answer.payload())
}
