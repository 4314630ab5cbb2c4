//! Telegram update handlers.
//!
//! Each handler is a thin adapter that pulls ids out of the update, calls
//! into `reflex-core` and renders the outcome through the messenger port.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};
use tracing::debug;

use reflex_core::domain::{ChatId, UserId};

use crate::router::AppState;

mod callback;
mod commands;
pub(crate) mod menu;
pub mod photo;
mod text;

/// Ids of the sender and chat of a message.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Sender {
    pub user: UserId,
    pub chat: ChatId,
}

impl Sender {
    fn of(msg: &Message) -> Option<Self> {
        let user = msg.from()?;
        Some(Self {
            user: UserId(user.id.0 as i64),
            chat: ChatId(msg.chat.id.0),
        })
    }
}

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    callback::handle_callback(q, state).await
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(sender) = Sender::of(&msg) else {
        return Ok(());
    };

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::handle_command(sender, text, state).await;
        }
        return text::handle_text(sender, text, state).await;
    }

    if msg.photo().is_some() {
        return photo::handle_photo(sender, &msg, state).await;
    }

    debug!(user = sender.user.0, "ignoring unsupported message");
    Ok(())
}
