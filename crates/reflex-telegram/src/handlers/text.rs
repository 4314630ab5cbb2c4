use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{debug, warn};

use reflex_core::{
    messaging::types::ReplyMarkup,
    upload::{FinishOutcome, StartOutcome},
};

use crate::router::AppState;

use super::{menu, Sender};

/// Reply-keyboard buttons arrive as plain text messages.
pub async fn handle_text(
    sender: Sender,
    text: &str,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    match text.trim() {
        menu::BTN_UPLOAD => show_photos(sender, &state).await,
        menu::BTN_UPLOAD_MORE => start_upload(sender, &state, true).await,
        menu::BTN_FINISH => finish_upload(sender, &state).await,
        menu::BTN_BACK => {
            state.uploads.cancel(sender.user).await;
            menu::show_main_menu(state.messenger.as_ref(), sender.chat).await;
        }
        menu::BTN_SUPPORT => {
            let _ = state
                .messenger
                .send_html(sender.chat, &menu::support_text(&state.cfg.support_username))
                .await;
        }
        _ => debug!(user = sender.user.0, "ignoring free text"),
    }
    Ok(())
}

/// Photo menu: current photos and how many more fit.
async fn show_photos(sender: Sender, state: &AppState) {
    state
        .ads
        .show_if_due(&state.cadence, sender.chat, sender.user)
        .await;

    let profile = match state.profiles.profile(sender.user).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            let _ = state.messenger.send_html(sender.chat, menu::NO_PROFILE).await;
            return;
        }
        Err(e) => {
            warn!(user = sender.user.0, error = %e, "profile lookup failed");
            let _ = state.messenger.send_html(sender.chat, menu::NO_PROFILE).await;
            return;
        }
    };

    let album_len = state.messenger.capabilities().max_album_len;
    let shown: Vec<String> = profile.images.iter().take(album_len).cloned().collect();
    let sent = match shown.as_slice() {
        [] => Ok(()),
        [one] => state
            .messenger
            .send_photo(sender.chat, one, None, None)
            .await
            .map(|_| ()),
        many => state.messenger.send_album(sender.chat, many).await,
    };
    if let Err(e) = sent {
        debug!(user = sender.user.0, error = %e, "could not show profile photos");
    }

    let _ = state
        .messenger
        .send_with_reply_markup(
            sender.chat,
            &menu::photo_summary(profile.images.len()),
            menu::photo_menu(),
        )
        .await;
}

/// Open an upload session. `hide_keyboard` removes the photo menu keyboard.
pub(crate) async fn start_upload(sender: Sender, state: &AppState, hide_keyboard: bool) {
    match state.uploads.start(sender.user).await {
        StartOutcome::AlreadyFull => {
            let _ = state
                .messenger
                .send_html(sender.chat, menu::ALREADY_FULL)
                .await;
        }
        StartOutcome::Started { capacity, .. } => {
            let prompt = menu::upload_prompt(capacity);
            let _ = if hide_keyboard {
                state
                    .messenger
                    .send_with_reply_markup(sender.chat, &prompt, ReplyMarkup::Remove)
                    .await
            } else {
                state.messenger.send_html(sender.chat, &prompt).await
            };
        }
    }
}

async fn finish_upload(sender: Sender, state: &AppState) {
    match state.uploads.finish(sender.user).await {
        FinishOutcome::Finished { .. } => {
            menu::show_main_menu(state.messenger.as_ref(), sender.chat).await;
            let _ = state
                .messenger
                .send_html(sender.chat, menu::UPLOAD_DONE)
                .await;
        }
        FinishOutcome::NothingUploaded | FinishOutcome::NoSession => {
            let _ = state
                .messenger
                .send_html(sender.chat, menu::UPLOAD_ONE_FIRST)
                .await;
        }
    }
}
