use std::{sync::Arc, time::Duration};

use teloxide::prelude::*;
use tracing::warn;

use reflex_core::{
    domain::{ChatId, UserId},
    media_group::{BoxFuture, MediaGroupDebouncer},
    messaging::port::MessagingPort,
    upload::{BatchReport, ImageOutcome, UploadFlow, MAX_IMAGES},
};

use crate::router::AppState;

use super::{menu, Sender};

/// One photo waiting in the album buffer.
#[derive(Clone, Debug)]
pub struct PendingPhoto {
    pub chat: ChatId,
    pub user: UserId,
    pub file_id: String,
}

pub fn debouncer(
    window: Duration,
    uploads: Arc<UploadFlow>,
    messenger: Arc<dyn MessagingPort>,
) -> Arc<MediaGroupDebouncer<PendingPhoto>> {
    MediaGroupDebouncer::new(
        window,
        Arc::new(move |photos: Vec<PendingPhoto>| -> BoxFuture {
            let uploads = uploads.clone();
            let messenger = messenger.clone();
            Box::pin(async move {
                commit_batch(&uploads, messenger.as_ref(), photos).await;
            })
        }),
    )
}

pub(crate) async fn handle_photo(
    sender: Sender,
    msg: &Message,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let Some(file_id) = msg
        .photo()
        .and_then(|sizes| sizes.last())
        .map(|p| p.file.id.clone())
    else {
        return Ok(());
    };

    state
        .ads
        .spawn_if_due(&state.cadence, sender.chat, sender.user)
        .await;

    if !state.uploads.has_session(sender.user).await {
        let _ = state
            .messenger
            .send_html(sender.chat, menu::PRESS_UPLOAD_FIRST)
            .await;
        return Ok(());
    }

    let photo = PendingPhoto {
        chat: sender.chat,
        user: sender.user,
        file_id,
    };
    state
        .photos
        .on_image(msg.media_group_id().map(str::to_string), photo)
        .await;
    Ok(())
}

async fn commit_batch(
    uploads: &UploadFlow,
    messenger: &dyn MessagingPort,
    photos: Vec<PendingPhoto>,
) {
    let Some(first) = photos.first() else {
        return;
    };
    let (chat, user) = (first.chat, first.user);
    if photos.iter().any(|p| p.user != user) {
        warn!(user = user.0, "media group mixes senders; using the first one");
    }

    let file_ids = photos.into_iter().map(|p| p.file_id).collect();
    let report = uploads.submit_batch(user, file_ids).await;
    for notice in batch_notices(&report) {
        let _ = messenger.send_html(chat, &notice).await;
    }

    if !report.had_session() {
        return;
    }
    if report.finished {
        menu::show_main_menu(messenger, chat).await;
        let _ = messenger.send_html(chat, menu::UPLOAD_DONE).await;
    } else {
        let _ = messenger
            .send_with_reply_markup(chat, menu::READY_HINT, menu::finish_menu())
            .await;
    }
}

/// Notices for one processed batch, in sending order.
fn batch_notices(report: &BatchReport) -> Vec<String> {
    if !report.had_session() {
        return vec![menu::PRESS_UPLOAD_FIRST.to_string()];
    }

    let mut out = Vec::new();
    let failed = report
        .outcomes
        .iter()
        .filter(|o| **o == ImageOutcome::CommitFailed)
        .count();
    out.extend(std::iter::repeat(menu::UPLOAD_FAILED.to_string()).take(failed));
    if report.hit_limit() {
        out.push(menu::LIMIT_REACHED.to_string());
    }
    // Photos already on the profile count towards the limit.
    let total = MAX_IMAGES - report.capacity + report.count;
    out.push(menu::uploaded_count(total));
    out
}
