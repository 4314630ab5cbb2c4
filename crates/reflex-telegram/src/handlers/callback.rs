use std::sync::Arc;

use teloxide::prelude::*;
use tracing::debug;

use reflex_core::{
    ads::{parse_click_data, ClickOutcome},
    domain::{ChatId, UserId},
    formatting::escape_html,
};

use crate::router::AppState;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let data = q.data.as_deref().unwrap_or_default();

    let Some(campaign_id) = parse_click_data(data) else {
        debug!(data, "ignoring callback");
        let _ = state.messenger.answer_callback_query(&q.id, None, false).await;
        return Ok(());
    };

    let user = UserId(q.from.id.0 as i64);
    match state.ads.handle_click(user, campaign_id).await {
        ClickOutcome::Redirect(url) => {
            let _ = state
                .messenger
                .answer_callback_query(&q.id, Some("Переходим по ссылке..."), false)
                .await;
            // Bots cannot open a browser; send the link instead.
            let chat = q
                .message
                .as_ref()
                .map(|m| ChatId(m.chat.id.0))
                .unwrap_or_else(|| ChatId::from(user));
            let _ = state
                .messenger
                .send_html(chat, &format!("🔗 Ссылка: {}", escape_html(&url)))
                .await;
        }
        ClickOutcome::Inactive => {
            let _ = state
                .messenger
                .answer_callback_query(&q.id, Some("Реклама больше не активна"), true)
                .await;
        }
    }
    Ok(())
}
