//! Ad rendering, impression tracking and click handling.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
    api::types::Ad,
    cadence::CadenceGate,
    domain::{ChatId, UserId},
    formatting::escape_html,
    messaging::{
        port::MessagingPort,
        types::{InlineButton, InlineKeyboard},
    },
    ports::AdApi,
    Result,
};

pub const CLICK_PREFIX: &str = "ad_click:";
const DEFAULT_BUTTON_TEXT: &str = "Перейти";

pub fn click_data(campaign_id: &str) -> String {
    format!("{CLICK_PREFIX}{campaign_id}")
}

/// Campaign id of an ad button callback, if `data` is one.
pub fn parse_click_data(data: &str) -> Option<&str> {
    data.strip_prefix(CLICK_PREFIX).filter(|id| !id.is_empty())
}

pub fn ad_caption(ad: &Ad) -> String {
    format!(
        "🎯 <b>{}</b>\n\n{}",
        escape_html(&ad.title),
        escape_html(&ad.description)
    )
}

fn ad_keyboard(ad: &Ad) -> InlineKeyboard {
    let label = ad
        .button_text
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(DEFAULT_BUTTON_TEXT);
    InlineKeyboard::single(InlineButton::callback(label, click_data(&ad.id)))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickOutcome {
    Redirect(String),
    Inactive,
}

pub struct AdRenderer {
    ads: Arc<dyn AdApi>,
    messenger: Arc<dyn MessagingPort>,
}

impl AdRenderer {
    pub fn new(ads: Arc<dyn AdApi>, messenger: Arc<dyn MessagingPort>) -> Self {
        Self { ads, messenger }
    }

    /// Serve and send one ad. `Ok(false)` when there is nothing to show.
    ///
    /// The impression is recorded once per attempted send, even if the send
    /// itself failed.
    pub async fn render_ad(&self, chat: ChatId, user: UserId) -> Result<bool> {
        let Some(ad) = self.ads.serve_ad(user).await? else {
            debug!(user = user.0, "no ad to serve");
            return Ok(false);
        };

        let caption = ad_caption(&ad);
        let keyboard = ad_keyboard(&ad);
        let sent = match ad.image_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => self
                .messenger
                .send_photo(chat, url, Some(&caption), Some(keyboard))
                .await
                .map(|_| ()),
            None => self
                .messenger
                .send_with_keyboard(chat, &caption, keyboard)
                .await
                .map(|_| ()),
        };

        if let Err(e) = self.ads.track_impression(&ad.id, user).await {
            warn!(campaign = %ad.id, user = user.0, error = %e, "impression tracking failed");
        }

        sent.map(|()| true)
    }

    /// Count the action and render an ad if it is due. Failures are logged only.
    pub async fn show_if_due(&self, gate: &CadenceGate, chat: ChatId, user: UserId) {
        if !gate.should_show_ad(user).await {
            return;
        }
        if let Err(e) = self.render_ad(chat, user).await {
            warn!(user = user.0, error = %e, "cadence ad failed");
        }
    }

    /// Like [`Self::show_if_due`], but a due ad is rendered on a spawned task.
    pub async fn spawn_if_due(
        self: &Arc<Self>,
        gate: &CadenceGate,
        chat: ChatId,
        user: UserId,
    ) -> Option<JoinHandle<()>> {
        if !gate.should_show_ad(user).await {
            return None;
        }
        let this = self.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = this.render_ad(chat, user).await {
                warn!(user = user.0, error = %e, "cadence ad failed");
            }
        }))
    }

    pub async fn handle_click(&self, user: UserId, campaign_id: &str) -> ClickOutcome {
        if let Err(e) = self.ads.track_click(campaign_id, user).await {
            warn!(campaign = %campaign_id, user = user.0, error = %e, "click tracking failed");
        }
        match self.ads.ad_by_campaign(campaign_id).await {
            Ok(Some(Ad {
                button_url: Some(url),
                ..
            })) if !url.is_empty() => ClickOutcome::Redirect(url),
            Ok(_) => ClickOutcome::Inactive,
            Err(e) => {
                warn!(campaign = %campaign_id, error = %e, "campaign ad lookup failed");
                ClickOutcome::Inactive
            }
        }
    }
}
