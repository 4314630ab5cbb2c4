//! Ports to the external collaborators of the bot core.
//!
//! `api::ApiClient` implements the HTTP-backed ports; the Telegram adapter
//! implements `MediaResolver`.

use async_trait::async_trait;

use crate::{
    api::types::{Ad, Campaign, Moderation, Profile, UserRecord},
    domain::UserId,
    Result,
};

/// Profile side of the Reflex API.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    /// `Ok(None)` when the user has not registered a profile yet.
    async fn profile(&self, user: UserId) -> Result<Option<Profile>>;

    /// Persist one image URL against the user's profile.
    async fn add_media(&self, user: UserId, image_url: &str) -> Result<()>;

    /// Every registered user (broadcast population).
    async fn all_users(&self) -> Result<Vec<UserRecord>>;
}

/// Advertising side of the Reflex API.
#[async_trait]
pub trait AdApi: Send + Sync {
    /// Next eligible ad for the user, `Ok(None)` when there is nothing to show.
    async fn serve_ad(&self, user: UserId) -> Result<Option<Ad>>;

    async fn ad_by_campaign(&self, campaign_id: &str) -> Result<Option<Ad>>;

    async fn track_impression(&self, campaign_id: &str, user: UserId) -> Result<()>;

    async fn track_click(&self, campaign_id: &str, user: UserId) -> Result<()>;

    async fn admin_campaigns(&self, token: &str) -> Result<Vec<Campaign>>;

    async fn moderate_campaign(
        &self,
        token: &str,
        campaign_id: &str,
        decision: &Moderation,
    ) -> Result<()>;
}

/// Turns a transport image handle into a URL the API can fetch.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve_image_url(&self, file_id: &str) -> Result<String>;
}
