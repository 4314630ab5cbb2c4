use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::{
    domain::UserId,
    errors::Error,
    ports::{AdApi, ProfileApi},
    Result,
};

use super::types::*;

/// Fire-and-forget tracking calls.
const TRACK_TIMEOUT: Duration = Duration::from_secs(3);
/// Interactive profile/ad fetches and uploads.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);
/// Admin campaign listing and moderation.
const ADMIN_TIMEOUT: Duration = Duration::from_secs(10);
/// Full user population for broadcasts.
const BULK_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Reflex REST API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    base: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("reflex-bot/0.1")
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            base: base.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        op: &str,
        req: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> Result<T> {
        let resp = req
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest(op, e))?;
        let resp = check_status(resp).await?;
        let body = resp.text().await.map_err(|e| map_reqwest(op, e))?;
        decode(op, &body)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        op: &str,
        url: String,
        body: &B,
        bearer: Option<&str>,
        timeout: Duration,
    ) -> Result<()> {
        let mut req = self.http.post(url).json(body).timeout(timeout);
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(|e| map_reqwest(op, e))?;
        check_status(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileApi for ApiClient {
    async fn profile(&self, user: UserId) -> Result<Option<Profile>> {
        let url = self.url(&format!("/profile/by-telegram/{}", user.0));
        let resp: ProfileResponse = self
            .get_json("profile", self.http.get(url), FETCH_TIMEOUT)
            .await?;
        Ok(resp.into_profile())
    }

    async fn add_media(&self, user: UserId, image_url: &str) -> Result<()> {
        let body = AddMediaRequest {
            telegram_id: user.0.to_string(),
            image_url,
        };
        self.post_json(
            "add-media",
            self.url("/profile/add-media"),
            &body,
            None,
            FETCH_TIMEOUT,
        )
        .await
    }

    async fn all_users(&self) -> Result<Vec<UserRecord>> {
        let resp: UsersResponse = self
            .get_json(
                "all-users",
                self.http.get(self.url("/stats/all-users")),
                BULK_TIMEOUT,
            )
            .await?;
        Ok(resp.users)
    }
}

#[async_trait]
impl AdApi for ApiClient {
    async fn serve_ad(&self, user: UserId) -> Result<Option<Ad>> {
        let req = self
            .http
            .get(self.url("/advertising/serve"))
            .query(&[("userId", user.0)]);
        let resp: AdResponse = self.get_json("serve-ad", req, FETCH_TIMEOUT).await?;
        debug!(user = user.0, found = resp.ad.is_some(), "served ad");
        Ok(resp.ad)
    }

    async fn ad_by_campaign(&self, campaign_id: &str) -> Result<Option<Ad>> {
        let url = self.url(&format!("/advertising/campaign/{campaign_id}/ad"));
        let resp: AdResponse = self
            .get_json("campaign-ad", self.http.get(url), FETCH_TIMEOUT)
            .await?;
        Ok(resp.ad)
    }

    async fn track_impression(&self, campaign_id: &str, user: UserId) -> Result<()> {
        let body = TrackRequest {
            campaign_id,
            user_id: user.0,
        };
        self.post_json(
            "track-impression",
            self.url("/advertising/track/impression"),
            &body,
            None,
            TRACK_TIMEOUT,
        )
        .await
    }

    async fn track_click(&self, campaign_id: &str, user: UserId) -> Result<()> {
        let body = TrackRequest {
            campaign_id,
            user_id: user.0,
        };
        self.post_json(
            "track-click",
            self.url("/advertising/track/click"),
            &body,
            None,
            TRACK_TIMEOUT,
        )
        .await
    }

    async fn admin_campaigns(&self, token: &str) -> Result<Vec<Campaign>> {
        let req = self
            .http
            .get(self.url("/advertising/admin/campaigns"))
            .bearer_auth(token);
        let resp: CampaignsResponse = self
            .get_json("admin-campaigns", req, ADMIN_TIMEOUT)
            .await?;
        Ok(resp.campaigns)
    }

    async fn moderate_campaign(
        &self,
        token: &str,
        campaign_id: &str,
        decision: &Moderation,
    ) -> Result<()> {
        let url = self.url(&format!(
            "/advertising/admin/campaigns/{campaign_id}/moderate"
        ));
        self.post_json("moderate", url, decision, Some(token), ADMIN_TIMEOUT)
            .await
    }
}

fn decode<T: DeserializeOwned>(op: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        debug!(op, error = %e, "undecodable response body");
        Error::Json(e)
    })
}

fn map_reqwest(op: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("{op}: {e}"))
    } else {
        Error::External(format!("{op} request error: {e}"))
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Http {
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_response_body_is_a_json_error() {
        let res: Result<UsersResponse> = decode("all-users", "<html>502</html>");
        assert!(matches!(res, Err(Error::Json(_))));

        let ok: UsersResponse = decode("all-users", r#"{"users":[{"telegramId":1}]}"#).unwrap();
        assert_eq!(ok.users.len(), 1);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let c = ApiClient::new("https://example.test/api/").unwrap();
        assert_eq!(
            c.url("/stats/all-users"),
            "https://example.test/api/stats/all-users"
        );
    }
}
