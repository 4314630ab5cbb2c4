use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use tracing::warn;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileResponse {
    #[serde(default)]
    pub exists: bool,
    pub profile: Option<Profile>,
}

impl ProfileResponse {
    pub(crate) fn into_profile(self) -> Option<Profile> {
        if self.exists {
            self.profile
        } else {
            None
        }
    }
}

/// A served advertisement. `id` is the campaign id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ad {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub image_url: Option<String>,
    pub button_text: Option<String>,
    pub button_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AdResponse {
    pub ad: Option<Ad>,
}

/// One entry of the broadcast population.
///
/// The API has sent `telegramId` both as a number and as a string, so the raw
/// value is kept and validated per item.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default)]
    pub telegram_id: serde_json::Value,
}

impl UserRecord {
    pub fn new(id: i64) -> Self {
        Self {
            telegram_id: serde_json::Value::from(id),
        }
    }

    pub fn telegram_id(&self) -> Option<i64> {
        match &self.telegram_id {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UsersResponse {
    #[serde(default)]
    pub users: Vec<UserRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Campaign {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default = "unknown_status")]
    pub status: String,
}

impl Campaign {
    pub fn is_pending(&self) -> bool {
        self.status == "pending"
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CampaignsResponse {
    #[serde(default, deserialize_with = "skip_malformed")]
    pub campaigns: Vec<Campaign>,
}

/// Body of a moderation call.
#[derive(Clone, Debug, Serialize)]
pub struct Moderation {
    pub action: String,
    pub comment: String,
}

impl Moderation {
    pub fn approve(comment: impl Into<String>) -> Self {
        Self {
            action: "approve".to_string(),
            comment: comment.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TrackRequest<'a> {
    pub campaign_id: &'a str,
    pub user_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddMediaRequest<'a> {
    pub telegram_id: String,
    pub image_url: &'a str,
}

fn unknown_status() -> String {
    "unknown".to_string()
}

/// Decode a list item by item, dropping entries that do not parse.
fn skip_malformed<'de, D, T>(de: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Vec::<serde_json::Value>::deserialize(de)?;
    Ok(raw
        .into_iter()
        .filter_map(|v| match serde_json::from_value(v) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(error = %e, "skipping malformed list entry");
                None
            }
        })
        .collect())
}

fn string_or_number<'de, D>(de: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(de)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}
