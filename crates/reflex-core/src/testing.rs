//! In-memory fakes of the ports, shared by unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    api::types::{Ad, Campaign, Moderation, Profile, UserRecord},
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities, ReplyMarkup},
    },
    ports::{AdApi, MediaResolver, ProfileApi},
    Result,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Sent {
    Html {
        chat: i64,
        text: String,
    },
    Keyboard {
        chat: i64,
        text: String,
        keyboard: InlineKeyboard,
    },
    Reply {
        chat: i64,
        text: String,
        markup: ReplyMarkup,
    },
    Photo {
        chat: i64,
        url: String,
        caption: Option<String>,
        keyboard: Option<InlineKeyboard>,
    },
    Album {
        chat: i64,
        urls: Vec<String>,
    },
    Callback {
        id: String,
        text: Option<String>,
        alert: bool,
    },
}

impl Sent {
    pub fn text(&self) -> Option<&str> {
        match self {
            Sent::Html { text, .. } | Sent::Keyboard { text, .. } | Sent::Reply { text, .. } => {
                Some(text)
            }
            Sent::Photo { caption, .. } => caption.as_deref(),
            Sent::Callback { text, .. } => text.as_deref(),
            Sent::Album { .. } => None,
        }
    }
}

#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    sent: Mutex<Vec<Sent>>,
    failing_chats: Mutex<HashSet<i64>>,
}

impl FakeMessenger {
    pub fn fail_chat(&self, chat: i64) {
        self.failing_chats.lock().unwrap().insert(chat);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|s| s.text().map(str::to_string))
            .collect()
    }

    fn record(&self, chat: i64, s: Sent) -> Result<MessageRef> {
        if self.failing_chats.lock().unwrap().contains(&chat) {
            return Err(Error::External("telegram error: chat not found".into()));
        }
        self.sent.lock().unwrap().push(s);
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        Ok(MessageRef {
            chat_id: ChatId(chat),
            message_id: MessageId(*guard),
        })
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_album_len: 10,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.record(
            chat_id.0,
            Sent::Html {
                chat: chat_id.0,
                text: html.to_string(),
            },
        )
    }

    async fn send_with_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.record(
            chat_id.0,
            Sent::Keyboard {
                chat: chat_id.0,
                text: html.to_string(),
                keyboard,
            },
        )
    }

    async fn send_with_reply_markup(
        &self,
        chat_id: ChatId,
        html: &str,
        markup: ReplyMarkup,
    ) -> Result<MessageRef> {
        self.record(
            chat_id.0,
            Sent::Reply {
                chat: chat_id.0,
                text: html.to_string(),
                markup,
            },
        )
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo_url: &str,
        caption_html: Option<&str>,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef> {
        self.record(
            chat_id.0,
            Sent::Photo {
                chat: chat_id.0,
                url: photo_url.to_string(),
                caption: caption_html.map(str::to_string),
                keyboard,
            },
        )
    }

    async fn send_album(&self, chat_id: ChatId, photo_urls: &[String]) -> Result<()> {
        self.record(
            chat_id.0,
            Sent::Album {
                chat: chat_id.0,
                urls: photo_urls.to_vec(),
            },
        )
        .map(|_| ())
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Callback {
            id: callback_id.to_string(),
            text: text.map(str::to_string),
            alert: show_alert,
        });
        Ok(())
    }
}

pub fn ad(id: &str) -> Ad {
    Ad {
        id: id.to_string(),
        title: format!("Title {id}"),
        description: format!("Description {id}"),
        image_url: None,
        button_text: None,
        button_url: Some(format!("https://ads.test/{id}")),
    }
}

#[derive(Default)]
pub struct FakeAdApi {
    pub default_ad: Mutex<Option<Ad>>,
    pub campaign_ads: Mutex<HashMap<String, Ad>>,
    pub failing_serve: Mutex<HashSet<i64>>,
    pub serve_delay: Mutex<Option<Duration>>,
    pub failing_clicks: Mutex<bool>,
    pub campaigns: Mutex<Vec<Campaign>>,
    pub failing_moderation: Mutex<HashSet<String>>,
    pub impressions: Mutex<Vec<(String, i64)>>,
    pub clicks: Mutex<Vec<(String, i64)>>,
    pub moderated: Mutex<Vec<String>>,
    pub tokens_seen: Mutex<Vec<String>>,
}

impl FakeAdApi {
    pub fn with_ad(ad: Ad) -> Self {
        let api = Self::default();
        *api.default_ad.lock().unwrap() = Some(ad);
        api
    }

    pub fn impressions(&self) -> Vec<(String, i64)> {
        self.impressions.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> Vec<(String, i64)> {
        self.clicks.lock().unwrap().clone()
    }
}

#[async_trait]
impl AdApi for FakeAdApi {
    async fn serve_ad(&self, user: UserId) -> Result<Option<Ad>> {
        let delay = *self.serve_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_serve.lock().unwrap().contains(&user.0) {
            return Err(Error::Timeout("serve-ad".into()));
        }
        Ok(self.default_ad.lock().unwrap().clone())
    }

    async fn ad_by_campaign(&self, campaign_id: &str) -> Result<Option<Ad>> {
        Ok(self.campaign_ads.lock().unwrap().get(campaign_id).cloned())
    }

    async fn track_impression(&self, campaign_id: &str, user: UserId) -> Result<()> {
        self.impressions
            .lock()
            .unwrap()
            .push((campaign_id.to_string(), user.0));
        Ok(())
    }

    async fn track_click(&self, campaign_id: &str, user: UserId) -> Result<()> {
        if *self.failing_clicks.lock().unwrap() {
            return Err(Error::Timeout("track-click".into()));
        }
        self.clicks
            .lock()
            .unwrap()
            .push((campaign_id.to_string(), user.0));
        Ok(())
    }

    async fn admin_campaigns(&self, token: &str) -> Result<Vec<Campaign>> {
        self.tokens_seen.lock().unwrap().push(token.to_string());
        Ok(self.campaigns.lock().unwrap().clone())
    }

    async fn moderate_campaign(
        &self,
        _token: &str,
        campaign_id: &str,
        decision: &Moderation,
    ) -> Result<()> {
        if self
            .failing_moderation
            .lock()
            .unwrap()
            .contains(campaign_id)
        {
            return Err(Error::Http {
                status: 500,
                body: "boom".into(),
            });
        }
        self.moderated
            .lock()
            .unwrap()
            .push(format!("{campaign_id}:{}", decision.action));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeProfileApi {
    pub profiles: Mutex<HashMap<i64, Profile>>,
    pub users: Mutex<Vec<UserRecord>>,
    pub failing_urls: Mutex<HashSet<String>>,
    pub uploaded: Mutex<Vec<(i64, String)>>,
}

impl FakeProfileApi {
    pub fn with_images(user: i64, count: usize) -> Self {
        let api = Self::default();
        let images = (0..count).map(|i| format!("https://old.test/{i}")).collect();
        api.profiles
            .lock()
            .unwrap()
            .insert(user, Profile { images });
        api
    }

    pub fn uploaded(&self) -> Vec<(i64, String)> {
        self.uploaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileApi for FakeProfileApi {
    async fn profile(&self, user: UserId) -> Result<Option<Profile>> {
        Ok(self.profiles.lock().unwrap().get(&user.0).cloned())
    }

    async fn add_media(&self, user: UserId, image_url: &str) -> Result<()> {
        if self.failing_urls.lock().unwrap().contains(image_url) {
            return Err(Error::Http {
                status: 500,
                body: String::new(),
            });
        }
        self.uploaded
            .lock()
            .unwrap()
            .push((user.0, image_url.to_string()));
        Ok(())
    }

    async fn all_users(&self) -> Result<Vec<UserRecord>> {
        Ok(self.users.lock().unwrap().clone())
    }
}

/// Resolves `file_id` to `https://files.test/{file_id}`.
#[derive(Default)]
pub struct FakeResolver;

pub fn file_url(file_id: &str) -> String {
    format!("https://files.test/{file_id}")
}

#[async_trait]
impl MediaResolver for FakeResolver {
    async fn resolve_image_url(&self, file_id: &str) -> Result<String> {
        if file_id.starts_with("broken") {
            return Err(Error::External("file not found".into()));
        }
        Ok(file_url(file_id))
    }
}
