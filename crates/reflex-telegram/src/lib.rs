//! Telegram adapter (teloxide).
//!
//! This crate implements the `reflex-core` MessagingPort and MediaResolver
//! over the Telegram Bot API, and hosts the update handlers.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{
        InlineKeyboardButton, InlineKeyboardMarkup, InputFile, InputMedia, InputMediaPhoto,
        KeyboardButton, KeyboardMarkup, KeyboardRemove, ParseMode, WebAppInfo,
    },
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use reflex_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ButtonAction, InlineKeyboard, MessagingCapabilities, ReplyMarkup},
    },
    ports::MediaResolver,
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn msg_ref(chat_id: ChatId, msg: &Message) -> MessageRef {
        MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        }
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    fn parse_url(url: &str) -> Result<reqwest::Url> {
        reqwest::Url::parse(url).map_err(|e| Error::External(format!("invalid url {url}: {e}")))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

fn inline_markup(keyboard: InlineKeyboard) -> Result<InlineKeyboardMarkup> {
    let mut rows = Vec::with_capacity(keyboard.buttons.len());
    for b in keyboard.buttons {
        let button = match b.action {
            ButtonAction::Callback(data) => InlineKeyboardButton::callback(b.label, data),
            ButtonAction::WebApp(url) => InlineKeyboardButton::web_app(
                b.label,
                WebAppInfo {
                    url: TelegramMessenger::parse_url(&url)?,
                },
            ),
        };
        rows.push(vec![button]);
    }
    Ok(InlineKeyboardMarkup::new(rows))
}

fn reply_markup(markup: ReplyMarkup) -> teloxide::types::ReplyMarkup {
    match markup {
        ReplyMarkup::Keyboard { rows } => {
            let rows = rows
                .into_iter()
                .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>());
            teloxide::types::ReplyMarkup::Keyboard(KeyboardMarkup::new(rows).resize_keyboard(true))
        }
        ReplyMarkup::Remove => teloxide::types::ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_album_len: 10,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn send_with_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let markup = inline_markup(keyboard)?;
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .reply_markup(markup.clone())
            })
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn send_with_reply_markup(
        &self,
        chat_id: ChatId,
        html: &str,
        markup: ReplyMarkup,
    ) -> Result<MessageRef> {
        let markup = reply_markup(markup);
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .reply_markup(markup.clone())
            })
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo_url: &str,
        caption_html: Option<&str>,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef> {
        let url = Self::parse_url(photo_url)?;
        let markup = keyboard.map(inline_markup).transpose()?;
        let msg = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_photo(Self::tg_chat(chat_id), InputFile::url(url.clone()))
                    .parse_mode(ParseMode::Html);
                if let Some(c) = caption_html {
                    req = req.caption(c.to_string());
                }
                if let Some(m) = &markup {
                    req = req.reply_markup(m.clone());
                }
                req
            })
            .await?;
        Ok(Self::msg_ref(chat_id, &msg))
    }

    async fn send_album(&self, chat_id: ChatId, photo_urls: &[String]) -> Result<()> {
        let mut media = Vec::with_capacity(photo_urls.len());
        for u in photo_urls {
            media.push(InputMedia::Photo(InputMediaPhoto::new(InputFile::url(
                Self::parse_url(u)?,
            ))));
        }
        self.with_retry(|| {
            self.bot
                .send_media_group(Self::tg_chat(chat_id), media.clone())
        })
        .await?;
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req.show_alert(show_alert)
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MediaResolver for TelegramMessenger {
    /// Direct download URL of the file. It embeds the bot token, which is how
    /// the profile API fetches uploaded photos.
    async fn resolve_image_url(&self, file_id: &str) -> Result<String> {
        let file = self
            .with_retry(|| self.bot.get_file(file_id.to_string()))
            .await?;
        Ok(format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot.token(),
            file.path
        ))
    }
}
