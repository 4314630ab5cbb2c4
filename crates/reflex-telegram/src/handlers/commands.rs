use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{debug, info, warn};

use reflex_core::{
    admin::{is_admin, StatusReport},
    errors::Error,
    formatting::escape_html,
    messaging::types::{InlineButton, InlineKeyboard},
};

use crate::router::AppState;

use super::{menu, text::start_upload, Sender};

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

fn is_upload_deep_link(arg: &str) -> bool {
    matches!(arg, "upload" | "media")
}

fn intro_caption(has_profile: bool, support: &str) -> String {
    let title = "<b>Reflex — анонимный LGB🌈Q чат-тиндер</b>";
    if has_profile {
        format!(
            "{title}\n\n\
Нажмите «Запустить», чтобы открыть приложение.\n\
📸 Загрузить фото — управлять фотографиями (1-5)\n\
📞 Поддержка — вопросы → @{}",
            escape_html(support)
        )
    } else {
        format!("{title}\n\nНажмите «Запустить», пройдите короткую регистрацию и начинайте знакомиться!")
    }
}

fn reset_url(webapp_url: &str) -> String {
    format!("{}/reset", webapp_url.trim_end_matches('/'))
}

fn status_text(report: &StatusReport) -> String {
    let lines: Vec<String> = report
        .counts
        .iter()
        .map(|(status, n)| format!("• {}: {n}", escape_html(status)))
        .collect();
    format!(
        "📊 Статистика кампаний:\n{}\n\nВсего: {}",
        lines.join("\n"),
        report.total
    )
}

/// Admin API failures: a missing token reads as an authorization problem.
fn admin_error(e: &Error, what: &str) -> String {
    match e {
        Error::Config(_) => "❌ Ошибка авторизации".to_string(),
        other => format!("❌ {what}: {}", escape_html(&other.to_string())),
    }
}

pub async fn handle_command(
    sender: Sender,
    text: &str,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let (cmd, arg) = parse_command(text);

    match cmd.as_str() {
        "start" => {
            if is_upload_deep_link(&arg) {
                start_upload(sender, &state, false).await;
            } else {
                start(sender, &state).await;
            }
        }
        "reset" => {
            let kb = InlineKeyboard::single(InlineButton::web_app(
                "♻️ Сбросить данные",
                reset_url(&state.cfg.webapp_url),
            ));
            let _ = state
                .messenger
                .send_with_keyboard(
                    sender.chat,
                    "Нажмите кнопку ниже, чтобы перезапустить приложение и очистить локальные данные.",
                    kb,
                )
                .await;
        }
        "cancel" => {
            state.uploads.cancel(sender.user).await;
            menu::show_main_menu(state.messenger.as_ref(), sender.chat).await;
        }
        "testads" | "broadcastads" | "checkcampaigns" | "approveall" => {
            if !is_admin(Some(sender.user), &state.cfg.admin_ids) {
                let _ = state.messenger.send_html(sender.chat, menu::NOT_ADMIN).await;
                return Ok(());
            }
            admin_command(&cmd, sender, &state).await;
        }
        other => debug!(user = sender.user.0, command = other, "unknown command"),
    }
    Ok(())
}

async fn start(sender: Sender, state: &Arc<AppState>) {
    let has_profile = match state.profiles.profile(sender.user).await {
        Ok(p) => p.is_some(),
        Err(e) => {
            warn!(user = sender.user.0, error = %e, "profile lookup failed");
            false
        }
    };

    let launch = InlineKeyboard::single(InlineButton::web_app(
        "🚀 Запустить",
        state.cfg.webapp_url.clone(),
    ));
    let caption = intro_caption(has_profile, &state.cfg.support_username);
    if let Err(e) = state
        .messenger
        .send_photo(sender.chat, &state.cfg.intro_picture, Some(&caption), Some(launch))
        .await
    {
        warn!(user = sender.user.0, error = %e, "intro photo failed");
    }
    menu::show_main_menu(state.messenger.as_ref(), sender.chat).await;

    let state = state.clone();
    tokio::spawn(async move {
        tokio::time::sleep(state.cfg.welcome_ad_delay).await;
        if let Err(e) = state.ads.render_ad(sender.chat, sender.user).await {
            warn!(user = sender.user.0, error = %e, "welcome ad failed");
        }
    });
}

async fn admin_command(cmd: &str, sender: Sender, state: &AppState) {
    let reply = move |text: String| async move {
        let _ = state.messenger.send_html(sender.chat, &text).await;
    };

    match cmd {
        "testads" => match state.ads.render_ad(sender.chat, sender.user).await {
            Ok(true) => reply("✅ Тестовая реклама отправлена".into()).await,
            Ok(false) => reply("❌ Нет доступной рекламы".into()).await,
            Err(e) => {
                warn!(error = %e, "test ad failed");
                reply("❌ Нет доступной рекламы".into()).await
            }
        },
        "broadcastads" => {
            reply("🚀 Начинаю рассылку рекламы...".into()).await;
            match state.broadcaster.broadcast_all().await {
                Ok(report) => {
                    reply(format!(
                        "✅ Рассылка завершена. Отправлено: {} реклам",
                        report.sent
                    ))
                    .await
                }
                Err(e) => {
                    reply(format!(
                        "❌ Ошибка рассылки: {}",
                        escape_html(&e.to_string())
                    ))
                    .await
                }
            }
        }
        "checkcampaigns" => match state.campaigns.status_counts().await {
            Ok(report) if report.total == 0 => reply("❌ Нет кампаний в системе".into()).await,
            Ok(report) => reply(status_text(&report)).await,
            Err(e) => reply(admin_error(&e, "Ошибка получения кампаний")).await,
        },
        "approveall" => {
            let pending = match state.campaigns.pending_campaigns().await {
                Ok(p) => p,
                Err(e) => {
                    reply(admin_error(&e, "Ошибка одобрения")).await;
                    return;
                }
            };
            if pending.is_empty() {
                reply("❌ Нет кампаний на модерации".into()).await;
                return;
            }
            reply(format!("🔄 Одобряю {} кампаний...", pending.len())).await;
            match state.campaigns.approve(&pending).await {
                Ok(report) => {
                    info!(approved = report.approved, failed = report.failed, "approve-all done");
                    reply(format!("✅ Одобрено кампаний: {}", report.approved)).await
                }
                Err(e) => reply(admin_error(&e, "Ошибка одобрения")).await,
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn parses_command_with_bot_suffix_and_argument() {
        assert_eq!(
            parse_command("/Start@reflex_bot upload"),
            ("start".to_string(), "upload".to_string())
        );
        assert_eq!(parse_command("/reset"), ("reset".to_string(), String::new()));
    }

    #[test]
    fn only_upload_and_media_are_deep_links() {
        assert!(is_upload_deep_link("upload"));
        assert!(is_upload_deep_link("media"));
        assert!(!is_upload_deep_link(""));
        assert!(!is_upload_deep_link("ref123"));
    }

    #[test]
    fn reset_url_joins_without_double_slash() {
        assert_eq!(reset_url("https://app.test/"), "https://app.test/reset");
        assert_eq!(reset_url("https://app.test"), "https://app.test/reset");
    }

    #[test]
    fn status_text_lists_counts_and_total() {
        let report = StatusReport {
            counts: BTreeMap::from([("approved".to_string(), 1), ("pending".to_string(), 2)]),
            total: 3,
        };
        assert_eq!(
            status_text(&report),
            "📊 Статистика кампаний:\n• approved: 1\n• pending: 2\n\nВсего: 3"
        );
    }

    #[test]
    fn missing_admin_token_reads_as_auth_error() {
        let e = Error::Config("ADMIN_API_TOKEN is not set".into());
        assert_eq!(admin_error(&e, "x"), "❌ Ошибка авторизации");
    }

    #[test]
    fn intro_mentions_support_only_for_registered_users() {
        assert!(intro_caption(true, "help_me").contains("@help_me"));
        assert!(!intro_caption(false, "help_me").contains("@help_me"));
    }
}
