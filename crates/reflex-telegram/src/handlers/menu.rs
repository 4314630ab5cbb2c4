//! Reply keyboards and the user-facing texts shared by several handlers.

use reflex_core::{
    domain::ChatId,
    messaging::{port::MessagingPort, types::ReplyMarkup},
    upload::MAX_IMAGES,
};

pub const BTN_UPLOAD: &str = "📸 Загрузить фото";
pub const BTN_UPLOAD_MORE: &str = "📸 Загрузить ещё фото";
pub const BTN_FINISH: &str = "✅ Завершить";
pub const BTN_BACK: &str = "🔙 Назад";
pub const BTN_SUPPORT: &str = "📞 Поддержка";

pub const NOT_ADMIN: &str = "Недостаточно прав.";
pub const PRESS_UPLOAD_FIRST: &str = "Сначала нажмите «📸 Загрузить фото».";
pub const LIMIT_REACHED: &str = "🚫 Достигнут лимит 5 фотографий.";
pub const UPLOAD_FAILED: &str = "❌ Не удалось загрузить фото, попробуйте ещё раз.";
pub const READY_HINT: &str = "Когда будете готовы — нажмите «Завершить».";
pub const UPLOAD_ONE_FIRST: &str = "Сначала загрузите хотя бы одну фотографию.";
pub const UPLOAD_DONE: &str = "🎉 Фото сохранены. Можете вернуться в приложение!";
pub const ALREADY_FULL: &str = "У вас уже 5 фото — сначала удалите лишние в приложении.";
pub const NO_PROFILE: &str =
    "Сначала создайте анкету в приложении, затем вернитесь, чтобы загрузить фото.";

pub fn main_menu() -> ReplyMarkup {
    ReplyMarkup::column(&[BTN_UPLOAD, BTN_SUPPORT])
}

pub fn photo_menu() -> ReplyMarkup {
    ReplyMarkup::column(&[BTN_UPLOAD_MORE, BTN_BACK])
}

pub fn finish_menu() -> ReplyMarkup {
    ReplyMarkup::column(&[BTN_FINISH])
}

pub fn upload_prompt(capacity: usize) -> String {
    format!("📸 Отправьте до {capacity} изображений. После — нажмите ✅ Завершить.")
}

pub fn uploaded_count(total: usize) -> String {
    format!("✅ Загружено {total}/{MAX_IMAGES} фото")
}

pub fn photo_summary(existing: usize) -> String {
    let remaining = MAX_IMAGES.saturating_sub(existing);
    format!("У вас загружено {existing}/{MAX_IMAGES} фото. Вы можете загрузить ещё {remaining}.")
}

pub fn support_text(username: &str) -> String {
    format!("📞 Поддержка — вопросы → @{username}")
}

pub async fn show_main_menu(messenger: &dyn MessagingPort, chat: ChatId) {
    let _ = messenger
        .send_with_reply_markup(chat, "Меню", main_menu())
        .await;
}
