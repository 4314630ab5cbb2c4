/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so handlers can
/// decide between a user-facing notice and a silent, logged skip.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
