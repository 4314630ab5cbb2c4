use std::{env, fs, io, path::Path, time::Duration};

use chrono::NaiveTime;

use crate::{errors::Error, Result};

const DEFAULT_API_URL: &str = "https://spectrmod.ru/api";
const DEFAULT_WEBAPP_URL: &str = "https://reflex-site.kamish.pro/";
const DEFAULT_INTRO_PICTURE: &str =
    "https://s.iimg.su/s/18/3dr82mIVRK6ojKvPQH2OBcYEM4pStJ0zrTo2USQ6.png";
const DEFAULT_ADMIN_IDS: &[i64] = &[8072408248, 7001269338, 8186814795];

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    pub api_url: String,
    pub admin_ids: Vec<i64>,
    pub admin_api_token: Option<String>,

    // Presentation
    pub webapp_url: String,
    pub support_username: String,
    pub intro_picture: String,
    pub welcome_ad_delay: Duration,

    // Upload flow
    pub media_group_timeout: Duration,
    pub session_idle_ttl: Duration,

    // Ads
    pub ad_cadence: u64,

    // Broadcast
    pub broadcast_time: NaiveTime,
    pub broadcast_throttle: Duration,
    pub broadcast_concurrency: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"))?;

        let bot_token = env_str("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let api_url = env_str("API_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let admin_ids = match env_str("ADMIN_IDS").and_then(non_empty) {
            Some(raw) => parse_csv_i64(Some(raw)),
            None => DEFAULT_ADMIN_IDS.to_vec(),
        };
        let admin_api_token = env_str("ADMIN_API_TOKEN").and_then(non_empty);

        let webapp_url = env_str("WEBAPP_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_WEBAPP_URL.to_string());
        let support_username = env_str("SUPPORT_USERNAME")
            .and_then(non_empty)
            .unwrap_or_else(|| "spectrmod".to_string());
        let intro_picture = env_str("INTRO_PICTURE")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_INTRO_PICTURE.to_string());
        let welcome_ad_delay =
            Duration::from_millis(env_u64("WELCOME_AD_DELAY_MS").unwrap_or(2000));

        // Upload flow
        let media_group_timeout =
            Duration::from_millis(env_u64("MEDIA_GROUP_TIMEOUT_MS").unwrap_or(1200));
        let session_idle_ttl =
            Duration::from_secs(env_u64("SESSION_IDLE_TTL_SECS").unwrap_or(30 * 60));

        // Ads
        let ad_cadence = env_u64("AD_CADENCE").unwrap_or(5).max(1);

        // Broadcast
        let broadcast_time = match env_str("BROADCAST_TIME").and_then(non_empty) {
            Some(raw) => parse_time_of_day(&raw)?,
            None => NaiveTime::from_hms_opt(15, 0, 0)
                .ok_or_else(|| Error::Config("invalid default broadcast time".to_string()))?,
        };
        let broadcast_throttle =
            Duration::from_millis(env_u64("BROADCAST_THROTTLE_MS").unwrap_or(100));
        let broadcast_concurrency = env_usize("BROADCAST_CONCURRENCY").unwrap_or(1).max(1);

        Ok(Self {
            bot_token,
            api_url,
            admin_ids,
            admin_api_token,
            webapp_url,
            support_username,
            intro_picture,
            welcome_ad_delay,
            media_group_timeout,
            session_idle_ttl,
            ad_cadence,
            broadcast_time,
            broadcast_throttle,
            broadcast_concurrency,
        })
    }
}

/// Parse `HH:MM` (or `HH:MM:SS`) as a wall-clock time of day.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    let s = raw.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| Error::Config(format!("invalid time of day: {s}")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// A missing file is fine; an unreadable one is an error.
fn load_dotenv_if_present(path: &Path) -> Result<()> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
    Ok(())
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
