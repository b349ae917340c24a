//! Runtime configuration from environment variables.
//!
//! All secrets come from the environment (a `.env` file is loaded by the
//! binaries before this runs). CLI flags may override the non-secret fields
//! after loading.

use crate::{DEFAULT_MODEL, MAX_REPLY_TOKENS};

/// How long each `getUpdates` call waits server-side, in seconds.
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Settings for one bot process.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot token from `TELEGRAM_BOT_TOKEN`.
    pub telegram_token: String,
    /// API key from `ANTHROPIC_API_KEY`.
    pub anthropic_api_key: String,
    /// Project URL from `SUPABASE_URL`.
    pub supabase_url: String,
    /// Service key from `SUPABASE_KEY`.
    pub supabase_key: String,
    /// Single allowed Telegram user id, or `None` for an open bot.
    /// From `ALLOWED_TELEGRAM_USER_ID`; unset or `0` means open.
    pub allowed_user_id: Option<i64>,
    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,
    /// Maximum tokens per coaching reply. Default: [`MAX_REPLY_TOKENS`].
    pub max_reply_tokens: u32,
    /// Long-poll timeout. Default: [`DEFAULT_POLL_TIMEOUT_SECS`].
    pub poll_timeout_secs: u64,
}

impl BotConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            telegram_token: required("TELEGRAM_BOT_TOKEN")?,
            anthropic_api_key: required("ANTHROPIC_API_KEY")?,
            supabase_url: required("SUPABASE_URL")?,
            supabase_key: required("SUPABASE_KEY")?,
            allowed_user_id: parse_allowed_user(
                std::env::var("ALLOWED_TELEGRAM_USER_ID").ok().as_deref(),
            )?,
            model: DEFAULT_MODEL.to_string(),
            max_reply_tokens: MAX_REPLY_TOKENS,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
        })
    }
}

fn required(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|_| format!("{name} environment variable is not set"))
}

/// Parse the allowed-user setting. `0` is the documented "open to everyone"
/// value, so it maps to `None` like an unset variable does.
fn parse_allowed_user(raw: Option<&str>) -> Result<Option<i64>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let id: i64 = raw
        .parse()
        .map_err(|_| format!("ALLOWED_TELEGRAM_USER_ID must be an integer, got '{raw}'"))?;
    Ok((id != 0).then_some(id))
}
