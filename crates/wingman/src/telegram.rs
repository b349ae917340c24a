//! Minimal Telegram Bot API client. Covers only the slice the bot uses:
//! `getUpdates` long polling, `sendMessage`/`sendChatAction`, and the
//! `getFile` dance needed to pull photo bytes.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Extra headroom over the long-poll timeout before reqwest gives up.
const POLL_GRACE_SECS: u64 = 10;

// ── Wire types ─────────────────────────────────────────────────────

/// Envelope every Bot API call returns.
#[derive(Deserialize, Debug)]
struct ApiReply<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

impl<T> ApiReply<T> {
    fn into_result(self) -> Result<T, String> {
        if self.ok {
            self.result
                .ok_or_else(|| "Telegram API returned ok without a result".to_string())
        } else {
            Err(format!(
                "Telegram API error: {}",
                self.description.unwrap_or_else(|| "unknown".to_string())
            ))
        }
    }
}

/// One update from `getUpdates`.
#[derive(Deserialize, Clone, Debug)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<ChatMessage>,
}

/// An incoming chat message. Update kinds and fields the bot never reads
/// are dropped during deserialization.
#[derive(Deserialize, Clone, Debug)]
pub struct ChatMessage {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    /// Telegram sends several sizes of the same photo, smallest first.
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Deserialize, Debug, Default)]
struct FileInfo {
    #[serde(default)]
    file_path: Option<String>,
}

#[derive(Serialize, Debug)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
}

#[derive(Serialize, Debug)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Serialize, Debug)]
struct SendChatAction<'a> {
    chat_id: i64,
    action: &'a str,
}

#[derive(Serialize, Debug)]
struct GetFile<'a> {
    file_id: &'a str,
}

impl ChatMessage {
    /// The highest-resolution photo size, if the message has a photo.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo
            .as_ref()?
            .iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
    }

    pub fn has_photo(&self) -> bool {
        self.photo.as_ref().is_some_and(|sizes| !sizes.is_empty())
    }
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the Telegram Bot API.
pub struct TelegramClient {
    client: reqwest::Client,
    token: String,
}

impl TelegramClient {
    /// Create a new client for the given bot token.
    pub fn new(token: impl Into<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("wingman/0.2")
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{TELEGRAM_API_BASE}/bot{}/{method}", self.token)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{TELEGRAM_API_BASE}/file/bot{}/{file_path}", self.token)
    }

    /// POST a Bot API method and unwrap the response envelope.
    async fn call<B: Serialize, T: DeserializeOwned + Default>(
        &self,
        method: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<T, String> {
        let mut req = self.client.post(self.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        if !status.is_success() {
            return Err(format!("Telegram API HTTP {status}: {text}"));
        }

        let parsed: ApiReply<T> =
            serde_json::from_str(&text).map_err(|e| format!("failed to parse response: {e}"))?;
        parsed.into_result()
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, String> {
        let body = GetUpdates {
            offset,
            timeout: timeout_secs,
        };
        let timeout = Duration::from_secs(timeout_secs + POLL_GRACE_SECS);
        let updates: Vec<Update> = self.call("getUpdates", &body, Some(timeout)).await?;
        if !updates.is_empty() {
            debug!("received {} update(s)", updates.len());
        }
        Ok(updates)
    }

    /// Send a plain-text message.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), String> {
        self.send(chat_id, text, None).await
    }

    /// Send a Markdown-formatted message.
    pub async fn send_markdown(&self, chat_id: i64, text: &str) -> Result<(), String> {
        self.send(chat_id, text, Some("Markdown")).await
    }

    async fn send(&self, chat_id: i64, text: &str, parse_mode: Option<&str>) -> Result<(), String> {
        let body = SendMessage {
            chat_id,
            text,
            parse_mode,
        };
        let _: serde_json::Value = self.call("sendMessage", &body, None).await?;
        Ok(())
    }

    /// Show a chat status indicator ("typing", "upload_photo", ...).
    pub async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<(), String> {
        let body = SendChatAction { chat_id, action };
        let _: serde_json::Value = self.call("sendChatAction", &body, None).await?;
        Ok(())
    }

    /// Download a file by id and return its bytes base64-encoded.
    pub async fn download_file_base64(&self, file_id: &str) -> Result<String, String> {
        let info: FileInfo = self.call("getFile", &GetFile { file_id }, None).await?;
        let file_path = info
            .file_path
            .ok_or_else(|| "Telegram API returned no file_path".to_string())?;

        let resp = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("Telegram file download HTTP {status}"));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| format!("failed to read file body: {e}"))?;
        debug!("downloaded {} byte(s) for file {file_id}", bytes.len());
        Ok(STANDARD.encode(&bytes))
    }
}
