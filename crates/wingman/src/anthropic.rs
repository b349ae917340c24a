//! Typed client for the Anthropic Messages API.
//!
//! One request shape covers everything the bot does: a system string plus a
//! single user turn whose content interleaves text and base64 images. The
//! reply comes back as content blocks; the first text block is the coaching
//! reply.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{DEFAULT_MODEL, MAX_REPLY_TOKENS};

pub const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Boxed future returned by [`ReplyModel::invoke`].
pub type ReplyFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

// ── Content blocks ─────────────────────────────────────────────────

/// One part of a user turn: text or an inline image.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

/// Inline image payload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    /// An inline JPEG image. Telegram photos are always JPEG re-encodes, so
    /// the bot never needs another media type.
    pub fn jpeg(data: impl Into<String>) -> Self {
        ContentBlock::Image {
            source: ImageSource::Base64 {
                media_type: "image/jpeg".into(),
                data: data.into(),
            },
        }
    }

    /// The text payload, if this is a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Image { .. } => None,
        }
    }
}

// ── Request / response types ───────────────────────────────────────

/// Messages API request body.
#[derive(Serialize, Debug)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<UserTurn>,
}

#[derive(Serialize, Debug)]
struct UserTurn {
    role: &'static str,
    content: Vec<ContentBlock>,
}

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawReply {
    #[serde(default)]
    content: Option<Vec<ReplyBlock>>,
    #[serde(default)]
    error: Option<ApiErrorDetail>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

/// A reply content block. Kept loose on purpose: unfamiliar block types
/// (thinking, tool use) deserialize fine and are skipped by `first_text`.
#[derive(Deserialize, Debug)]
struct ReplyBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorDetail {
    message: String,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
struct UsageInfo {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

// ── Model trait ────────────────────────────────────────────────────

/// A multimodal model that turns a system prompt plus mixed text/image
/// content into a single text reply.
///
/// Uses a boxed future so that the trait is dyn-compatible (object-safe);
/// tests substitute scripted fakes for the live client.
pub trait ReplyModel: Send + Sync {
    fn invoke<'a>(&'a self, system: &'a str, content: Vec<ContentBlock>) -> ReplyFuture<'a>;
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the Anthropic Messages API.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    /// Create a new client with the given API key and default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("wingman/0.2")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: MAX_REPLY_TOKENS,
        })
    }

    /// Override the model id.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the reply token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Send one user turn and return the first text block of the reply.
    pub async fn messages(
        &self,
        system: &str,
        content: Vec<ContentBlock>,
    ) -> Result<String, String> {
        let part_count = content.len();
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system,
            messages: vec![UserTurn {
                role: "user",
                content,
            }],
        };
        debug!(
            "model request: model={}, parts={}, system={} chars, max_tokens={}",
            self.model,
            part_count,
            system.len(),
            self.max_tokens,
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(ANTHROPIC_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        let elapsed = start.elapsed();
        debug!(
            "model response: HTTP {} in {:.1}s ({} bytes)",
            status,
            elapsed.as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("Anthropic API HTTP {status}: {text}"));
        }

        let parsed: RawReply =
            serde_json::from_str(&text).map_err(|e| format!("failed to parse response: {e}"))?;

        if let Some(err) = parsed.error {
            return Err(format!("Anthropic API error: {}", err.message));
        }

        if let Some(ref usage) = parsed.usage {
            debug!(
                "Token usage: input={}, output={}",
                usage.input_tokens.unwrap_or(0),
                usage.output_tokens.unwrap_or(0),
            );
        }

        first_text(parsed.content.unwrap_or_default())
            .ok_or_else(|| "Empty model reply (no text block)".to_string())
    }
}

impl ReplyModel for AnthropicClient {
    fn invoke<'a>(&'a self, system: &'a str, content: Vec<ContentBlock>) -> ReplyFuture<'a> {
        Box::pin(self.messages(system, content))
    }
}

/// First text block of a reply, skipping any other block types.
fn first_text(blocks: Vec<ReplyBlock>) -> Option<String> {
    blocks.into_iter().find_map(|b| match b.block_type.as_str() {
        "text" => b.text,
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_blocks_serialize_with_type_tags() {
        let text = serde_json::to_value(ContentBlock::text("hey")).unwrap();
        assert_eq!(text["type"], "text");
        assert_eq!(text["text"], "hey");

        let image = serde_json::to_value(ContentBlock::jpeg("aGVsbG8=")).unwrap();
        assert_eq!(image["type"], "image");
        assert_eq!(image["source"]["type"], "base64");
        assert_eq!(image["source"]["media_type"], "image/jpeg");
        assert_eq!(image["source"]["data"], "aGVsbG8=");
    }

    #[test]
    fn request_body_matches_wire_format() {
        let body = MessagesRequest {
            model: "claude-sonnet-4-5",
            max_tokens: 1024,
            system: "Be helpful.",
            messages: vec![UserTurn {
                role: "user",
                content: vec![ContentBlock::text("hi")],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "claude-sonnet-4-5");
        assert_eq!(json["max_tokens"], 1024);
        assert_eq!(json["system"], "Be helpful.");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
    }

    #[test]
    fn reply_takes_first_text_block() {
        let raw: RawReply = serde_json::from_str(
            r#"{"content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "First."},
                {"type": "text", "text": "Second."}
            ]}"#,
        )
        .unwrap();
        assert_eq!(first_text(raw.content.unwrap()), Some("First.".to_string()));
    }

    #[test]
    fn reply_without_text_blocks_is_none() {
        assert!(first_text(vec![]).is_none());
        let raw: RawReply =
            serde_json::from_str(r#"{"content": [{"type": "tool_use", "id": "t1"}]}"#).unwrap();
        assert_eq!(first_text(raw.content.unwrap()), None);
    }

    #[test]
    fn error_envelope_parses() {
        let raw: RawReply = serde_json::from_str(
            r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#,
        )
        .unwrap();
        assert_eq!(raw.error.unwrap().message, "Overloaded");
    }

    #[test]
    fn usage_parses_from_reply() {
        let raw: RawReply = serde_json::from_str(
            r#"{"content": [{"type": "text", "text": "ok"}],
                "usage": {"input_tokens": 2048, "output_tokens": 256}}"#,
        )
        .unwrap();
        let usage = raw.usage.unwrap();
        assert_eq!(usage.input_tokens, Some(2048));
        assert_eq!(usage.output_tokens, Some(256));
    }
}
