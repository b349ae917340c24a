//! Update routing: commands, photo analysis, and the long-poll loop.
//!
//! One [`Bot`] borrows the Telegram client plus the two pipeline seams and
//! polls `getUpdates` forever. Photo messages run the analysis pipeline;
//! text messages get a command reply or a nudge toward sending screenshots.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::anthropic::ReplyModel;
use crate::compose::run_analysis;
use crate::knowledge::KnowledgeStore;
use crate::telegram::{ChatMessage, TelegramClient, Update};

const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Longest prompt preview `/prompt` will send before truncating.
const PROMPT_PREVIEW_CHARS: usize = 600;

// ── Canned replies ─────────────────────────────────────────────────

const START_TEXT: &str = "\
👋 *Wingman online.*

Send me a screenshot of:
• A conversation → I'll suggest reply options
• A dating profile → I'll suggest openers

You can also send multiple screenshots at once. Let's get you some wins. 🎯";

const HELP_TEXT: &str = "\
*Wingman Commands*

/start — Welcome message
/help — This message
/prompt — Show current system prompt

Just send screenshots — no commands needed. Edit your prompt & knowledge base \
at your admin UI.";

const NUDGE_TEXT: &str = "\
Send me a *screenshot* — paste an image of the conversation or profile. I can't \
read text pastes as well as I can read actual screenshots. 📸";

const FALLBACK_TEXT: &str = "⚠️ Something went wrong analysing that. Try again?";

// ── Bot ────────────────────────────────────────────────────────────

/// The update router. Borrows its collaborators so tests can substitute
/// fakes for the knowledge store and the model.
pub struct Bot<'a> {
    telegram: &'a TelegramClient,
    knowledge: &'a dyn KnowledgeStore,
    model: &'a dyn ReplyModel,
    allowed_user: Option<i64>,
    poll_timeout_secs: u64,
}

impl<'a> Bot<'a> {
    pub fn new(
        telegram: &'a TelegramClient,
        knowledge: &'a dyn KnowledgeStore,
        model: &'a dyn ReplyModel,
    ) -> Self {
        Self {
            telegram,
            knowledge,
            model,
            allowed_user: None,
            poll_timeout_secs: crate::config::DEFAULT_POLL_TIMEOUT_SECS,
        }
    }

    /// Restrict the bot to a single Telegram user id.
    pub fn with_allowed_user(mut self, user: Option<i64>) -> Self {
        self.allowed_user = user;
        self
    }

    /// Override the long-poll timeout.
    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    /// Poll for updates forever. Transient poll failures are retried after
    /// a short delay; auth failures (revoked or mistyped token) abort.
    pub async fn run(&self) -> Result<(), String> {
        info!("Wingman is online; long-polling for updates");
        let mut offset = 0i64;
        loop {
            let updates = match self.telegram.get_updates(offset, self.poll_timeout_secs).await {
                Ok(updates) => updates,
                Err(e) if is_fatal_poll_error(&e) => {
                    return Err(format!("polling aborted: {e}"));
                }
                Err(e) => {
                    warn!("getUpdates failed, retrying shortly: {e}");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };
            for update in updates {
                offset = offset.max(update.update_id + 1);
                self.handle_update(update).await;
            }
        }
    }

    /// Route one update. Never returns an error: failures are logged and,
    /// for photo analysis, reported to the user as a fallback message.
    pub async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        if !user_allowed(self.allowed_user, &message) {
            debug!("ignoring update {} from disallowed user", update.update_id);
            return;
        }
        let chat_id = message.chat.id;

        if message.has_photo() {
            if let Err(e) = self.handle_photo(&message).await {
                error!("error processing photo: {e}");
                if let Err(send_err) = self.telegram.send_message(chat_id, FALLBACK_TEXT).await {
                    error!("failed to send fallback message: {send_err}");
                }
            }
            return;
        }

        let Some(text) = message.text.as_deref() else {
            // Stickers, voice notes, etc. have no handler.
            return;
        };
        let outcome = match command_of(text) {
            Some("start") => self.telegram.send_markdown(chat_id, START_TEXT).await,
            Some("help") => self.telegram.send_markdown(chat_id, HELP_TEXT).await,
            Some("prompt") => self.show_prompt(chat_id).await,
            Some(other) => {
                debug!("ignoring unknown command /{other}");
                Ok(())
            }
            None => self.telegram.send_markdown(chat_id, NUDGE_TEXT).await,
        };
        if let Err(e) = outcome {
            error!("error handling text message: {e}");
        }
    }

    /// `/prompt`: show the stored system prompt, truncated for chat.
    async fn show_prompt(&self, chat_id: i64) -> Result<(), String> {
        let prompt = self.knowledge.system_prompt().await?;
        let preview = preview_of(&prompt, PROMPT_PREVIEW_CHARS);
        self.telegram
            .send_markdown(chat_id, &format!("*Current system prompt:*\n\n{preview}"))
            .await
    }

    /// Download the photo, run the analysis pipeline, and deliver each
    /// bubble as its own message.
    async fn handle_photo(&self, message: &ChatMessage) -> Result<(), String> {
        let chat_id = message.chat.id;
        if let Err(e) = self.telegram.send_chat_action(chat_id, "typing").await {
            debug!("chat action failed: {e}");
        }

        let photo = message
            .largest_photo()
            .ok_or_else(|| "photo message contained no sizes".to_string())?;
        let caption = message.caption.clone().unwrap_or_default();

        let image = self.telegram.download_file_base64(&photo.file_id).await?;
        let bubbles = run_analysis(self.knowledge, self.model, image, caption).await?;

        if bubbles.is_empty() {
            info!("model reply was empty; nothing to send to chat {chat_id}");
            return Ok(());
        }
        for bubble in &bubbles {
            self.telegram.send_message(chat_id, bubble).await?;
        }
        info!("delivered {} bubble(s) to chat {chat_id}", bubbles.len());
        Ok(())
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Extract the command name from a message text, if it is a command.
///
/// Handles the `/cmd@BotName` form Telegram clients send in groups.
fn command_of(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    let command = first.strip_prefix('/')?;
    command.split('@').next().filter(|c| !c.is_empty())
}

/// Whether this message may be handled under the allowed-user setting.
fn user_allowed(allowed: Option<i64>, message: &ChatMessage) -> bool {
    match allowed {
        None => true,
        Some(id) => message.from.as_ref().is_some_and(|user| user.id == id),
    }
}

/// Whether a poll error means the token is bad and retrying is pointless.
fn is_fatal_poll_error(error: &str) -> bool {
    ["HTTP 401", "HTTP 404"].iter().any(|s| error.contains(s))
}

/// First `max_chars` characters, with `...` appended when truncated.
fn preview_of(text: &str, max_chars: usize) -> String {
    let mut preview: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::{Chat, User};

    fn message(text: Option<&str>, from_id: Option<i64>) -> ChatMessage {
        ChatMessage {
            message_id: 1,
            from: from_id.map(|id| User { id, username: None }),
            chat: Chat { id: 99 },
            text: text.map(str::to_string),
            caption: None,
            photo: None,
        }
    }

    #[test]
    fn command_of_parses_plain_and_addressed_commands() {
        assert_eq!(command_of("/start"), Some("start"));
        assert_eq!(command_of("/help@WingmanBot"), Some("help"));
        assert_eq!(command_of("/prompt please"), Some("prompt"));
    }

    #[test]
    fn command_of_rejects_non_commands() {
        assert_eq!(command_of("hello"), None);
        assert_eq!(command_of("hi /start"), None);
        assert_eq!(command_of("/"), None);
        assert_eq!(command_of(""), None);
        assert_eq!(command_of("   "), None);
    }

    #[test]
    fn open_bot_allows_everyone() {
        assert!(user_allowed(None, &message(Some("hi"), Some(7))));
        assert!(user_allowed(None, &message(Some("hi"), None)));
    }

    #[test]
    fn restricted_bot_matches_sender_id() {
        assert!(user_allowed(Some(7), &message(Some("hi"), Some(7))));
        assert!(!user_allowed(Some(7), &message(Some("hi"), Some(8))));
        assert!(!user_allowed(Some(7), &message(Some("hi"), None)));
    }

    #[test]
    fn auth_failures_are_fatal_poll_errors() {
        assert!(is_fatal_poll_error("Telegram API HTTP 401 Unauthorized: {}"));
        assert!(is_fatal_poll_error("Telegram API HTTP 404 Not Found: {}"));
    }

    #[test]
    fn transient_failures_are_not_fatal() {
        assert!(!is_fatal_poll_error("request failed: timed out"));
        assert!(!is_fatal_poll_error(
            "Telegram API error: terminated by other getUpdates request"
        ));
        assert!(!is_fatal_poll_error("Telegram API HTTP 502 Bad Gateway: {}"));
    }

    #[test]
    fn short_prompts_are_not_truncated() {
        assert_eq!(preview_of("short", 600), "short");
    }

    #[test]
    fn long_prompts_get_ellipsis() {
        let long = "x".repeat(601);
        let preview = preview_of(&long, 600);
        assert_eq!(preview.chars().count(), 603);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn preview_counts_characters_not_bytes() {
        let emoji = "🎯".repeat(10);
        assert_eq!(preview_of(&emoji, 5).chars().count(), 8);
    }
}
