//! Knowledge base access over the Supabase REST API.
//!
//! The bot's coaching context lives in two Supabase tables: `config` holds a
//! single row (`id = "main"`) with the system prompt, and `examples` holds
//! curated reference examples that get appended to it. This module only ever
//! reads; the admin console owns all writes.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// System prompt used when the `config` table has no row yet.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Wingman, a witty dating coach.";

/// Boxed future returned by [`KnowledgeStore`] methods.
///
/// Type alias to keep trait signatures and implementations readable.
pub type FetchFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send + 'a>>;

// ── Records ────────────────────────────────────────────────────────

/// A curated reference example from the `examples` table.
///
/// `kind` is a free-form label maintained in the admin console
/// ("conversation", "profile", "general", ...) and is rendered verbatim, so
/// new kinds need no code change here.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExampleRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Base64 screenshot payload, when the example has an image attached.
    #[serde(default)]
    pub screenshot_base64: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug)]
struct PromptRow {
    system_prompt: String,
}

// ── Store trait ────────────────────────────────────────────────────

/// Read access to the bot's stored coaching context.
///
/// Uses boxed futures so that the trait is dyn-compatible (object-safe);
/// tests substitute in-memory fakes for the Supabase-backed store.
pub trait KnowledgeStore: Send + Sync {
    /// The current system prompt.
    fn system_prompt(&self) -> FetchFuture<'_, String>;

    /// All active examples, oldest first.
    fn active_examples(&self) -> FetchFuture<'_, Vec<ExampleRecord>>;
}

// ── Supabase client ────────────────────────────────────────────────

/// Async HTTP client for Supabase PostgREST reads.
pub struct SupabaseStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStore {
    /// Create a new store for the given project URL and service key.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("wingman/0.2")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// GET `rest/v1/{path_and_query}` and deserialize the row array.
    async fn get_rows<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<Vec<T>, String> {
        let url = format!("{}/rest/v1/{}", self.base_url, path_and_query);
        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        if !status.is_success() {
            return Err(format!("Supabase API HTTP {status}: {text}"));
        }

        serde_json::from_str(&text).map_err(|e| format!("failed to parse response: {e}"))
    }
}

impl KnowledgeStore for SupabaseStore {
    fn system_prompt(&self) -> FetchFuture<'_, String> {
        Box::pin(async move {
            let rows: Vec<PromptRow> = self
                .get_rows("config?id=eq.main&select=system_prompt&limit=1")
                .await?;
            Ok(prompt_or_default(rows))
        })
    }

    fn active_examples(&self) -> FetchFuture<'_, Vec<ExampleRecord>> {
        Box::pin(async move {
            let rows: Vec<ExampleRecord> = self
                .get_rows("examples?is_active=eq.true&select=*&order=created_at.asc")
                .await?;
            debug!("knowledge base returned {} active example(s)", rows.len());
            Ok(rows)
        })
    }
}

/// First row's prompt, or the default when the table is empty.
fn prompt_or_default(rows: Vec<PromptRow>) -> String {
    rows.into_iter()
        .next()
        .map(|row| row.system_prompt)
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
}
