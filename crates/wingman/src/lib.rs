//! Telegram dating-coach bot that analyses chat screenshots with Claude.
//!
//! Wingman receives a screenshot of a conversation or dating profile over
//! Telegram and enriches it with a coaching prompt plus curated reference
//! examples from a Supabase knowledge base. The assembled request goes to
//! the Anthropic Messages API, and the model's reply comes back to the user
//! as separate chat bubbles.
//!
//! # Where to find things
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`telegram`] | Long polling, message sending, photo downloads |
//! | [`knowledge`] | [`KnowledgeStore`](knowledge::KnowledgeStore) trait and the Supabase-backed store |
//! | [`compose`] | Examples block, request assembly, reply-to-bubble splitting |
//! | [`anthropic`] | [`ReplyModel`](anthropic::ReplyModel) trait and the Messages API client |
//! | [`bot`] | Update routing and the long-poll loop |
//! | [`config`] | Environment-driven runtime configuration |
//!
//! The seams are the two traits, [`KnowledgeStore`](knowledge::KnowledgeStore)
//! and [`ReplyModel`](anthropic::ReplyModel). Everything between them is
//! plain functions over plain data, testable without a network.

pub mod anthropic;
pub mod bot;
pub mod compose;
pub mod config;
pub mod knowledge;
pub mod telegram;

// ── Constants ──────────────────────────────────────────────────────

/// Default model for screenshot analysis calls.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Maximum tokens for one coaching reply.
pub const MAX_REPLY_TOKENS: u32 = 1024;
