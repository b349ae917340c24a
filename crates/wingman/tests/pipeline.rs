//! End-to-end pipeline tests with fake knowledge and model backends.
//!
//! These cover the seams the live clients plug into: knowledge fetches feed
//! request assembly, the assembled request reaches the model, and the reply
//! comes back as ordered bubbles.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use wingman::anthropic::{ContentBlock, ReplyFuture, ReplyModel};
use wingman::compose::{DEFAULT_CAPTION_PROMPT, run_analysis};
use wingman::knowledge::{ExampleRecord, FetchFuture, KnowledgeStore};

// ── Fakes ──────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeStore {
    prompt: String,
    examples: Vec<ExampleRecord>,
    fail: bool,
}

impl KnowledgeStore for FakeStore {
    fn system_prompt(&self) -> FetchFuture<'_, String> {
        Box::pin(async move {
            if self.fail {
                Err("Supabase API HTTP 500: boom".to_string())
            } else {
                Ok(self.prompt.clone())
            }
        })
    }

    fn active_examples(&self) -> FetchFuture<'_, Vec<ExampleRecord>> {
        Box::pin(async move {
            if self.fail {
                Err("Supabase API HTTP 500: boom".to_string())
            } else {
                Ok(self.examples.clone())
            }
        })
    }
}

#[derive(Default)]
struct FakeModel {
    reply: String,
    fail: bool,
    calls: AtomicUsize,
    seen_system: Mutex<Option<String>>,
    seen_content: Mutex<Vec<ContentBlock>>,
}

impl FakeModel {
    fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            ..Default::default()
        }
    }
}

impl ReplyModel for FakeModel {
    fn invoke<'a>(&'a self, system: &'a str, content: Vec<ContentBlock>) -> ReplyFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_system.lock().unwrap() = Some(system.to_string());
        *self.seen_content.lock().unwrap() = content;
        let outcome = if self.fail {
            Err("Anthropic API HTTP 529: overloaded".to_string())
        } else {
            Ok(self.reply.clone())
        };
        Box::pin(async move { outcome })
    }
}

fn record(kind: &str, title: &str) -> ExampleRecord {
    ExampleRecord {
        kind: kind.into(),
        title: title.into(),
        annotation: None,
        tags: None,
        screenshot_base64: None,
        is_active: true,
        created_at: None,
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn reply_is_split_into_ordered_bubbles() {
    let store = FakeStore {
        prompt: "Be bold.".to_string(),
        ..Default::default()
    };
    let model = FakeModel::replying("First option\n---\nSecond option\n---\nThird option");

    let bubbles = run_analysis(&store, &model, "aW1n".into(), String::new())
        .await
        .unwrap();

    assert_eq!(
        bubbles,
        vec!["First option", "Second option", "Third option"]
    );
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn whitespace_reply_produces_no_bubbles() {
    let store = FakeStore::default();
    let model = FakeModel::replying("  \n--- \n  ");

    let bubbles = run_analysis(&store, &model, "aW1n".into(), String::new())
        .await
        .unwrap();
    assert!(bubbles.is_empty());
}

#[tokio::test]
async fn bare_knowledge_base_sends_prompt_unchanged() {
    let store = FakeStore {
        prompt: "You are Wingman, a witty dating coach.".to_string(),
        ..Default::default()
    };
    let model = FakeModel::replying("ok");

    run_analysis(&store, &model, "aW1n".into(), String::new())
        .await
        .unwrap();

    let system = model.seen_system.lock().unwrap().clone().unwrap();
    assert_eq!(system, "You are Wingman, a witty dating coach.");
    let content = model.seen_content.lock().unwrap();
    assert_eq!(content.len(), 2);
}

#[tokio::test]
async fn examples_reach_both_prompt_and_content() {
    let mut illustrated = record("conversation", "Great reopener");
    illustrated.screenshot_base64 = Some("cmVm".into());
    illustrated.annotation = Some("Note the callback".into());
    let textual = record("profile", "Strong bio");

    let store = FakeStore {
        prompt: "Be bold.".to_string(),
        examples: vec![illustrated, textual],
        ..Default::default()
    };
    let model = FakeModel::replying("ok");

    run_analysis(&store, &model, "aW1n".into(), String::new())
        .await
        .unwrap();

    let system = model.seen_system.lock().unwrap().clone().unwrap();
    assert!(system.starts_with("Be bold."));
    assert!(system.contains("[CONVERSATION] Great reopener"));
    assert!(system.contains("[PROFILE] Strong bio"));

    // Reference image and its text part, then the user image and instruction.
    let content = model.seen_content.lock().unwrap();
    assert_eq!(content.len(), 4);
    assert_eq!(
        content[1].as_text(),
        Some("[Reference example: Great reopener. Note the callback]")
    );
    assert_eq!(content[3].as_text(), Some(DEFAULT_CAPTION_PROMPT));
}

#[tokio::test]
async fn caption_is_passed_through_as_instruction() {
    let store = FakeStore::default();
    let model = FakeModel::replying("ok");

    run_analysis(&store, &model, "aW1n".into(), "Is this too keen?".into())
        .await
        .unwrap();

    let content = model.seen_content.lock().unwrap();
    assert_eq!(content.last().unwrap().as_text(), Some("Is this too keen?"));
}

#[tokio::test]
async fn fetch_failure_aborts_before_model_call() {
    let store = FakeStore {
        fail: true,
        ..Default::default()
    };
    let model = FakeModel::replying("never sent");

    let err = run_analysis(&store, &model, "aW1n".into(), String::new())
        .await
        .unwrap_err();
    assert!(err.contains("Supabase API HTTP 500"));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn model_failure_propagates() {
    let store = FakeStore::default();
    let model = FakeModel {
        fail: true,
        ..Default::default()
    };

    let err = run_analysis(&store, &model, "aW1n".into(), String::new())
        .await
        .unwrap_err();
    assert!(err.contains("Anthropic API HTTP 529"));
}
