//! Request composition and reply shaping for screenshot analysis.
//!
//! The flow mirrors what a human coach would do: pull the coaching prompt
//! and reference examples from the knowledge base, describe the examples in
//! a block under the prompt, attach reference screenshots ahead of the
//! user's screenshot, ask the model, then break its reply into separate
//! chat bubbles.

use futures::future;
use tracing::debug;

use crate::anthropic::{ContentBlock, ReplyModel};
use crate::knowledge::{ExampleRecord, KnowledgeStore};

/// Instruction used when the user sends a bare screenshot.
pub const DEFAULT_CAPTION_PROMPT: &str =
    "Analyse this screenshot and give me your best response suggestions.";

/// Delimiter the model is prompted to place between reply suggestions.
pub const BUBBLE_DELIMITER: &str = "---";

const EXAMPLES_HEADER: &str = "\n\n--- REFERENCE EXAMPLES FROM KNOWLEDGE BASE ---";
const EXAMPLES_FOOTER: &str = "--- END EXAMPLES ---\n";

// ── Examples block ─────────────────────────────────────────────────

/// Render examples as a text block to append to the system prompt.
///
/// Returns the empty string when there are no examples, so the prompt is
/// passed through unchanged rather than carrying an empty header/footer
/// pair.
pub fn examples_block(examples: &[ExampleRecord]) -> String {
    if examples.is_empty() {
        return String::new();
    }

    let mut lines = vec![EXAMPLES_HEADER.to_string()];
    for ex in examples {
        lines.push(format!("\n[{}] {}", ex.kind.to_uppercase(), ex.title));
        if let Some(note) = ex.annotation.as_deref()
            && !note.is_empty()
        {
            lines.push(format!("Note: {note}"));
        }
        if let Some(tags) = &ex.tags
            && !tags.is_empty()
        {
            lines.push(format!("Tags: {}", tags.join(", ")));
        }
    }
    lines.push(EXAMPLES_FOOTER.to_string());
    lines.join("\n")
}

// ── Request assembly ───────────────────────────────────────────────

/// Everything needed for one analysis call, assembled from the knowledge
/// base and the user's message.
#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    /// Base64 of the user's screenshot.
    pub image: String,
    /// The user's caption; empty means "use the default instruction".
    pub caption: String,
    pub system_prompt: String,
    pub examples: Vec<ExampleRecord>,
}

impl AnalysisRequest {
    pub fn new(
        image: String,
        caption: String,
        system_prompt: String,
        examples: Vec<ExampleRecord>,
    ) -> Self {
        Self {
            image,
            caption,
            system_prompt,
            examples,
        }
    }

    /// System prompt with the examples block appended.
    pub fn system_text(&self) -> String {
        format!("{}{}", self.system_prompt, examples_block(&self.examples))
    }

    /// Content parts for the single user turn.
    ///
    /// Reference screenshots come first, each followed by a text part tying
    /// it back to its knowledge-base entry. The user's screenshot is
    /// second-to-last and the instruction text is always last.
    pub fn content(&self) -> Vec<ContentBlock> {
        let mut parts = Vec::new();

        for ex in &self.examples {
            let Some(shot) = ex.screenshot_base64.as_deref() else {
                continue;
            };
            if shot.is_empty() {
                continue;
            }
            parts.push(ContentBlock::jpeg(shot));
            parts.push(ContentBlock::text(format!(
                "[Reference example: {}. {}]",
                ex.title,
                ex.annotation.as_deref().unwrap_or_default()
            )));
        }

        parts.push(ContentBlock::jpeg(self.image.as_str()));
        let instruction = if self.caption.is_empty() {
            DEFAULT_CAPTION_PROMPT
        } else {
            self.caption.as_str()
        };
        parts.push(ContentBlock::text(instruction));
        parts
    }
}

// ── Reply shaping ──────────────────────────────────────────────────

/// Split a model reply into message bubbles on `---` delimiters.
///
/// Segments are trimmed and empty ones dropped, so a reply with no real
/// content produces no bubbles at all.
pub fn split_bubbles(reply: &str) -> Vec<String> {
    reply
        .split(BUBBLE_DELIMITER)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Pipeline ───────────────────────────────────────────────────────

/// Run one screenshot through the full analysis pipeline.
///
/// Fetches the prompt and examples concurrently; any fetch failure aborts
/// the run before the model is invoked.
pub async fn run_analysis(
    knowledge: &dyn KnowledgeStore,
    model: &dyn ReplyModel,
    image: String,
    caption: String,
) -> Result<Vec<String>, String> {
    let (system_prompt, examples) =
        future::try_join(knowledge.system_prompt(), knowledge.active_examples()).await?;

    let request = AnalysisRequest::new(image, caption, system_prompt, examples);
    let system = request.system_text();
    let content = request.content();
    debug!(
        "analysis request: {} example(s), {} content part(s), system {} chars",
        request.examples.len(),
        content.len(),
        system.len(),
    );

    let reply = model.invoke(&system, content).await?;
    Ok(split_bubbles(&reply))
}
