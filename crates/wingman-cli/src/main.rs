//! Analyse a screenshot from disk through the Wingman pipeline and print
//! the reply bubbles.
//!
//! Reads the same environment (or `.env`) as the bot: `ANTHROPIC_API_KEY`
//! always, plus `SUPABASE_URL` / `SUPABASE_KEY` unless `--system` and
//! `--no-examples` together bypass the knowledge base.
//!
//! # Examples
//!
//! ```sh
//! # Full pipeline: stored prompt plus examples
//! wingman-cli screenshot.jpg
//!
//! # Ask something specific
//! wingman-cli screenshot.jpg --caption "Is this conversation dead?"
//!
//! # Inspect the assembled request without calling the model
//! wingman-cli screenshot.jpg --dry-run
//!
//! # Bypass the knowledge base entirely
//! wingman-cli screenshot.jpg --system "You are a blunt coach." --no-examples
//! ```

use std::path::PathBuf;
use std::process;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use clap::Parser;

use wingman::anthropic::{AnthropicClient, ContentBlock, ImageSource};
use wingman::compose::{AnalysisRequest, split_bubbles};
use wingman::knowledge::{KnowledgeStore, SupabaseStore};

/// Analyse a screenshot through the Wingman pipeline and print the reply.
#[derive(Parser)]
#[command(name = "wingman-cli")]
struct Cli {
    /// Path to the screenshot (sent as image/jpeg).
    image: PathBuf,

    /// Caption to send with the screenshot. Empty uses the bot's default
    /// instruction.
    #[arg(long, default_value = "")]
    caption: String,

    /// Model to use for the analysis.
    #[arg(long)]
    model: Option<String>,

    /// Maximum tokens in the model reply.
    #[arg(long, default_value_t = wingman::MAX_REPLY_TOKENS)]
    max_tokens: u32,

    /// Use this system prompt instead of the stored one.
    #[arg(long)]
    system: Option<String>,

    /// Skip fetching knowledge-base examples.
    #[arg(long)]
    no_examples: bool,

    /// Print the assembled request instead of calling the model.
    #[arg(long)]
    dry_run: bool,
}

async fn run(cli: &Cli) -> Result<String, String> {
    let bytes = std::fs::read(&cli.image)
        .map_err(|e| format!("failed to read image '{}': {e}", cli.image.display()))?;
    let image = STANDARD.encode(&bytes);
    eprintln!(
        "  Loaded {} ({} KiB)",
        cli.image.display(),
        bytes.len() / 1024
    );

    let (system_prompt, examples) = if cli.system.is_some() && cli.no_examples {
        (cli.system.clone().unwrap_or_default(), Vec::new())
    } else {
        let store = SupabaseStore::new(env_var("SUPABASE_URL")?, env_var("SUPABASE_KEY")?)?;
        let prompt = match &cli.system {
            Some(prompt) => prompt.clone(),
            None => store.system_prompt().await?,
        };
        let examples = if cli.no_examples {
            Vec::new()
        } else {
            store.active_examples().await?
        };
        (prompt, examples)
    };
    eprintln!("  Using {} example(s) from the knowledge base", examples.len());

    let request = AnalysisRequest::new(image, cli.caption.clone(), system_prompt, examples);

    if cli.dry_run {
        return Ok(render_dry_run(&request));
    }

    let client = AnthropicClient::new(env_var("ANTHROPIC_API_KEY")?)?.with_max_tokens(cli.max_tokens);
    let client = match &cli.model {
        Some(model) => client.with_model(model),
        None => client,
    };

    let system = request.system_text();
    let reply = client.messages(&system, request.content()).await?;
    let bubbles = split_bubbles(&reply);
    if bubbles.is_empty() {
        return Ok("(the model sent nothing back)\n".to_string());
    }
    Ok(render_bubbles(&bubbles))
}

fn env_var(name: &str) -> Result<String, String> {
    std::env::var(name).map_err(|_| format!("{name} environment variable is not set"))
}

/// Summarize the assembled request: full system text plus one line per
/// content part (image payloads are sized, not dumped).
fn render_dry_run(request: &AnalysisRequest) -> String {
    let mut out = String::new();
    out.push_str("── system ──\n");
    out.push_str(&request.system_text());
    out.push_str("\n\n── content ──\n");
    for (i, part) in request.content().iter().enumerate() {
        match part {
            ContentBlock::Text { text } => {
                out.push_str(&format!("{}. text: {text}\n", i + 1));
            }
            ContentBlock::Image { source } => {
                let ImageSource::Base64 { media_type, data } = source;
                out.push_str(&format!(
                    "{}. image: {media_type}, {} base64 chars\n",
                    i + 1,
                    data.len()
                ));
            }
        }
    }
    out
}

/// Join bubbles with a separator line, the way they'd arrive in Telegram.
fn render_bubbles(bubbles: &[String]) -> String {
    let mut out = String::new();
    for (i, bubble) in bubbles.iter().enumerate() {
        if i > 0 {
            out.push_str("\n· · ·\n\n");
        }
        out.push_str(bubble);
        out.push('\n');
    }
    out
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
