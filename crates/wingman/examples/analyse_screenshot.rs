//! Minimal pipeline example: one screenshot from file to reply bubbles.
//!
//! Fetches the coach prompt and reference examples from Supabase, sends the
//! screenshot to Claude, and prints every bubble the reply splits into.
//!
//! # Usage
//!
//! ```bash
//! ANTHROPIC_API_KEY=sk-... SUPABASE_URL=https://... SUPABASE_KEY=... \
//!     cargo run --example analyse_screenshot -- chat.jpg "went on one date"
//! ```

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use wingman::anthropic::AnthropicClient;
use wingman::compose::run_analysis;
use wingman::knowledge::SupabaseStore;

#[tokio::main]
async fn main() -> Result<(), String> {
    // 1. Read the screenshot named on the command line.
    let path = std::env::args()
        .nth(1)
        .ok_or("Usage: analyse_screenshot <image.jpg> [caption]")?;
    let caption = std::env::args().nth(2).unwrap_or_default();
    let bytes = std::fs::read(&path).map_err(|e| format!("failed to read {path}: {e}"))?;

    // 2. Create the two API clients.
    let model = AnthropicClient::new(
        std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| "Set ANTHROPIC_API_KEY env var to your Anthropic API key")?,
    )?;
    let knowledge = SupabaseStore::new(
        std::env::var("SUPABASE_URL").map_err(|_| "Set SUPABASE_URL env var")?,
        std::env::var("SUPABASE_KEY").map_err(|_| "Set SUPABASE_KEY env var")?,
    )?;

    // 3. Run the full analysis pipeline.
    let bubbles = run_analysis(&knowledge, &model, STANDARD.encode(&bytes), caption).await?;

    // 4. Print each bubble as the bot would send it.
    for (i, bubble) in bubbles.iter().enumerate() {
        println!("--- bubble {} ---\n{bubble}\n", i + 1);
    }

    Ok(())
}
