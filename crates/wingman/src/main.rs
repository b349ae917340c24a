//! Run the Wingman Telegram bot.
//!
//! Reads secrets from the environment (or a `.env` file):
//! `TELEGRAM_BOT_TOKEN`, `ANTHROPIC_API_KEY`, `SUPABASE_URL`, `SUPABASE_KEY`,
//! and optionally `ALLOWED_TELEGRAM_USER_ID` (unset or `0` leaves the bot
//! open to everyone). `RUST_LOG` controls log verbosity (default `info`).
//!
//! # Examples
//!
//! ```sh
//! # Long-poll with defaults
//! wingman
//!
//! # Shorter poll cycle and a higher reply token cap
//! wingman --poll-timeout 10 --max-tokens 2048
//! ```

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use wingman::anthropic::AnthropicClient;
use wingman::bot::Bot;
use wingman::config::BotConfig;
use wingman::knowledge::SupabaseStore;
use wingman::telegram::TelegramClient;

/// Telegram dating-coach bot backed by Claude and a Supabase knowledge base.
#[derive(Parser)]
#[command(name = "wingman")]
struct Cli {
    /// Model to use for screenshot analysis.
    #[arg(long)]
    model: Option<String>,

    /// Maximum tokens per coaching reply.
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Long-poll timeout for getUpdates, in seconds.
    #[arg(long)]
    poll_timeout: Option<u64>,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(max_tokens) = cli.max_tokens {
        config.max_reply_tokens = max_tokens;
    }
    if let Some(poll_timeout) = cli.poll_timeout {
        config.poll_timeout_secs = poll_timeout;
    }

    let telegram = match TelegramClient::new(&config.telegram_token) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: failed to create Telegram client: {e}");
            std::process::exit(1);
        }
    };
    let knowledge = match SupabaseStore::new(&config.supabase_url, &config.supabase_key) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: failed to create knowledge store: {e}");
            std::process::exit(1);
        }
    };
    let model = match AnthropicClient::new(&config.anthropic_api_key) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: failed to create model client: {e}");
            std::process::exit(1);
        }
    }
    .with_model(config.model.clone())
    .with_max_tokens(config.max_reply_tokens);

    let bot = Bot::new(&telegram, &knowledge, &model)
        .with_allowed_user(config.allowed_user_id)
        .with_poll_timeout(config.poll_timeout_secs);

    if let Err(e) = bot.run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
