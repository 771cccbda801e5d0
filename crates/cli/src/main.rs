//! Dendrite CLI — the main entry point.
//!
//! Commands:
//! - `init`   — Write a default config file
//! - `send`   — Send a message to a chat and stream the reply
//! - `chats`  — List stored chats

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "dendrite",
    about = "Dendrite — conversational assistant runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init,

    /// Send a message to a chat and stream the reply
    Send {
        /// The message text
        message: String,

        /// Continue an existing chat instead of starting a new one
        #[arg(short, long)]
        chat: Option<String>,
    },

    /// List stored chats
    Chats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await,
        Commands::Send { message, chat } => commands::send::run(message, chat).await,
        Commands::Chats => commands::chats::run().await,
    }
}
