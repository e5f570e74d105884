//! MindScope CLI — the main entry point.
//!
//! Commands:
//! - `onboard`  — Write a default config file
//! - `chat`     — Interactive chat, optionally in assessment mode
//! - `analyze`  — Run one pre-classified turn from JSON
//! - `status`   — Show the effective configuration
//! - `doctor`   — Diagnose config and backend health

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "mindscope",
    about = "MindScope — multimodal emotional-support companion",
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
    /// Initialize configuration
    Onboard,

    /// Chat with MindScope
    Chat {
        /// Start in guided assessment mode
        #[arg(short, long)]
        assessment: bool,

        /// Resume a specific session id
        #[arg(short, long)]
        session: Option<String>,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Process one pre-classified turn and print the result as JSON
    Analyze {
        /// Path to the turn JSON, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: PathBuf,
    },

    /// Show system status
    Status,

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat {
            assessment,
            session,
            message,
        } => commands::chat::run(assessment, session, message).await?,
        Commands::Analyze { input } => commands::analyze::run(input).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
