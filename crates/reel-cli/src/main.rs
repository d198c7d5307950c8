//! Reel CLI - Headless Stories Player
//!
//! Features:
//! - Story collection inspection per device tier
//! - Real-time playback through the session host
//! - Seen-set listing and reset
//! - Share link generation

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

/// Reel CLI - Stories engine toolkit
#[derive(Parser)]
#[command(name = "reel-cli")]
#[command(author = "Purple Squirrel Media")]
#[command(version)]
#[command(about = "Inspect and play story collections headlessly", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "table")]
    format: String,

    /// Widget configuration file (JSON); the demo collection when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every item with the sources chosen for a device
    Inspect {
        /// Device tier (mobile, desktop)
        #[arg(short, long, default_value = "mobile")]
        tier: String,

        /// Assume native streaming playback
        #[arg(long)]
        native: bool,

        /// Assume the streaming library is available
        #[arg(long)]
        library: bool,
    },

    /// Play a collection in real time
    Play {
        /// Story to open
        #[arg(short, long, default_value = "0")]
        story: usize,

        /// Persist seen stories and engagement to this file
        #[arg(long, default_value = "reel-store.json")]
        store: PathBuf,

        /// Simulated media load latency in milliseconds
        #[arg(long, default_value = "150")]
        latency_ms: u64,

        /// Simulated video duration in seconds
        #[arg(long, default_value = "5.0")]
        video_seconds: f64,

        /// Make loads of this URL fail (repeatable)
        #[arg(long)]
        fail: Vec<String>,

        /// Fetch media and warm-up URLs over HTTP instead of simulating
        #[arg(long)]
        http: bool,
    },

    /// List or clear the persisted seen-set
    Seen {
        /// Store file
        #[arg(long, default_value = "reel-store.json")]
        store: PathBuf,

        #[command(subcommand)]
        action: SeenAction,
    },

    /// Print the share payload and messaging link for the product
    Share,
}

#[derive(Subcommand)]
enum SeenAction {
    /// Show viewed story indices
    List,
    /// Forget every viewed story
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if cli.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    reel_core::init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Inspect { tier, native, library } => {
            commands::inspect(&config, &tier, native, library, &cli.format)?;
        }
        Commands::Play { story, store, latency_ms, video_seconds, fail, http } => {
            let options = commands::PlayOptions {
                story,
                store,
                latency_ms,
                video_seconds,
                fail,
                http,
            };
            commands::play(config, options).await?;
        }
        Commands::Seen { store, action } => match action {
            SeenAction::List => commands::seen_list(&store, &cli.format)?,
            SeenAction::Clear => commands::seen_clear(&store)?,
        },
        Commands::Share => {
            commands::share(config, &cli.format)?;
        }
    }

    Ok(())
}
