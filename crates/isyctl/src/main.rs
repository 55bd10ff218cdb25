//! ISY Control - CLI client for the tutor command center.
//!
//! Sends natural-language tutor commands to the isyd daemon and renders
//! the answer, processing stats and execution timeline.

mod client;
mod commands;
mod display;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "isyctl")]
#[command(about = "ISY Tutor Command Center - manage students with natural language", long_about = None)]
#[command(version)]
struct Cli {
    /// Base URL of the isyd server
    #[arg(long, global = true, default_value = "http://127.0.0.1:8000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a natural-language tutor command to the daemon
    Ask {
        /// The command, in plain language (quotes optional)
        prompt: Vec<String>,

        /// Show the step-by-step execution timeline
        #[arg(long)]
        logs: bool,
    },

    /// Check daemon health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ask { prompt, logs } => commands::ask(&cli.server, prompt, logs).await,
        Commands::Health => commands::health(&cli.server).await,
    }
}
