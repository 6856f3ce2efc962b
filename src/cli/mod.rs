//! CLI module for Innsikt.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Innsikt - Interview transcription and analysis service
///
/// A self-hosted service that transcribes uploaded interviews, generates
/// AI summaries and sentiment analysis, and answers questions about them.
/// The name "Innsikt" comes from the Norwegian word for "insight."
#[derive(Parser, Debug)]
#[command(name = "innsikt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Innsikt and verify system requirements
    Init,

    /// Check system requirements and configuration
    Doctor,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run the full pipeline on a local media file and print the results
    Process {
        /// Path to an audio/video file
        file: String,

        /// Skip the summary and analysis steps
        #[arg(long)]
        transcript_only: bool,
    },

    /// List processed records
    List,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "summary.model")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
