use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "splitpoint")]
#[command(author, version, about = "Split large MP3/WAV files at frame-accurate boundaries")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse an audio file and display its metadata
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute split points for a file
    Plan {
        /// File to plan
        #[arg(required = true)]
        file: PathBuf,

        /// Target segment duration in seconds (overrides config)
        #[arg(short, long)]
        segment_secs: Option<f64>,

        /// Maximum bytes per segment (overrides config)
        #[arg(long)]
        max_bytes: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a playable segment between two times
    Extract {
        /// Source file
        #[arg(required = true)]
        file: PathBuf,

        /// Start time in seconds
        #[arg(long)]
        start: f64,

        /// End time in seconds
        #[arg(long)]
        end: f64,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List registered formats in detection order
    Formats,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
