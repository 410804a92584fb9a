//! Command-line interface for voxim
//!
//! Provides argument parsing using clap derive macros.

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Voice-activated image search
#[derive(Parser, Debug)]
#[command(name = "voxim", version, about = "Voice-activated image search")]
pub struct Cli {
    /// Subcommand to execute (default: listen)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress status output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: status detail, -vv: full diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Options for the live voice search pipeline.
#[derive(Args, Debug, Default, Clone, PartialEq)]
pub struct ListenArgs {
    /// Audio input device (e.g., hw:0)
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Path to the Whisper model file
    #[arg(long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Read speech from a WAV file instead of the microphone
    #[arg(long, value_name = "FILE")]
    pub wav: Option<PathBuf>,

    /// Results per spoken query
    #[arg(long, short = 'k', value_name = "N")]
    pub top_k: Option<usize>,

    /// Index file to search
    #[arg(long, value_name = "PATH")]
    pub index: Option<PathBuf>,

    /// Stop listening after this long. Examples: 30s, 5m, 1h30m
    #[arg(long = "for", value_name = "DURATION", value_parser = parse_duration)]
    pub duration: Option<Duration>,
}

/// Parse a duration string.
///
/// Supports any duration format accepted by `humantime`: bare numbers (seconds),
/// single-unit (`30s`, `5m`, `2h`), and compound (`1h30m`, `2m30s`).
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    // Bare number → seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a search index from a directory of images
    Index {
        /// Directory to scan for images
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Where to write the index (default: configured index path)
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Images sent to the encoder per request
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,
    },

    /// Search the index with a text query
    Search {
        /// Query text
        #[arg(required = true, value_name = "QUERY")]
        query: Vec<String>,

        /// Number of results
        #[arg(long, short = 'k', value_name = "N")]
        top_k: Option<usize>,

        /// Index file to search
        #[arg(long, value_name = "PATH")]
        index: Option<PathBuf>,

        /// Reduce the query to keywords first, as the voice pipeline does
        #[arg(long)]
        keywords: bool,
    },

    /// Listen to the microphone and search for what is said
    Listen(ListenArgs),

    /// Print the search phrase extracted from a sentence
    Keywords {
        /// Sentence to reduce
        #[arg(required = true, value_name = "TEXT")]
        text: Vec<String>,
    },

    /// List available audio input devices
    Devices,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
