//! voxim - Voice-activated image search
//!
//! Speak a description, get the closest images from a pre-built embedding
//! index. Offline index building, exact cosine search and a live
//! capture → transcription → search pipeline.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod embed;
pub mod error;
pub mod index;
pub mod keywords;
pub mod output;
pub mod pipeline;
pub mod search;
pub mod stt;

// Composition root - needs everything
#[cfg(feature = "cli")]
pub mod app;

// Core traits (source → recognize → search)
pub use audio::AudioSource;
pub use embed::Encoder;
pub use keywords::Lemmatizer;
pub use stt::{RecognizerSession, StreamingRecognizer, Transcriber};

// Index and search
pub use index::{CorpusMap, IndexBuilder, LoadedIndex, VectorStore};
pub use search::{SearchEngine, SearchHit};

// Pipeline
pub use pipeline::orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
pub use pipeline::types::PipelineMessage;

// Error handling
pub use error::{Result, VoximError};

// Config
pub use config::Config;

// Station framework (for advanced users)
pub use pipeline::error::{ErrorReporter, StationError};
pub use pipeline::station::Station;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
