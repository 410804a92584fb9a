//! Data types exchanged between pipeline stages.

use std::fmt;
use std::path::PathBuf;

/// Status shown after every completed search.
pub const READY_STATUS: &str = "Ready. Speak your next command.";

/// Status shown when a transcript contained only stopwords.
pub const NO_KEYWORDS_STATUS: &str = "Could not find keywords. Please try again.";

/// Status shown before a recognizer session is reopened.
pub const RECONNECTING_STATUS: &str = "Reconnecting to speech recognizer...";

/// A fixed-duration slice of 16-bit mono PCM audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// PCM samples (16-bit signed integers).
    pub samples: Vec<i16>,
    /// Sample rate of `samples` in Hz.
    pub sample_rate: u32,
    /// Sequence number for ordering, starting at 0.
    pub sequence: u64,
}

impl AudioChunk {
    pub fn new(samples: Vec<i16>, sample_rate: u32, sequence: u64) -> Self {
        Self {
            samples,
            sample_rate,
            sequence,
        }
    }

    /// Duration of the chunk in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000 / self.sample_rate as u64) as u32
    }
}

/// Item on the audio queue. `EndOfStream` is sent exactly once, last.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    Chunk(AudioChunk),
    /// The device could not be started or stopped delivering audio.
    Failed(String),
    EndOfStream,
}

/// A recognizer hypothesis. Partial events may be revised; a final event is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    pub text: String,
    pub is_final: bool,
}

impl TranscriptEvent {
    pub fn partial(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }
}

/// Item on the transcript queue, from transcription to the search station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptFeed {
    /// A finalized utterance.
    Final(String),
    /// The recognizer session failed; the transcription stage is waiting
    /// for a [`SessionControl`] decision.
    Fault(String),
    /// Audio capture broke; no restart is possible.
    CaptureFailed(String),
    /// No more transcripts will follow.
    Closed,
}

/// Decision sent back to the transcription stage after a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    Restart,
    Stop,
}

/// A phrase and result count handed to the search engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub phrase: String,
    pub top_k: usize,
}

/// Outward message for the presentation layer, in production order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineMessage {
    Status(String),
    Results(Vec<PathBuf>),
}

impl PipelineMessage {
    pub fn status(text: impl Into<String>) -> Self {
        Self::Status(text.into())
    }

    pub fn searching(phrase: &str) -> Self {
        Self::Status(format!("Searching for: {phrase}"))
    }

    pub fn ready() -> Self {
        Self::status(READY_STATUS)
    }

    pub fn no_keywords() -> Self {
        Self::status(NO_KEYWORDS_STATUS)
    }

    pub fn search_failed(error: impl fmt::Display) -> Self {
        Self::Status(format!("Search failed: {error}"))
    }

    pub fn voice_error(message: &str) -> Self {
        Self::Status(format!("Voice error: {message}"))
    }

    pub fn reconnecting() -> Self {
        Self::status(RECONNECTING_STATUS)
    }
}
