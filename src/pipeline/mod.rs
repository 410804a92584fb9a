//! Live voice search pipeline.
//!
//! Capture, transcription and search each run in their own thread,
//! connected by unbounded crossbeam channels. Messages flow one way; the
//! only back edge is the session control channel used to restart a failed
//! recognizer.

pub mod error;
pub mod orchestrator;
pub mod search_station;
pub mod station;
pub mod transcription;
pub mod types;

pub use error::{CollectingReporter, ErrorReporter, LogReporter, StationError};
pub use orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
pub use search_station::SearchStation;
pub use station::{Station, StationRunner};
pub use transcription::{TranscriptionStation, TranscriptionState};
pub use types::{
    AudioChunk, CaptureEvent, PipelineMessage, SearchQuery, SessionControl, TranscriptEvent,
    TranscriptFeed,
};
