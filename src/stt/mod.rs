//! Speech recognition: the streaming contract, utterance segmentation and
//! the local Whisper backend.

pub mod recognizer;
pub mod segmenter;
pub mod transcriber;
pub mod whisper;

pub use recognizer::{
    MockRecognizer, MockStep, RecognizerSession, SegmentingRecognizer, StreamingRecognizer,
};
pub use segmenter::{SegmenterConfig, UtteranceSegmenter};
pub use transcriber::{MockTranscriber, Transcriber};
pub use whisper::{WhisperConfig, WhisperTranscriber};
