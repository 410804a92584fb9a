//! Audio input: sources and the capture stage that chunks them.

pub mod capture;
#[cfg(feature = "cpal-audio")]
pub mod microphone;
pub mod source;
pub mod wav;

pub use capture::{CaptureConfig, CaptureExit, CaptureStage};
pub use source::{AudioSource, MockAudioSource};
pub use wav::WavAudioSource;
