use crate::error::{Result, VoximError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (microphone, WAV file, mock).
/// Samples are 16-bit mono PCM at the rate the source was opened with.
pub trait AudioSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio and release the device.
    fn stop(&mut self) -> Result<()>;

    /// Read whatever samples arrived since the last call.
    ///
    /// An empty vector means "nothing yet" for live sources and
    /// "exhausted" for finite ones.
    fn read_samples(&mut self) -> Result<Vec<i16>>;

    /// Whether the source ends on its own (files, scripted mocks).
    fn is_finite(&self) -> bool {
        false
    }
}

/// Mock audio source for testing.
///
/// Either returns the same samples on every read (live behaviour), or plays a
/// script of reads once and then reports exhaustion (finite behaviour).
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    is_started: bool,
    samples: Vec<i16>,
    script: Option<VecDeque<Vec<i16>>>,
    should_fail_start: bool,
    should_fail_stop: bool,
    should_fail_read: bool,
    error_message: String,
    stopped: Arc<AtomicBool>,
    stop_calls: Arc<AtomicUsize>,
}

impl MockAudioSource {
    /// Create a new mock audio source with default settings
    pub fn new() -> Self {
        Self {
            is_started: false,
            samples: vec![0i16; 160],
            script: None,
            should_fail_start: false,
            should_fail_stop: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
            stopped: Arc::new(AtomicBool::new(false)),
            stop_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the mock to return specific samples on every read
    pub fn with_samples(mut self, samples: Vec<i16>) -> Self {
        self.samples = samples;
        self
    }

    /// Play these reads in order, then report exhaustion.
    ///
    /// Makes the source finite.
    pub fn with_reads(mut self, reads: Vec<Vec<i16>>) -> Self {
        self.script = Some(reads.into());
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on stop
    pub fn with_stop_failure(mut self) -> Self {
        self.should_fail_stop = true;
        self
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Configure the error message for failures
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Check if the audio source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }

    /// Shared flag set once `stop()` has been called, observable after the
    /// source has been moved into a capture thread.
    pub fn stopped_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }

    /// Shared counter of `stop()` calls.
    pub fn stop_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.stop_calls)
    }

    fn failure(&self) -> VoximError {
        VoximError::AudioCapture {
            message: self.error_message.clone(),
        }
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(self.failure())
        } else {
            self.is_started = true;
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail_stop {
            Err(self.failure())
        } else {
            self.is_started = false;
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            return Err(self.failure());
        }
        match self.script.as_mut() {
            Some(script) => Ok(script.pop_front().unwrap_or_default()),
            None => Ok(self.samples.clone()),
        }
    }

    fn is_finite(&self) -> bool {
        self.script.is_some()
    }
}
