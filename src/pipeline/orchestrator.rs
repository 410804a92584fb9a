//! Live pipeline: capture → transcription → keyword extraction → search.
//!
//! Three threads connected by unbounded crossbeam channels. The search
//! station is the only consumer of final transcripts, so searches never
//! overlap and results come out in transcript order. Stopping clears the
//! running flag; the capture stage then queues its end-of-stream sentinel,
//! which drains through every station before the threads exit.

use crate::audio::capture::{CaptureConfig, CaptureStage};
use crate::audio::source::AudioSource;
use crate::defaults;
use crate::error::{Result, VoximError};
use crate::keywords::KeywordExtractor;
use crate::pipeline::error::{ErrorReporter, LogReporter};
use crate::pipeline::search_station::SearchStation;
use crate::pipeline::station::StationRunner;
use crate::pipeline::transcription::TranscriptionStation;
use crate::pipeline::types::PipelineMessage;
use crate::search::SearchEngine;
use crate::stt::recognizer::StreamingRecognizer;
use crossbeam_channel::{Receiver, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sample rate of captured audio
    pub sample_rate: u32,
    /// Duration of one audio chunk
    pub chunk_ms: u32,
    /// Results per spoken query
    pub top_k: usize,
    /// Consecutive recognizer faults answered with a new session
    pub max_session_restarts: u32,
    /// Show partial transcripts on stderr
    pub echo_partials: bool,
    /// Verbosity level (0=quiet results, 1=status detail, 2=full diagnostics)
    pub verbosity: u8,
    /// Suppress output messages
    pub quiet: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            chunk_ms: defaults::CHUNK_MS,
            top_k: defaults::LIVE_TOP_K,
            max_session_restarts: defaults::MAX_SESSION_RESTARTS,
            echo_partials: false,
            verbosity: 0,
            quiet: false,
        }
    }
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    /// Flag to signal shutdown
    running: Arc<AtomicBool>,
    /// Join handles for spawned threads
    threads: Vec<JoinHandle<()>>,
    /// Outward message stream
    messages: Receiver<PipelineMessage>,
}

impl PipelineHandle {
    /// Ordered status/results stream for the presentation layer.
    ///
    /// Disconnects once the search station has drained its queue.
    pub fn messages(&self) -> Receiver<PipelineMessage> {
        self.messages.clone()
    }

    /// Stops capture and waits for every queued transcript to be handled.
    ///
    /// In-flight work is never cut short.
    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        self.wait();
    }

    /// Waits for the pipeline to end on its own (finite sources, or a
    /// recognizer that gave up).
    pub fn wait(mut self) {
        for handle in self.threads.drain(..) {
            if let Err(panic_info) = handle.join() {
                let msg = panic_info
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                    .unwrap_or("unknown panic");
                eprintln!("voxim: pipeline thread panicked: {msg}");
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// Returns true if the pipeline is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.threads.iter().any(|t| !t.is_finished())
    }
}

/// Voice search pipeline: AudioSource → Recognizer → Extractor → SearchEngine.
pub struct Pipeline {
    config: PipelineConfig,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl Pipeline {
    /// Creates a new pipeline with default error reporter.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            error_reporter: Arc::new(LogReporter),
        }
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Starts the pipeline.
    ///
    /// # Errors
    /// `ConfigInvalidValue` for a zero sample rate, chunk duration or
    /// `top_k`. Device and recognizer failures happen on the pipeline's own
    /// threads and surface as status messages.
    pub fn start(
        self,
        audio_source: Box<dyn AudioSource>,
        recognizer: Arc<dyn StreamingRecognizer>,
        extractor: KeywordExtractor,
        engine: Arc<SearchEngine>,
    ) -> Result<PipelineHandle> {
        self.validate()?;

        let running = Arc::new(AtomicBool::new(true));

        let (audio_tx, audio_rx) = unbounded();
        let (transcript_tx, transcript_rx) = unbounded();
        let (message_tx, message_rx) = unbounded();
        let (control_tx, control_rx) = unbounded();

        let transcription = TranscriptionStation::new(recognizer, control_rx)
            .with_echo_partials(self.config.echo_partials && !self.config.quiet)
            .with_verbose(self.config.verbosity >= 2);

        let search = SearchStation::new(extractor, engine, control_tx, message_tx.clone())
            .with_top_k(self.config.top_k)
            .with_max_restarts(self.config.max_session_restarts)
            .with_verbosity(if self.config.quiet { 0 } else { self.config.verbosity });

        let search_runner = StationRunner::spawn(
            search,
            transcript_rx,
            message_tx,
            self.error_reporter.clone(),
        );
        let transcription_runner = StationRunner::spawn(
            transcription,
            audio_rx,
            transcript_tx,
            self.error_reporter.clone(),
        );

        let capture = CaptureStage::spawn(
            audio_source,
            CaptureConfig {
                sample_rate: self.config.sample_rate,
                chunk_ms: self.config.chunk_ms,
                verbose: self.config.verbosity >= 1 && !self.config.quiet,
                ..CaptureConfig::default()
            },
            audio_tx,
            running.clone(),
        );

        let verbose = self.config.verbosity >= 2;
        let threads = vec![
            thread::spawn(move || match capture.join() {
                Ok(exit) if verbose => eprintln!("voxim: capture ended: {exit:?}"),
                Ok(_) => {}
                Err(msg) => eprintln!("voxim: {msg}"),
            }),
            thread::spawn(move || {
                if let Err(msg) = transcription_runner.join() {
                    eprintln!("voxim: {msg}");
                }
            }),
            thread::spawn(move || {
                if let Err(msg) = search_runner.join() {
                    eprintln!("voxim: {msg}");
                }
            }),
        ];

        Ok(PipelineHandle {
            running,
            threads,
            messages: message_rx,
        })
    }

    fn validate(&self) -> Result<()> {
        let invalid = |key: &str| VoximError::ConfigInvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        };
        if self.config.sample_rate == 0 {
            return Err(invalid("audio.sample_rate"));
        }
        if self.config.chunk_ms == 0 {
            return Err(invalid("audio.chunk_ms"));
        }
        if self.config.top_k == 0 {
            return Err(invalid("search.top_k"));
        }
        Ok(())
    }
}
