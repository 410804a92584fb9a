//! Transcription station: drives a streaming recognizer session from the
//! audio queue and forwards final transcripts.
//!
//! States: `Idle → Streaming → (Closed | Errored)`, and `Errored → Streaming`
//! when the orchestrator asks for a restart. The station never retries on
//! its own.

use crate::pipeline::error::{StationError, eprintln_clear};
use crate::pipeline::station::Station;
use crate::pipeline::types::{AudioChunk, CaptureEvent, SessionControl, TranscriptFeed};
use crate::stt::recognizer::{RecognizerSession, StreamingRecognizer};
use crossbeam_channel::{Receiver, TryRecvError};
use std::sync::Arc;

/// Lifecycle of the recognizer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptionState {
    /// No session opened yet.
    Idle,
    /// A session is open and receiving audio.
    Streaming,
    /// The last session failed; waiting for a [`SessionControl`].
    Errored,
    /// End of stream reached or stop requested.
    Closed,
}

pub struct TranscriptionStation {
    recognizer: Arc<dyn StreamingRecognizer>,
    control_rx: Receiver<SessionControl>,
    session: Option<Box<dyn RecognizerSession>>,
    state: TranscriptionState,
    echo_partials: bool,
    verbose: bool,
    discarded_chunks: u64,
}

impl TranscriptionStation {
    pub fn new(recognizer: Arc<dyn StreamingRecognizer>, control_rx: Receiver<SessionControl>) -> Self {
        Self {
            recognizer,
            control_rx,
            session: None,
            state: TranscriptionState::Idle,
            echo_partials: false,
            verbose: false,
            discarded_chunks: 0,
        }
    }

    /// Show partial transcripts on stderr as they arrive.
    pub fn with_echo_partials(mut self, echo: bool) -> Self {
        self.echo_partials = echo;
        self
    }

    /// Configure whether to enable diagnostic output to stderr.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn state(&self) -> TranscriptionState {
        self.state
    }

    /// Chunks dropped while waiting for a restart decision.
    pub fn discarded_chunks(&self) -> u64 {
        self.discarded_chunks
    }

    fn open_session(&mut self) -> Option<TranscriptFeed> {
        match self.recognizer.open_session() {
            Ok(session) => {
                if self.verbose {
                    eprintln_clear(&format!("  [session opened: {}]", self.recognizer.name()));
                }
                self.session = Some(session);
                self.state = TranscriptionState::Streaming;
                None
            }
            Err(e) => Some(self.fail(e.to_string())),
        }
    }

    fn fail(&mut self, message: String) -> TranscriptFeed {
        self.session = None;
        self.state = TranscriptionState::Errored;
        TranscriptFeed::Fault(message)
    }

    fn close(&mut self) -> TranscriptFeed {
        // A dangling partial utterance is dropped with the session.
        self.session = None;
        self.state = TranscriptionState::Closed;
        TranscriptFeed::Closed
    }

    fn feed(&mut self, chunk: &AudioChunk) -> Vec<TranscriptFeed> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        match session.feed(chunk) {
            Ok(events) => events
                .into_iter()
                .filter_map(|event| {
                    if event.is_final {
                        if self.echo_partials {
                            crate::output::clear_line();
                        }
                        Some(TranscriptFeed::Final(event.text))
                    } else {
                        if self.echo_partials {
                            crate::output::render_partial(&event.text);
                        }
                        None
                    }
                })
                .collect(),
            Err(e) => vec![self.fail(e.to_string())],
        }
    }

    /// Pending decision from the orchestrator, if one arrived.
    fn poll_control(&mut self) -> Option<SessionControl> {
        match self.control_rx.try_recv() {
            Ok(control) => Some(control),
            Err(TryRecvError::Empty) => None,
            // Orchestrator is gone; nobody will ever ask for a restart.
            Err(TryRecvError::Disconnected) => Some(SessionControl::Stop),
        }
    }
}

impl Station for TranscriptionStation {
    type Input = CaptureEvent;
    type Output = TranscriptFeed;

    fn name(&self) -> &'static str {
        "transcription"
    }

    fn process(&mut self, event: CaptureEvent) -> Result<Vec<TranscriptFeed>, StationError> {
        let chunk = match event {
            CaptureEvent::EndOfStream => {
                if self.state == TranscriptionState::Closed {
                    return Ok(Vec::new());
                }
                return Ok(vec![self.close()]);
            }
            CaptureEvent::Failed(message) => {
                if self.verbose {
                    eprintln_clear(&format!("  [capture failed: {message}]"));
                }
                return Ok(vec![TranscriptFeed::CaptureFailed(message)]);
            }
            CaptureEvent::Chunk(chunk) => chunk,
        };

        match self.state {
            TranscriptionState::Closed => Ok(Vec::new()),
            TranscriptionState::Idle => {
                if let Some(fault) = self.open_session() {
                    return Ok(vec![fault]);
                }
                Ok(self.feed(&chunk))
            }
            TranscriptionState::Streaming => Ok(self.feed(&chunk)),
            TranscriptionState::Errored => match self.poll_control() {
                Some(SessionControl::Restart) => {
                    if let Some(fault) = self.open_session() {
                        return Ok(vec![fault]);
                    }
                    Ok(self.feed(&chunk))
                }
                Some(SessionControl::Stop) => Ok(vec![self.close()]),
                None => {
                    self.discarded_chunks += 1;
                    Ok(Vec::new())
                }
            },
        }
    }

    fn is_finished(&self) -> bool {
        self.state == TranscriptionState::Closed
    }

    fn shutdown(&mut self) {
        self.session = None;
        if self.verbose && self.discarded_chunks > 0 {
            eprintln_clear(&format!(
                "  [dropped {} audio chunks while the recognizer was down]",
                self.discarded_chunks
            ));
        }
    }
}
