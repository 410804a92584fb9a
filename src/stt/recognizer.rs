//! Streaming speech recognition contract.
//!
//! A recognizer opens sessions; a session is fed audio chunks in order and
//! answers each with zero or more partial events and at most one final
//! event. Faults are [`VoximError::Recognizer`] errors and end the session.

use crate::error::{Result, VoximError};
use crate::pipeline::types::{AudioChunk, TranscriptEvent};
use crate::stt::segmenter::{Segment, SegmenterConfig, UtteranceSegmenter};
use crate::stt::transcriber::Transcriber;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Factory for recognition sessions.
pub trait StreamingRecognizer: Send + Sync {
    /// Open a new session. A failure here counts as a session fault.
    fn open_session(&self) -> Result<Box<dyn RecognizerSession>>;

    /// Recognizer name for status output.
    fn name(&self) -> &str;
}

impl<T: StreamingRecognizer + ?Sized> StreamingRecognizer for Arc<T> {
    fn open_session(&self) -> Result<Box<dyn RecognizerSession>> {
        (**self).open_session()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// One live recognition session.
pub trait RecognizerSession: Send {
    /// Forward one chunk and collect the events it produced.
    fn feed(&mut self, chunk: &AudioChunk) -> Result<Vec<TranscriptEvent>>;
}

/// What a [`MockRecognizer`] session does with the next fed chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum MockStep {
    Events(Vec<TranscriptEvent>),
    Fault(String),
}

/// Scripted recognizer for testing.
///
/// Every fed chunk consumes one step of a script shared by all sessions;
/// once the script is empty, chunks produce no events.
#[derive(Debug, Clone)]
pub struct MockRecognizer {
    script: Arc<Mutex<VecDeque<MockStep>>>,
    open_failure: Option<String>,
    sessions: Arc<AtomicUsize>,
    chunks: Arc<AtomicUsize>,
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            open_failure: None,
            sessions: Arc::new(AtomicUsize::new(0)),
            chunks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Append a step to the script.
    pub fn with_step(self, step: MockStep) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
        self
    }

    /// One chunk producing these events.
    pub fn with_events(self, events: Vec<TranscriptEvent>) -> Self {
        self.with_step(MockStep::Events(events))
    }

    /// One chunk producing a single final transcript.
    pub fn with_final(self, text: &str) -> Self {
        self.with_events(vec![TranscriptEvent::final_text(text)])
    }

    /// One chunk producing nothing.
    pub fn with_silence(self) -> Self {
        self.with_events(Vec::new())
    }

    /// One chunk failing the session.
    pub fn with_fault(self, message: &str) -> Self {
        self.with_step(MockStep::Fault(message.to_string()))
    }

    /// Make `open_session` fail.
    pub fn with_open_failure(mut self, message: &str) -> Self {
        self.open_failure = Some(message.to_string());
        self
    }

    /// Sessions opened so far.
    pub fn sessions_opened(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// Chunks fed across all sessions.
    pub fn chunks_fed(&self) -> usize {
        self.chunks.load(Ordering::SeqCst)
    }
}

impl Default for MockRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingRecognizer for MockRecognizer {
    fn open_session(&self) -> Result<Box<dyn RecognizerSession>> {
        if let Some(message) = &self.open_failure {
            return Err(VoximError::Recognizer {
                message: message.clone(),
            });
        }
        self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            script: Arc::clone(&self.script),
            chunks: Arc::clone(&self.chunks),
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct MockSession {
    script: Arc<Mutex<VecDeque<MockStep>>>,
    chunks: Arc<AtomicUsize>,
}

impl RecognizerSession for MockSession {
    fn feed(&mut self, _chunk: &AudioChunk) -> Result<Vec<TranscriptEvent>> {
        self.chunks.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .map_err(|_| VoximError::Recognizer {
                message: "mock script lock poisoned".to_string(),
            })?
            .pop_front();

        match step {
            Some(MockStep::Events(events)) => Ok(events),
            Some(MockStep::Fault(message)) => Err(VoximError::Recognizer { message }),
            None => Ok(Vec::new()),
        }
    }
}

/// Local streaming recognizer: segments the stream into utterances and
/// transcribes each completed one as a final event.
pub struct SegmentingRecognizer {
    transcriber: Arc<dyn Transcriber>,
    segmenter: SegmenterConfig,
    partial_interval_ms: u32,
    name: String,
}

impl SegmentingRecognizer {
    pub fn new(transcriber: Arc<dyn Transcriber>, segmenter: SegmenterConfig) -> Self {
        let name = transcriber.model_name().to_string();
        Self {
            transcriber,
            segmenter,
            partial_interval_ms: 0,
            name,
        }
    }

    /// Re-transcribe the open utterance every `ms` of audio and emit the
    /// text as a partial event. Zero disables partials.
    pub fn with_partial_interval_ms(mut self, ms: u32) -> Self {
        self.partial_interval_ms = ms;
        self
    }
}

impl StreamingRecognizer for SegmentingRecognizer {
    fn open_session(&self) -> Result<Box<dyn RecognizerSession>> {
        let partial_samples = if self.partial_interval_ms == 0 {
            None
        } else {
            Some(crate::defaults::chunk_samples(
                self.segmenter.sample_rate,
                self.partial_interval_ms,
            ))
        };
        Ok(Box::new(SegmentingSession {
            transcriber: Arc::clone(&self.transcriber),
            segmenter: UtteranceSegmenter::new(self.segmenter),
            partial_samples,
            last_partial_at: 0,
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct SegmentingSession {
    transcriber: Arc<dyn Transcriber>,
    segmenter: UtteranceSegmenter,
    partial_samples: Option<usize>,
    last_partial_at: usize,
}

impl SegmentingSession {
    fn partial(&mut self) -> Result<Option<TranscriptEvent>> {
        let Some(interval) = self.partial_samples.filter(|&n| n > 0) else {
            return Ok(None);
        };
        let open = self.segmenter.current().len();
        if open < self.last_partial_at + interval {
            return Ok(None);
        }
        self.last_partial_at = open;
        let text = self.transcriber.transcribe(self.segmenter.current())?;
        let text = text.trim();
        Ok((!text.is_empty()).then(|| TranscriptEvent::partial(text)))
    }
}

impl RecognizerSession for SegmentingSession {
    fn feed(&mut self, chunk: &AudioChunk) -> Result<Vec<TranscriptEvent>> {
        match self.segmenter.push(&chunk.samples) {
            Segment::Silence => Ok(Vec::new()),
            Segment::Open => Ok(self.partial()?.into_iter().collect()),
            Segment::Discarded => {
                self.last_partial_at = 0;
                Ok(Vec::new())
            }
            Segment::Complete(audio) => {
                self.last_partial_at = 0;
                let text = self.transcriber.transcribe(&audio)?;
                let text = text.trim();
                if text.is_empty() {
                    Ok(Vec::new())
                } else {
                    Ok(vec![TranscriptEvent::final_text(text)])
                }
            }
        }
    }
}
