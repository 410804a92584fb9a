//! Search station: the single consumer of final transcripts.
//!
//! Processes one transcript at a time, so at most one search is ever in
//! flight and results are published in the order transcripts arrived. The
//! "Searching for" status goes straight onto the message channel before the
//! search runs; everything else is returned to the runner.

use crate::error::VoximError;
use crate::keywords::KeywordExtractor;
use crate::pipeline::error::{StationError, eprintln_clear};
use crate::pipeline::station::Station;
use crate::pipeline::types::{PipelineMessage, SearchQuery, SessionControl, TranscriptFeed};
use crate::search::SearchEngine;
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::time::Instant;

/// Status published when the restart budget is spent.
pub const VOICE_STOPPED_STATUS: &str = "Voice input stopped after repeated recognizer failures.";

pub struct SearchStation {
    extractor: KeywordExtractor,
    engine: Arc<SearchEngine>,
    control_tx: Sender<SessionControl>,
    status_tx: Sender<PipelineMessage>,
    top_k: usize,
    max_restarts: u32,
    restarts_used: u32,
    verbosity: u8,
    finished: bool,
}

impl SearchStation {
    pub fn new(
        extractor: KeywordExtractor,
        engine: Arc<SearchEngine>,
        control_tx: Sender<SessionControl>,
        status_tx: Sender<PipelineMessage>,
    ) -> Self {
        Self {
            extractor,
            engine,
            control_tx,
            status_tx,
            top_k: crate::defaults::LIVE_TOP_K,
            max_restarts: crate::defaults::MAX_SESSION_RESTARTS,
            restarts_used: 0,
            verbosity: 0,
            finished: false,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Consecutive recognizer faults answered with a restart.
    pub fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    fn on_final(&mut self, transcript: &str) -> Vec<PipelineMessage> {
        // A recognized utterance means the session is healthy again.
        self.restarts_used = 0;

        if self.verbosity >= 1 {
            eprintln_clear(&format!("  heard: \"{}\"", transcript.trim()));
        }

        let phrase = match self.extractor.extract(transcript) {
            Ok(phrase) => phrase,
            Err(VoximError::NoKeywords) => return vec![PipelineMessage::no_keywords()],
            Err(e) => return vec![PipelineMessage::search_failed(e)],
        };

        let query = SearchQuery {
            phrase,
            top_k: self.top_k,
        };
        // Published now so the consumer can show it while the search runs.
        if self.status_tx.send(PipelineMessage::searching(&query.phrase)).is_err()
            && self.verbosity >= 2
        {
            eprintln_clear("  [message consumer gone, searching anyway]");
        }

        let mut messages = Vec::with_capacity(2);
        let start = Instant::now();
        match self.engine.search(&query.phrase, query.top_k) {
            Ok(paths) => {
                if self.verbosity >= 2 {
                    eprintln_clear(&format!(
                        "  [search '{}': {} results in {}ms]",
                        query.phrase,
                        paths.len(),
                        start.elapsed().as_millis()
                    ));
                }
                messages.push(PipelineMessage::Results(paths));
            }
            Err(e) => messages.push(PipelineMessage::search_failed(e)),
        }
        messages.push(PipelineMessage::ready());
        messages
    }

    fn on_fault(&mut self, message: &str) -> Vec<PipelineMessage> {
        let mut messages = vec![PipelineMessage::voice_error(message)];
        let decision = if self.restarts_used < self.max_restarts {
            self.restarts_used += 1;
            messages.push(PipelineMessage::reconnecting());
            SessionControl::Restart
        } else {
            messages.push(PipelineMessage::status(VOICE_STOPPED_STATUS));
            SessionControl::Stop
        };
        // The transcription stage may already have closed; then there is
        // nobody left to restart.
        if self.control_tx.send(decision).is_err() && self.verbosity >= 2 {
            eprintln_clear("  [transcription already closed, ignoring session control]");
        }
        messages
    }
}

impl Station for SearchStation {
    type Input = TranscriptFeed;
    type Output = PipelineMessage;

    fn name(&self) -> &'static str {
        "search"
    }

    fn process(&mut self, feed: TranscriptFeed) -> Result<Vec<PipelineMessage>, StationError> {
        match feed {
            TranscriptFeed::Final(text) => Ok(self.on_final(&text)),
            TranscriptFeed::Fault(message) => Ok(self.on_fault(&message)),
            TranscriptFeed::CaptureFailed(message) => {
                Ok(vec![PipelineMessage::voice_error(&message)])
            }
            TranscriptFeed::Closed => {
                self.finished = true;
                Ok(Vec::new())
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::encoder::{EncodeInput, Encoder, MockEncoder};
    use crate::embed::query::QueryEncoder;
    use crate::index::{CorpusMap, VectorStore};
    use crossbeam_channel::{Receiver, unbounded};
    use std::path::PathBuf;
    use std::time::Duration;

    fn engine(encoder: MockEncoder) -> Arc<SearchEngine> {
        let paths: Vec<PathBuf> = ["/c/red_car.jpg", "/c/blue_bicycle.jpg", "/c/dog_park.jpg"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let inputs: Vec<EncodeInput> = paths.iter().cloned().map(EncodeInput::Image).collect();
        let store = VectorStore::build(64, encoder.encode_batch(&inputs).unwrap()).unwrap();
        Arc::new(SearchEngine::new(
            store,
            CorpusMap::new(paths),
            QueryEncoder::new(Arc::new(encoder)),
        ))
    }

    struct Harness {
        station: SearchStation,
        control: Receiver<SessionControl>,
        status: Receiver<PipelineMessage>,
    }

    fn harness(engine: Arc<SearchEngine>, max_restarts: u32) -> Harness {
        let (control_tx, control) = unbounded();
        let (status_tx, status) = unbounded();
        let station = SearchStation::new(KeywordExtractor::default(), engine, control_tx, status_tx)
            .with_top_k(2)
            .with_max_restarts(max_restarts);
        Harness {
            station,
            control,
            status,
        }
    }

    fn station(max_restarts: u32) -> (SearchStation, Receiver<SessionControl>) {
        let h = harness(engine(MockEncoder::new(64)), max_restarts);
        (h.station, h.control)
    }

    #[test]
    fn test_final_transcript_message_sequence() {
        let mut h = harness(engine(MockEncoder::new(64)), 3);
        let messages = h
            .station
            .process(TranscriptFeed::Final("a red car".to_string()))
            .unwrap();

        assert_eq!(h.status.try_recv(), Ok(PipelineMessage::searching("red car")));
        assert_eq!(messages.len(), 2);
        match &messages[0] {
            PipelineMessage::Results(paths) => {
                assert_eq!(paths.len(), 2);
                assert_eq!(paths[0], PathBuf::from("/c/red_car.jpg"));
            }
            other => panic!("expected results, got {other:?}"),
        }
        assert_eq!(messages[1], PipelineMessage::ready());
    }

    #[test]
    fn test_searching_status_published_before_search_runs() {
        let encoder = MockEncoder::new(64).with_delay(Duration::from_millis(300));
        let Harness {
            mut station,
            status,
            ..
        } = harness(engine(encoder), 3);

        let worker = std::thread::spawn(move || {
            station
                .process(TranscriptFeed::Final("red car".to_string()))
                .unwrap()
        });

        // Arrives while the slow query encoding is still running.
        let announced = status.recv_timeout(Duration::from_millis(200));
        assert_eq!(announced, Ok(PipelineMessage::searching("red car")));
        assert!(!worker.is_finished());

        let messages = worker.join().unwrap();
        assert!(matches!(&messages[0], PipelineMessage::Results(_)));
        assert_eq!(messages[1], PipelineMessage::ready());
    }

    #[test]
    fn test_no_keywords_skips_search() {
        let encoder = MockEncoder::new(64);
        let mut h = harness(engine(encoder.clone()), 3);
        let calls = encoder.calls();

        let messages = h.station.process(TranscriptFeed::Final(String::new())).unwrap();
        assert_eq!(messages, vec![PipelineMessage::no_keywords()]);
        assert!(h.status.try_recv().is_err());
        assert_eq!(encoder.calls(), calls);
    }

    #[test]
    fn test_search_failure_is_reported_between_statuses() {
        let encoder = MockEncoder::new(64);
        let paths = vec![PathBuf::from("/c/a.jpg")];
        let store = VectorStore::build(64, encoder.encode_batch(&[EncodeInput::text("a")]).unwrap())
            .unwrap();
        let broken = Arc::new(SearchEngine::new(
            store,
            CorpusMap::new(paths),
            QueryEncoder::new(Arc::new(MockEncoder::new(64).with_failure("model offline"))),
        ));
        let mut h = harness(broken, 3);

        let messages = h
            .station
            .process(TranscriptFeed::Final("red car".to_string()))
            .unwrap();
        assert_eq!(h.status.try_recv(), Ok(PipelineMessage::searching("red car")));
        assert_eq!(messages.len(), 2);
        assert!(matches!(&messages[0], PipelineMessage::Status(s) if s.starts_with("Search failed:")));
        assert_eq!(messages[1], PipelineMessage::ready());
    }

    #[test]
    fn test_fault_requests_restart_until_budget_spent() {
        let (mut station, control) = station(2);

        for _ in 0..2 {
            let messages = station.process(TranscriptFeed::Fault("reset".to_string())).unwrap();
            assert_eq!(
                messages,
                vec![
                    PipelineMessage::voice_error("reset"),
                    PipelineMessage::reconnecting()
                ]
            );
            assert_eq!(control.try_recv(), Ok(SessionControl::Restart));
        }

        let messages = station.process(TranscriptFeed::Fault("reset".to_string())).unwrap();
        assert_eq!(messages[1], PipelineMessage::status(VOICE_STOPPED_STATUS));
        assert_eq!(control.try_recv(), Ok(SessionControl::Stop));
    }

    #[test]
    fn test_successful_transcript_resets_restart_budget() {
        let (mut station, control) = station(1);

        station.process(TranscriptFeed::Fault("reset".to_string())).unwrap();
        station.process(TranscriptFeed::Final("dog".to_string())).unwrap();
        station.process(TranscriptFeed::Fault("reset".to_string())).unwrap();

        assert_eq!(control.try_recv(), Ok(SessionControl::Restart));
        assert_eq!(control.try_recv(), Ok(SessionControl::Restart));
    }

    #[test]
    fn test_capture_failure_becomes_voice_error() {
        let (mut station, control) = station(3);
        let messages = station
            .process(TranscriptFeed::CaptureFailed("microphone busy".to_string()))
            .unwrap();
        assert_eq!(messages, vec![PipelineMessage::voice_error("microphone busy")]);
        assert!(control.try_recv().is_err());
    }

    #[test]
    fn test_closed_finishes_station() {
        let (mut station, _) = station(3);
        assert!(!station.is_finished());
        assert!(station.process(TranscriptFeed::Closed).unwrap().is_empty());
        assert!(station.is_finished());
    }

    #[test]
    fn test_fault_after_transcription_gone_still_reports() {
        let (mut station, control) = station(3);
        drop(control);
        let messages = station.process(TranscriptFeed::Fault("x".to_string())).unwrap();
        assert_eq!(messages.len(), 2);
    }
}
