//! Utterance segmentation for local recognizers.
//!
//! Splits a continuous audio stream into utterances using RMS thresholding
//! and a trailing-silence state machine. Timing is derived from sample
//! counts, not wall-clock time, so a WAV file replayed at any speed
//! segments the same way as a live microphone.

use crate::defaults;
use std::collections::VecDeque;

/// Configuration for utterance segmentation.
#[derive(Debug, Clone, Copy)]
pub struct SegmenterConfig {
    /// RMS threshold for detecting speech (0.0 to 1.0).
    pub speech_threshold: f32,
    /// Trailing silence that ends an utterance (milliseconds).
    pub silence_ms: u32,
    /// Utterances with less speech than this are dropped as noise.
    pub min_speech_ms: u32,
    /// Utterances are cut at this length even while speech continues.
    pub max_utterance_ms: u32,
    /// Audio kept from before speech onset.
    pub pre_roll_ms: u32,
    /// Sample rate of the incoming audio.
    pub sample_rate: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            speech_threshold: defaults::SPEECH_THRESHOLD,
            silence_ms: defaults::SILENCE_MS,
            min_speech_ms: defaults::MIN_SPEECH_MS,
            max_utterance_ms: defaults::MAX_UTTERANCE_MS,
            pre_roll_ms: defaults::PRE_ROLL_MS,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

impl SegmenterConfig {
    fn samples(&self, ms: u32) -> usize {
        defaults::chunk_samples(self.sample_rate, ms)
    }
}

/// Current segmentation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// Waiting for speech.
    Idle,
    /// Inside an utterance.
    Speaking,
}

/// Outcome of feeding one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Nothing to report.
    Silence,
    /// Speech started or continues; the utterance is still open.
    Open,
    /// An utterance ended; its audio, pre-roll included.
    Complete(Vec<i16>),
    /// An utterance ended but was too short to be speech.
    Discarded,
}

/// RMS of 16-bit samples, normalized to 0.0..=1.0.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Silence-delimited utterance splitter.
#[derive(Debug)]
pub struct UtteranceSegmenter {
    config: SegmenterConfig,
    state: SegmenterState,
    pre_roll: VecDeque<i16>,
    utterance: Vec<i16>,
    speech_samples: usize,
    silence_samples: usize,
}

impl UtteranceSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            config,
            state: SegmenterState::Idle,
            pre_roll: VecDeque::with_capacity(config.samples(config.pre_roll_ms)),
            utterance: Vec::new(),
            speech_samples: 0,
            silence_samples: 0,
        }
    }

    pub fn state(&self) -> SegmenterState {
        self.state
    }

    /// Audio of the open utterance so far (empty when idle).
    pub fn current(&self) -> &[i16] {
        &self.utterance
    }

    /// Feed the next chunk of audio.
    pub fn push(&mut self, samples: &[i16]) -> Segment {
        let is_speech = calculate_rms(samples) > self.config.speech_threshold;

        match self.state {
            SegmenterState::Idle => {
                if !is_speech {
                    self.remember(samples);
                    return Segment::Silence;
                }
                self.state = SegmenterState::Speaking;
                self.utterance.extend(self.pre_roll.drain(..));
                self.utterance.extend_from_slice(samples);
                self.speech_samples = samples.len();
                self.silence_samples = 0;
            }
            SegmenterState::Speaking => {
                self.utterance.extend_from_slice(samples);
                if is_speech {
                    self.speech_samples += samples.len();
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += samples.len();
                }
            }
        }

        let silence_done = self.silence_samples >= self.config.samples(self.config.silence_ms);
        let too_long = self.utterance.len() >= self.config.samples(self.config.max_utterance_ms);
        if silence_done || too_long {
            self.finish()
        } else {
            Segment::Open
        }
    }

    /// Drop any open utterance and return to idle.
    pub fn reset(&mut self) {
        self.state = SegmenterState::Idle;
        self.pre_roll.clear();
        self.utterance.clear();
        self.speech_samples = 0;
        self.silence_samples = 0;
    }

    fn finish(&mut self) -> Segment {
        let audio = std::mem::take(&mut self.utterance);
        let long_enough = self.speech_samples >= self.config.samples(self.config.min_speech_ms);
        self.reset();
        if long_enough {
            Segment::Complete(audio)
        } else {
            Segment::Discarded
        }
    }

    fn remember(&mut self, samples: &[i16]) {
        let capacity = self.config.samples(self.config.pre_roll_ms);
        if capacity == 0 {
            return;
        }
        self.pre_roll.extend(samples.iter().copied());
        while self.pre_roll.len() > capacity {
            self.pre_roll.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHUNK: usize = 1600; // 100ms at 16kHz

    fn speech() -> Vec<i16> {
        vec![8000; CHUNK]
    }

    fn silence() -> Vec<i16> {
        vec![0; CHUNK]
    }

    fn config() -> SegmenterConfig {
        SegmenterConfig {
            speech_threshold: 0.02,
            silence_ms: 300,
            min_speech_ms: 200,
            max_utterance_ms: 2000,
            pre_roll_ms: 100,
            sample_rate: 16000,
        }
    }

    #[test]
    fn test_rms_silence_is_zero() {
        assert_eq!(calculate_rms(&silence()), 0.0);
        assert_eq!(calculate_rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_max_amplitude() {
        let rms = calculate_rms(&vec![i16::MAX; 100]);
        assert!((rms - 1.0).abs() < 0.001, "RMS should be ~1.0, got {rms}");
    }

    #[test]
    fn test_silence_stays_idle() {
        let mut segmenter = UtteranceSegmenter::new(config());
        for _ in 0..10 {
            assert_eq!(segmenter.push(&silence()), Segment::Silence);
        }
        assert_eq!(segmenter.state(), SegmenterState::Idle);
        assert!(segmenter.current().is_empty());
    }

    #[test]
    fn test_utterance_closes_after_trailing_silence() {
        let mut segmenter = UtteranceSegmenter::new(config());
        segmenter.push(&silence());
        assert_eq!(segmenter.push(&speech()), Segment::Open);
        assert_eq!(segmenter.push(&speech()), Segment::Open);
        assert_eq!(segmenter.push(&silence()), Segment::Open);
        assert_eq!(segmenter.push(&silence()), Segment::Open);

        match segmenter.push(&silence()) {
            // pre-roll + 2 speech + 3 silence
            Segment::Complete(audio) => assert_eq!(audio.len(), 6 * CHUNK),
            other => panic!("expected a complete utterance, got {other:?}"),
        }
        assert_eq!(segmenter.state(), SegmenterState::Idle);
    }

    #[test]
    fn test_speech_resets_silence_count() {
        let mut segmenter = UtteranceSegmenter::new(config());
        segmenter.push(&speech());
        segmenter.push(&speech());
        segmenter.push(&silence());
        segmenter.push(&silence());
        segmenter.push(&speech());
        assert_eq!(segmenter.push(&silence()), Segment::Open);
        assert_eq!(segmenter.push(&silence()), Segment::Open);
        assert!(matches!(segmenter.push(&silence()), Segment::Complete(_)));
    }

    #[test]
    fn test_short_blip_is_discarded() {
        let mut segmenter = UtteranceSegmenter::new(config());
        segmenter.push(&speech());
        segmenter.push(&silence());
        segmenter.push(&silence());
        assert_eq!(segmenter.push(&silence()), Segment::Discarded);
    }

    #[test]
    fn test_long_utterance_is_cut() {
        let mut segmenter = UtteranceSegmenter::new(config());
        let mut outcomes = Vec::new();
        for _ in 0..20 {
            outcomes.push(segmenter.push(&speech()));
        }
        assert!(outcomes[..19].iter().all(|s| *s == Segment::Open));
        assert!(matches!(&outcomes[19], Segment::Complete(a) if a.len() == 20 * CHUNK));
    }

    #[test]
    fn test_pre_roll_is_bounded() {
        let mut segmenter = UtteranceSegmenter::new(config());
        for _ in 0..5 {
            segmenter.push(&vec![1; CHUNK]);
        }
        segmenter.push(&speech());
        assert_eq!(segmenter.current().len(), 2 * CHUNK);
        assert_eq!(segmenter.current()[0], 1);
    }

    #[test]
    fn test_reset_drops_open_utterance() {
        let mut segmenter = UtteranceSegmenter::new(config());
        segmenter.push(&speech());
        segmenter.reset();
        assert_eq!(segmenter.state(), SegmenterState::Idle);
        assert!(segmenter.current().is_empty());
    }
}
