//! Audio capture stage: polls an [`AudioSource`] on its own thread and
//! re-slices the samples into fixed-duration chunks.
//!
//! The stage owns the device for its whole lifetime. Whatever ends the loop
//! (stop request, exhausted file, broken device, vanished consumer, panic),
//! the device is released and exactly one [`CaptureEvent::EndOfStream`] is
//! queued after the last chunk. A device that cannot start or stops
//! delivering audio is reported with [`CaptureEvent::Failed`] first.

use crate::audio::source::AudioSource;
use crate::defaults;
use crate::pipeline::types::{AudioChunk, CaptureEvent};
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Consecutive read failures after which the device is considered gone.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Capture stage settings.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub chunk_ms: u32,
    /// Delay between reads of the source.
    pub poll_interval: Duration,
    /// Print device hints to stderr.
    pub verbose: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            chunk_ms: defaults::CHUNK_MS,
            poll_interval: Duration::from_millis(16),
            verbose: false,
        }
    }
}

impl CaptureConfig {
    fn chunk_samples(&self) -> usize {
        defaults::chunk_samples(self.sample_rate, self.chunk_ms).max(1)
    }
}

/// Why the capture loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureExit {
    Stopped,
    Exhausted,
    DeviceFailed,
    ConsumerGone,
    StartFailed,
}

/// Re-slices arbitrary reads into chunks of exactly `chunk_samples`.
struct Chunker {
    pending: Vec<i16>,
    chunk_samples: usize,
    sample_rate: u32,
    sequence: u64,
}

impl Chunker {
    fn new(chunk_samples: usize, sample_rate: u32) -> Self {
        Self {
            pending: Vec::with_capacity(chunk_samples * 2),
            chunk_samples,
            sample_rate,
            sequence: 0,
        }
    }

    fn push(&mut self, samples: &[i16]) -> Vec<AudioChunk> {
        self.pending.extend_from_slice(samples);
        let mut ready = Vec::new();
        while self.pending.len() >= self.chunk_samples {
            let rest = self.pending.split_off(self.chunk_samples);
            let full = std::mem::replace(&mut self.pending, rest);
            ready.push(self.emit(full));
        }
        ready
    }

    /// The remaining partial chunk, if any.
    fn flush(&mut self) -> Option<AudioChunk> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(self.emit(rest))
    }

    fn emit(&mut self, samples: Vec<i16>) -> AudioChunk {
        let chunk = AudioChunk::new(samples, self.sample_rate, self.sequence);
        self.sequence += 1;
        chunk
    }
}

/// Releases the device, flushes the partial chunk and queues the sentinel
/// when dropped.
struct CaptureGuard {
    source: Box<dyn AudioSource>,
    tx: Sender<CaptureEvent>,
    chunker: Chunker,
    started: bool,
}

impl CaptureGuard {
    fn send(&self, chunk: AudioChunk) -> bool {
        self.tx.send(CaptureEvent::Chunk(chunk)).is_ok()
    }

    fn report_failure(&self, message: String) {
        eprintln!("voxim: {message}");
        // No consumer means nobody to tell.
        self.tx.send(CaptureEvent::Failed(message)).ok();
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if self.started
            && let Err(e) = self.source.stop()
        {
            eprintln!("voxim: failed to stop audio capture: {e}");
        }
        let delivered = match self.chunker.flush() {
            Some(rest) => self.tx.send(CaptureEvent::Chunk(rest)).is_ok(),
            None => true,
        };
        // The consumer may already be gone; nothing left to tell it then.
        if delivered {
            self.tx.send(CaptureEvent::EndOfStream).ok();
        }
    }
}

/// Handle to the capture thread.
pub struct CaptureStage {
    handle: JoinHandle<CaptureExit>,
}

impl CaptureStage {
    /// Spawn the capture thread.
    ///
    /// The thread starts the source, then polls it until `running` is
    /// cleared or the source ends. A start failure ends the stage
    /// immediately (the sentinel is still sent).
    pub fn spawn(
        source: Box<dyn AudioSource>,
        config: CaptureConfig,
        tx: Sender<CaptureEvent>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let handle = thread::spawn(move || {
            let chunker = Chunker::new(config.chunk_samples(), config.sample_rate);
            let mut guard = CaptureGuard {
                source,
                tx,
                chunker,
                started: false,
            };
            run_capture(&mut guard, &config, &running)
        });
        Self { handle }
    }

    /// Whether the capture thread has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the capture thread.
    pub fn join(self) -> Result<CaptureExit, String> {
        self.handle
            .join()
            .map_err(|_| "capture thread panicked".to_string())
    }
}

fn run_capture(guard: &mut CaptureGuard, config: &CaptureConfig, running: &AtomicBool) -> CaptureExit {
    if let Err(e) = guard.source.start() {
        guard.report_failure(format!("could not start audio capture: {e}"));
        return CaptureExit::StartFailed;
    }
    guard.started = true;

    let finite = guard.source.is_finite();
    let mut consecutive_errors: u32 = 0;
    let mut chunks_sent: u64 = 0;

    let exit = loop {
        if !running.load(Ordering::SeqCst) {
            break CaptureExit::Stopped;
        }

        let samples = match guard.source.read_samples() {
            Ok(samples) => {
                consecutive_errors = 0;
                samples
            }
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    guard.report_failure(format!(
                        "audio capture failed {consecutive_errors} times in a row: {e}"
                    ));
                    break CaptureExit::DeviceFailed;
                }
                thread::sleep(config.poll_interval);
                continue;
            }
        };

        if samples.is_empty() {
            if finite {
                break CaptureExit::Exhausted;
            }
            thread::sleep(config.poll_interval);
            continue;
        }

        let ready = guard.chunker.push(&samples);
        let mut consumer_gone = false;
        for chunk in ready {
            if !guard.send(chunk) {
                consumer_gone = true;
                break;
            }
            chunks_sent += 1;
        }
        if consumer_gone {
            break CaptureExit::ConsumerGone;
        }

        if !finite {
            thread::sleep(config.poll_interval);
        }
    };

    if config.verbose && chunks_sent == 0 && !finite && exit == CaptureExit::Stopped {
        eprintln!("voxim: no audio captured from microphone");
        eprintln!("  - Check that your microphone is connected and selected");
        eprintln!("  - Run: voxim devices");
    }

    exit
}
