//! Default configuration constants for voxim.
//!
//! Shared by the config file types, the pipeline config and the CLI so that
//! every entry point agrees on the same values.

/// Default audio sample rate in Hz.
///
/// 16kHz mono is what both Whisper and typical streaming recognizers expect.
pub const SAMPLE_RATE: u32 = 16000;

/// Duration of one captured audio chunk in milliseconds.
pub const CHUNK_MS: u32 = 100;

/// Results returned per spoken query in the live pipeline (3x3 grid).
pub const LIVE_TOP_K: usize = 9;

/// Results returned by one-shot searches.
pub const SEARCH_TOP_K: usize = 5;

/// Items sent to the encoder per request while building an index.
pub const BATCH_SIZE: usize = 32;

/// File extensions (lowercase, without dot) picked up by the index builder.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Default Whisper model path.
pub const DEFAULT_MODEL: &str = "models/ggml-base.en.bin";

/// Default language code for transcription.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// RMS threshold (0.0 to 1.0) above which a chunk counts as speech.
pub const SPEECH_THRESHOLD: f32 = 0.02;

/// Trailing silence that closes an utterance, in milliseconds.
pub const SILENCE_MS: u32 = 800;

/// Utterances shorter than this are treated as noise.
pub const MIN_SPEECH_MS: u32 = 200;

/// Utterances are force-finalized at this length.
pub const MAX_UTTERANCE_MS: u32 = 15_000;

/// Audio kept before speech onset so soft consonants are not clipped.
pub const PRE_ROLL_MS: u32 = 300;

/// Recognizer session restarts attempted before the pipeline gives up on voice input.
pub const MAX_SESSION_RESTARTS: u32 = 3;

/// Allowed deviation from unit norm for stored and query vectors.
pub const NORM_TOLERANCE: f32 = 1e-5;

/// Tolerance applied to vectors read back from disk (JSON float round-off).
pub const LOAD_NORM_TOLERANCE: f32 = 1e-3;

/// File name of the index artifact inside the data directory.
pub const INDEX_FILE_NAME: &str = "index.json";

/// Number of samples in one chunk at the given rate.
pub fn chunk_samples(sample_rate: u32, chunk_ms: u32) -> usize {
    (sample_rate as u64 * chunk_ms as u64 / 1000) as usize
}
