//! Encoder contract shared by the index builder and the query adapter.

use crate::error::{Result, VoximError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One item to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeInput {
    Text(String),
    Image(PathBuf),
}

impl EncodeInput {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn image(path: impl Into<PathBuf>) -> Self {
        Self::Image(path.into())
    }
}

/// Multimodal encoder mapping text and images into one embedding space.
///
/// Returns one vector per input, in input order. Vectors need not be
/// normalized; callers normalize.
pub trait Encoder: Send + Sync {
    fn encode_batch(&self, inputs: &[EncodeInput]) -> Result<Vec<Vec<f32>>>;

    /// Model identifier recorded in the index artifact.
    fn model_name(&self) -> &str;
}

impl<T: Encoder + ?Sized> Encoder for Arc<T> {
    fn encode_batch(&self, inputs: &[EncodeInput]) -> Result<Vec<Vec<f32>>> {
        (**self).encode_batch(inputs)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

impl<T: Encoder + ?Sized> Encoder for Box<T> {
    fn encode_batch(&self, inputs: &[EncodeInput]) -> Result<Vec<Vec<f32>>> {
        (**self).encode_batch(inputs)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Deterministic hashed bag-of-words encoder for tests and demos.
///
/// Text is embedded from its words; images from the words of their file
/// stem (`red_car.jpg` embeds like "red car"), so captions and file names
/// land close together. Counters are shared between clones.
#[derive(Debug, Clone)]
pub struct MockEncoder {
    dimension: usize,
    model: String,
    fixed: HashMap<String, Vec<f32>>,
    delay: Option<Duration>,
    fail_always: Option<String>,
    fail_on: Vec<String>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockEncoder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model: "mock-encoder".to_string(),
            fixed: HashMap::new(),
            delay: None,
            fail_always: None,
            fail_on: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_model_name(mut self, name: &str) -> Self {
        self.model = name.to_string();
        self
    }

    /// Return `vector` verbatim for a text value or image path.
    pub fn with_vector(mut self, key: &str, vector: Vec<f32>) -> Self {
        self.fixed.insert(key.to_string(), vector);
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every call.
    pub fn with_failure(mut self, message: &str) -> Self {
        self.fail_always = Some(message.to_string());
        self
    }

    /// Fail any call whose batch contains this text value or image path.
    pub fn with_failing_input(mut self, key: &str) -> Self {
        self.fail_on.push(key.to_string());
        self
    }

    /// Number of `encode_batch` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were ever running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn key(input: &EncodeInput) -> String {
        match input {
            EncodeInput::Text(text) => text.clone(),
            EncodeInput::Image(path) => path.display().to_string(),
        }
    }

    fn words(input: &EncodeInput) -> Vec<String> {
        let source = match input {
            EncodeInput::Text(text) => text.clone(),
            EncodeInput::Image(path) => image_words(path),
        };
        source
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    fn embed(&self, input: &EncodeInput) -> Vec<f32> {
        if let Some(vector) = self.fixed.get(&Self::key(input)) {
            return vector.clone();
        }

        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }
        let mut words = Self::words(input);
        if words.is_empty() {
            words.push(Self::key(input));
        }
        for word in words {
            let slot = (fnv1a(word.as_bytes()) % self.dimension as u64) as usize;
            vector[slot] += 1.0;
        }
        vector
    }

    fn encode_all(&self, inputs: &[EncodeInput]) -> Result<Vec<Vec<f32>>> {
        if let Some(message) = &self.fail_always {
            return Err(VoximError::Encoder {
                message: message.clone(),
            });
        }
        if let Some(bad) = inputs
            .iter()
            .map(Self::key)
            .find(|key| self.fail_on.contains(key))
        {
            return Err(VoximError::Encoder {
                message: format!("cannot encode {bad}"),
            });
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        Ok(inputs.iter().map(|input| self.embed(input)).collect())
    }
}

fn image_words(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 64-bit FNV-1a.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

impl Encoder for MockEncoder {
    fn encode_batch(&self, inputs: &[EncodeInput]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.encode_all(inputs);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::store::{VectorStore, normalize};

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let mut a = a.to_vec();
        let mut b = b.to_vec();
        normalize(&mut a).unwrap();
        normalize(&mut b).unwrap();
        a.iter().zip(&b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_one_vector_per_input_in_order() {
        let encoder = MockEncoder::new(32);
        let inputs = vec![
            EncodeInput::text("red car"),
            EncodeInput::image("/corpus/blue_bicycle.jpg"),
            EncodeInput::text("dog"),
        ];

        let vectors = encoder.encode_batch(&inputs).unwrap();
        assert_eq!(vectors.len(), 3);
        assert!(vectors.iter().all(|v| v.len() == 32));
        assert_eq!(vectors[2], encoder.encode_batch(&inputs[2..]).unwrap()[0]);
    }

    #[test]
    fn test_image_stem_matches_caption() {
        let encoder = MockEncoder::new(64);
        let vectors = encoder
            .encode_batch(&[
                EncodeInput::text("red car"),
                EncodeInput::image("/corpus/red_car.jpg"),
                EncodeInput::image("/corpus/green-tree.png"),
            ])
            .unwrap();

        assert!((cosine(&vectors[0], &vectors[1]) - 1.0).abs() < 1e-5);
        assert!(cosine(&vectors[0], &vectors[2]) < 0.9);
    }

    #[test]
    fn test_deterministic_across_instances() {
        let a = MockEncoder::new(16).encode_batch(&[EncodeInput::text("park")]);
        let b = MockEncoder::new(16).encode_batch(&[EncodeInput::text("park")]);
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn test_punctuation_only_input_still_embeds() {
        let encoder = MockEncoder::new(8);
        let vectors = encoder.encode_batch(&[EncodeInput::image("/x/___.png")]).unwrap();
        assert!(VectorStore::build(8, vectors).is_ok());
    }

    #[test]
    fn test_fixed_vector_override() {
        let encoder = MockEncoder::new(3).with_vector("north", vec![0.0, 1.0, 0.0]);
        let vectors = encoder.encode_batch(&[EncodeInput::text("north")]).unwrap();
        assert_eq!(vectors[0], vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_failure_switches() {
        let encoder = MockEncoder::new(4).with_failure("model offline");
        let err = encoder.encode_batch(&[EncodeInput::text("x")]).unwrap_err();
        assert_eq!(err.to_string(), "Encoder failed: model offline");

        let encoder = MockEncoder::new(4).with_failing_input("/c/bad.jpg");
        assert!(encoder.encode_batch(&[EncodeInput::image("/c/ok.jpg")]).is_ok());
        let err = encoder
            .encode_batch(&[EncodeInput::image("/c/ok.jpg"), EncodeInput::image("/c/bad.jpg")])
            .unwrap_err();
        assert!(err.to_string().contains("/c/bad.jpg"));
    }

    #[test]
    fn test_counters_shared_between_clones() {
        let encoder = MockEncoder::new(4);
        let clone = encoder.clone();
        clone.encode_batch(&[EncodeInput::text("a")]).unwrap();
        clone.encode_batch(&[EncodeInput::text("b")]).unwrap();

        assert_eq!(encoder.calls(), 2);
        assert_eq!(encoder.max_in_flight(), 1);
    }

    #[test]
    fn test_arc_encoder_delegates() {
        let encoder: Arc<dyn Encoder> = Arc::new(MockEncoder::new(4).with_model_name("clip-mock"));
        assert_eq!(encoder.model_name(), "clip-mock");
        assert_eq!(encoder.encode_batch(&[EncodeInput::text("a")]).unwrap().len(), 1);
    }
}
