//! Search phrase extraction from final transcripts.

use crate::error::{Result, VoximError};
use crate::keywords::lemmatizer::{EnglishLemmatizer, Lemmatizer};
use std::sync::Arc;

/// Derives a normalized search phrase from a transcript.
#[derive(Clone)]
pub struct KeywordExtractor {
    lemmatizer: Arc<dyn Lemmatizer>,
}

impl KeywordExtractor {
    pub fn new(lemmatizer: Arc<dyn Lemmatizer>) -> Self {
        Self { lemmatizer }
    }

    /// Lowercase, filter and lemmatize `transcript`, joining the lemmas
    /// with single spaces in their original order.
    ///
    /// # Errors
    /// `NoKeywords` if nothing survives filtering. Callers must treat this
    /// as "do not search".
    pub fn extract(&self, transcript: &str) -> Result<String> {
        let lowered = transcript.to_lowercase();
        let lemmas: Vec<String> = self
            .lemmatizer
            .tokenize_and_filter(&lowered)
            .into_iter()
            .map(|lemma| lemma.trim().to_string())
            .filter(|lemma| !lemma.is_empty())
            .collect();

        if lemmas.is_empty() {
            return Err(VoximError::NoKeywords);
        }
        Ok(lemmas.join(" "))
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(Arc::new(EnglishLemmatizer::new()))
    }
}
