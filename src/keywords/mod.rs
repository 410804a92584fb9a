//! Keyword extraction: turns a spoken transcript into a search phrase.

pub mod extractor;
pub mod lemmatizer;

pub use extractor::KeywordExtractor;
pub use lemmatizer::{EnglishLemmatizer, Lemmatizer};
