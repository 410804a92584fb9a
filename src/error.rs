//! Error types for voxim.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoximError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Vector errors (build and query time)
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector {index} has zero or non-finite norm and cannot be normalized")]
    ZeroVector { index: usize },

    #[error("Unknown corpus id: {id}")]
    UnknownId { id: usize },

    // Corpus / index build errors
    #[error("Corpus directory not found: {path}")]
    CorpusNotFound { path: String },

    #[error("No indexable items found in {path}")]
    EmptyCorpus { path: String },

    // Index load errors
    #[error("Index not found at {path}")]
    IndexNotFound { path: String },

    #[error("Index is corrupt: {message}")]
    IndexCorrupt { message: String },

    // Encoder errors
    #[error("Encoder command not found: {command}")]
    EncoderNotFound { command: String },

    #[error("Encoder failed: {message}")]
    Encoder { message: String },

    // Query errors
    #[error("Search query is empty")]
    EmptyQuery,

    #[error("No keywords found in transcript")]
    NoKeywords,

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Speech recognition errors
    #[error("Recognizer model not found at {path}")]
    RecognizerModelNotFound { path: String },

    #[error("Speech recognizer error: {message}")]
    Recognizer { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoximError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_dimension_mismatch_display() {
        let error = VoximError::DimensionMismatch {
            expected: 512,
            actual: 384,
        };
        assert_eq!(error.to_string(), "Dimension mismatch: expected 512, got 384");
    }

    #[test]
    fn test_zero_vector_display() {
        let error = VoximError::ZeroVector { index: 7 };
        assert_eq!(
            error.to_string(),
            "Vector 7 has zero or non-finite norm and cannot be normalized"
        );
    }

    #[test]
    fn test_corpus_errors_display() {
        let missing = VoximError::CorpusNotFound {
            path: "/data/val2017".to_string(),
        };
        assert_eq!(missing.to_string(), "Corpus directory not found: /data/val2017");

        let empty = VoximError::EmptyCorpus {
            path: "/data/empty".to_string(),
        };
        assert_eq!(empty.to_string(), "No indexable items found in /data/empty");
    }

    #[test]
    fn test_index_errors_display() {
        let missing = VoximError::IndexNotFound {
            path: "index.json".to_string(),
        };
        assert_eq!(missing.to_string(), "Index not found at index.json");

        let corrupt = VoximError::IndexCorrupt {
            message: "3 paths for 4 vectors".to_string(),
        };
        assert_eq!(corrupt.to_string(), "Index is corrupt: 3 paths for 4 vectors");
    }

    #[test]
    fn test_query_errors_display() {
        assert_eq!(VoximError::EmptyQuery.to_string(), "Search query is empty");
        assert_eq!(
            VoximError::NoKeywords.to_string(),
            "No keywords found in transcript"
        );
        assert_eq!(
            VoximError::UnknownId { id: 42 }.to_string(),
            "Unknown corpus id: 42"
        );
    }

    #[test]
    fn test_recognizer_display() {
        let error = VoximError::Recognizer {
            message: "stream reset".to_string(),
        };
        assert_eq!(error.to_string(), "Speech recognizer error: stream reset");
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = VoximError::ConfigInvalidValue {
            key: "search.top_k".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for search.top_k: must be positive"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: VoximError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: VoximError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: VoximError = json_error.into();
        assert!(error.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: VoximError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<VoximError>();
        assert_sync::<VoximError>();
    }
}
