use crate::defaults;
use crate::error::{Result, VoximError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub stt: SttConfig,
    pub search: SearchConfig,
    pub encoder: EncoderConfig,
    pub pipeline: PipelineSettings,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub chunk_ms: u32,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    pub model: String,
    pub language: String,
    pub speech_threshold: f32,
    pub silence_ms: u32,
    pub max_utterance_ms: u32,
    /// Emit a partial transcript every this many ms of speech (0 = never)
    pub partial_interval_ms: u32,
    pub threads: Option<usize>,
}

/// Index and search configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub index_path: PathBuf,
    pub top_k: usize,
    pub batch_size: usize,
    pub extensions: Vec<String>,
}

/// External embedding model command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EncoderConfig {
    /// Program followed by its arguments
    pub command: Vec<String>,
}

/// Live pipeline behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub max_session_restarts: u32,
    pub echo_partials: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            chunk_ms: defaults::CHUNK_MS,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: defaults::DEFAULT_MODEL.to_string(),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            speech_threshold: defaults::SPEECH_THRESHOLD,
            silence_ms: defaults::SILENCE_MS,
            max_utterance_ms: defaults::MAX_UTTERANCE_MS,
            partial_interval_ms: 0,
            threads: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            top_k: defaults::LIVE_TOP_K,
            batch_size: defaults::BATCH_SIZE,
            extensions: defaults::IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_session_restarts: defaults::MAX_SESSION_RESTARTS,
            echo_partials: true,
        }
    }
}

/// `<data_dir>/voxim/index.json`, or `./index.json` when there is no data dir.
pub fn default_index_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("voxim"))
        .unwrap_or_default()
        .join(defaults::INDEX_FILE_NAME)
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(VoximError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXIM_INDEX → search.index_path
    /// - VOXIM_MODEL → stt.model
    /// - VOXIM_AUDIO_DEVICE → audio.device
    /// - VOXIM_ENCODER → encoder.command (split on whitespace)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(index) = std::env::var("VOXIM_INDEX")
            && !index.is_empty()
        {
            self.search.index_path = PathBuf::from(index);
        }

        if let Ok(model) = std::env::var("VOXIM_MODEL")
            && !model.is_empty()
        {
            self.stt.model = model;
        }

        if let Ok(device) = std::env::var("VOXIM_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(encoder) = std::env::var("VOXIM_ENCODER")
            && !encoder.trim().is_empty()
        {
            self.encoder.command = encoder.split_whitespace().map(str::to_string).collect();
        }

        self
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = |key: &str, ok: bool| {
            if ok {
                Ok(())
            } else {
                Err(VoximError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: "must be greater than zero".to_string(),
                })
            }
        };
        positive("audio.sample_rate", self.audio.sample_rate > 0)?;
        positive("audio.chunk_ms", self.audio.chunk_ms > 0)?;
        positive("search.top_k", self.search.top_k > 0)?;
        positive("search.batch_size", self.search.batch_size > 0)?;
        if !(0.0..=1.0).contains(&self.stt.speech_threshold) {
            return Err(VoximError::ConfigInvalidValue {
                key: "stt.speech_threshold".to_string(),
                message: format!("{} is outside 0.0..=1.0", self.stt.speech_threshold),
            });
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxim/config.toml on Linux
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("voxim").join("config.toml"))
            .ok_or_else(|| VoximError::ConfigParse {
                message: "Could not determine config directory".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_voxim_env() {
        for key in ["VOXIM_INDEX", "VOXIM_MODEL", "VOXIM_AUDIO_DEVICE", "VOXIM_ENCODER"] {
            remove_env(key);
        }
    }

    fn write_toml(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.audio.device, None);
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.chunk_ms, 100);

        assert_eq!(config.stt.model, "models/ggml-base.en.bin");
        assert_eq!(config.stt.language, "en");
        assert_eq!(config.stt.partial_interval_ms, 0);

        assert_eq!(config.search.top_k, 9);
        assert_eq!(config.search.batch_size, 32);
        assert_eq!(config.search.extensions, vec!["jpg", "jpeg", "png", "bmp"]);
        assert!(config.search.index_path.ends_with("index.json"));

        assert!(config.encoder.command.is_empty());
        assert_eq!(config.pipeline.max_session_restarts, 3);
        assert!(config.pipeline.echo_partials);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let file = write_toml(
            r#"
            [audio]
            device = "hw:0,0"
            chunk_ms = 50

            [stt]
            model = "/models/ggml-small.en.bin"
            silence_ms = 600
            partial_interval_ms = 500

            [search]
            index_path = "/var/lib/voxim/coco.json"
            top_k = 4
            extensions = ["webp"]

            [encoder]
            command = ["python3", "clip_server.py", "--model", "ViT-B/32"]

            [pipeline]
            max_session_restarts = 1
            echo_partials = false
        "#,
        );

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.audio.device, Some("hw:0,0".to_string()));
        assert_eq!(config.audio.chunk_ms, 50);
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.stt.model, "/models/ggml-small.en.bin");
        assert_eq!(config.stt.silence_ms, 600);
        assert_eq!(config.stt.partial_interval_ms, 500);
        assert_eq!(
            config.search.index_path,
            PathBuf::from("/var/lib/voxim/coco.json")
        );
        assert_eq!(config.search.top_k, 4);
        assert_eq!(config.search.batch_size, 32);
        assert_eq!(config.search.extensions, vec!["webp"]);
        assert_eq!(config.encoder.command.len(), 4);
        assert_eq!(config.pipeline.max_session_restarts, 1);
        assert!(!config.pipeline.echo_partials);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = write_toml("[search]\ntop_k = 3\n");
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.search.top_k, 3);
        assert_eq!(config.audio, AudioConfig::default());
        assert_eq!(config.stt, SttConfig::default());
        assert_eq!(config.pipeline, PipelineSettings::default());
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_voxim_env();

        set_env("VOXIM_INDEX", "/tmp/idx.json");
        set_env("VOXIM_MODEL", "/m/tiny.bin");
        set_env("VOXIM_AUDIO_DEVICE", "pulse");
        set_env("VOXIM_ENCODER", "clip-encode  --fp16");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.search.index_path, PathBuf::from("/tmp/idx.json"));
        assert_eq!(config.stt.model, "/m/tiny.bin");
        assert_eq!(config.audio.device, Some("pulse".to_string()));
        assert_eq!(config.encoder.command, vec!["clip-encode", "--fp16"]);

        clear_voxim_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_voxim_env();

        set_env("VOXIM_MODEL", "");
        set_env("VOXIM_ENCODER", "   ");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.stt.model, "models/ggml-base.en.bin");
        assert!(config.encoder.command.is_empty());

        clear_voxim_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let file = write_toml("[audio\ndevice = \"broken\n");
        assert!(matches!(
            Config::load(file.path()),
            Err(VoximError::Config(_))
        ));
        assert!(Config::load_or_default(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.search.top_k = 0;
        assert!(matches!(
            config.validate(),
            Err(VoximError::ConfigInvalidValue { key, .. }) if key == "search.top_k"
        ));

        let mut config = Config::default();
        config.audio.chunk_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.search.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.stt.speech_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_path_is_xdg_compliant() {
        if let Ok(path) = Config::default_path() {
            assert!(path.ends_with("voxim/config.toml"));
        }
    }
}
