//! Application entry points behind the `voxim` subcommands.
//!
//! Composition root: turns a [`Config`] plus CLI overrides into concrete
//! encoders, recognizers and sources, then hands them to the library.

use crate::audio::AudioSource;
use crate::audio::wav::WavAudioSource;
use crate::cli::ListenArgs;
use crate::config::Config;
use crate::embed::{CommandEncoder, Encoder};
use crate::error::{Result, VoximError};
use crate::index::{IndexBuilder, IndexSummary, artifact};
use crate::keywords::KeywordExtractor;
use crate::output;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::search::{SearchEngine, SearchHit};
use crate::stt::{
    SegmenterConfig, SegmentingRecognizer, StreamingRecognizer, Transcriber, WhisperConfig,
    WhisperTranscriber,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Start the configured embedding model process.
fn spawn_encoder(config: &Config) -> Result<Arc<dyn Encoder>> {
    if config.encoder.command.is_empty() {
        return Err(VoximError::EncoderNotFound {
            command: "(none configured: set [encoder] command or VOXIM_ENCODER)".to_string(),
        });
    }
    Ok(Arc::new(CommandEncoder::spawn(&config.encoder.command)?))
}

/// Load the index and attach a query encoder.
fn load_engine(config: &Config, index: Option<PathBuf>, verbosity: u8) -> Result<SearchEngine> {
    let path = index.unwrap_or_else(|| config.search.index_path.clone());
    let loaded = artifact::load(&path)?;
    if verbosity >= 1 {
        eprintln!(
            "voxim: loaded {} items ({} dims, model {}) from {}",
            loaded.store.size(),
            loaded.store.dimension(),
            loaded.model,
            path.display()
        );
    }
    let encoder = spawn_encoder(config)?;
    Ok(SearchEngine::from_index(loaded, encoder))
}

fn progress_bar(quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let pb = ProgressBar::new(0);
    pb.set_style(
        // SAFETY: hardcoded template string, always valid
        #[allow(clippy::expect_used)]
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} images ({eta})")
            .expect("hardcoded progress bar template")
            .progress_chars("#>-"),
    );
    Some(pb)
}

/// Build an index from `dir` and write it to `output` (or the configured path).
pub fn run_index_command(
    mut config: Config,
    dir: &Path,
    output: Option<PathBuf>,
    batch_size: Option<usize>,
    quiet: bool,
) -> Result<IndexSummary> {
    if let Some(size) = batch_size {
        config.search.batch_size = size;
    }
    config.validate()?;
    let output = output.unwrap_or_else(|| config.search.index_path.clone());

    let encoder = spawn_encoder(&config)?;
    let mut builder = IndexBuilder::new(encoder)
        .with_batch_size(config.search.batch_size)
        .with_extensions(&config.search.extensions);

    let pb = progress_bar(quiet);
    if let Some(pb) = pb.clone() {
        builder = builder.with_progress(Box::new(move |done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        }));
    }

    let result = builder.build_and_save(dir, &output);
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let summary = result?;

    if !quiet {
        eprintln!(
            "Indexed {} images ({} dims, model {}) into {}",
            summary.items,
            summary.dimension,
            summary.model,
            summary.path.display()
        );
    }
    Ok(summary)
}

/// One-shot text search. Returns the hits in rank order.
pub fn run_search_command(
    config: Config,
    query: &[String],
    top_k: Option<usize>,
    index: Option<PathBuf>,
    keywords: bool,
    verbosity: u8,
) -> Result<Vec<SearchHit>> {
    let mut phrase = query.join(" ");
    if keywords {
        phrase = KeywordExtractor::default().extract(&phrase)?;
        if verbosity >= 1 {
            eprintln!("voxim: searching for '{phrase}'");
        }
    }
    let engine = load_engine(&config, index, verbosity)?;
    let hits = engine.search_hits(&phrase, top_k.unwrap_or(crate::defaults::SEARCH_TOP_K))?;
    println!("{}", output::format_hits(&hits));
    Ok(hits)
}

/// Print the search phrase the voice pipeline would derive from `text`.
pub fn run_keywords_command(text: &[String]) -> Result<String> {
    let phrase = KeywordExtractor::default().extract(&text.join(" "))?;
    println!("{phrase}");
    Ok(phrase)
}

fn create_recognizer(config: &Config, quiet: bool) -> Result<Arc<dyn StreamingRecognizer>> {
    let whisper_config = WhisperConfig {
        model_path: PathBuf::from(&config.stt.model),
        language: config.stt.language.clone(),
        threads: config.stt.threads,
    };
    if !quiet {
        eprintln!("Loading model '{}'...", config.stt.model);
    }
    let transcriber: Arc<dyn Transcriber> = Arc::new(WhisperTranscriber::new(whisper_config)?);
    let segmenter = SegmenterConfig {
        speech_threshold: config.stt.speech_threshold,
        silence_ms: config.stt.silence_ms,
        max_utterance_ms: config.stt.max_utterance_ms,
        sample_rate: config.audio.sample_rate,
        ..Default::default()
    };
    Ok(Arc::new(
        SegmentingRecognizer::new(transcriber, segmenter)
            .with_partial_interval_ms(config.stt.partial_interval_ms),
    ))
}

fn open_source(config: &Config, wav: Option<&Path>) -> Result<Box<dyn AudioSource>> {
    if let Some(path) = wav {
        let file = File::open(path)?;
        return Ok(Box::new(WavAudioSource::from_reader_at(
            Box::new(BufReader::new(file)),
            config.audio.sample_rate,
        )?));
    }
    open_microphone(config)
}

#[cfg(feature = "cpal-audio")]
fn open_microphone(config: &Config) -> Result<Box<dyn AudioSource>> {
    use crate::audio::microphone::CpalAudioSource;
    Ok(Box::new(
        CpalAudioSource::new(config.audio.device.as_deref())?
            .with_sample_rate(config.audio.sample_rate),
    ))
}

#[cfg(not(feature = "cpal-audio"))]
fn open_microphone(_config: &Config) -> Result<Box<dyn AudioSource>> {
    Err(VoximError::AudioCapture {
        message: "built without microphone support; use --wav".to_string(),
    })
}

/// Why `listen` stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenExit {
    Interrupted,
    Terminated,
    TimeUp,
    SourceEnded,
}

/// Run the live voice search pipeline until interrupted, the optional
/// duration elapses, or a finite source is exhausted.
pub async fn run_listen_command(
    mut config: Config,
    args: ListenArgs,
    quiet: bool,
    verbosity: u8,
) -> Result<()> {
    if let Some(device) = args.device {
        config.audio.device = Some(device);
    }
    if let Some(model) = args.model {
        config.stt.model = model.to_string_lossy().into_owned();
    }
    if let Some(top_k) = args.top_k {
        config.search.top_k = top_k;
    }
    config.validate()?;

    let engine = Arc::new(load_engine(&config, args.index, verbosity)?);
    let recognizer = create_recognizer(&config, quiet)?;
    let source = open_source(&config, args.wav.as_deref())?;

    let pipeline_config = PipelineConfig {
        sample_rate: config.audio.sample_rate,
        chunk_ms: config.audio.chunk_ms,
        top_k: config.search.top_k,
        max_session_restarts: config.pipeline.max_session_restarts,
        echo_partials: config.pipeline.echo_partials,
        verbosity,
        quiet,
    };
    let handle = Pipeline::new(pipeline_config).start(
        source,
        recognizer,
        KeywordExtractor::default(),
        engine,
    )?;

    if !quiet {
        eprintln!("Listening. Say what you are looking for.");
    }

    let messages = handle.messages();
    let mut renderer = tokio::task::spawn_blocking(move || {
        for message in messages.iter() {
            output::render_message(&message, quiet);
        }
    });

    let limit = async {
        match args.duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };

    let exit = tokio::select! {
        _ = tokio::signal::ctrl_c() => ListenExit::Interrupted,
        res = wait_for_sigterm() => {
            if let Err(e) = res {
                eprintln!("voxim: {e}");
            }
            ListenExit::Terminated
        }
        _ = limit => ListenExit::TimeUp,
        _ = &mut renderer => ListenExit::SourceEnded,
    };

    if !quiet && exit != ListenExit::SourceEnded {
        output::clear_line();
        eprintln!("Shutting down...");
    }

    // Joining blocks until queued transcripts are searched.
    tokio::task::spawn_blocking(move || handle.stop())
        .await
        .map_err(|e| VoximError::Other(format!("Pipeline shutdown task failed: {e}")))?;

    if exit != ListenExit::SourceEnded
        && let Err(e) = tokio::time::timeout(Duration::from_secs(5), renderer).await
    {
        eprintln!("voxim: output did not drain: {e}");
    }

    Ok(())
}

/// Wait for SIGTERM.
#[cfg(unix)]
async fn wait_for_sigterm() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| VoximError::Other(format!("Failed to register SIGTERM handler: {}", e)))?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_sigterm() -> Result<()> {
    // On non-Unix, just wait forever (Ctrl+C will still work)
    std::future::pending::<()>().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_encoder_requires_command() {
        let config = Config::default();
        assert!(matches!(
            spawn_encoder(&config),
            Err(VoximError::EncoderNotFound { .. })
        ));
    }

    #[test]
    fn test_keywords_command_reduces_sentence() {
        let text = vec!["show me dogs playing in the park".to_string()];
        assert_eq!(run_keywords_command(&text).unwrap(), "dog play park");
    }

    #[test]
    fn test_keywords_command_rejects_stopwords_only() {
        let text = vec!["could you show me".to_string()];
        assert!(matches!(
            run_keywords_command(&text),
            Err(VoximError::NoKeywords)
        ));
    }

    #[test]
    fn test_search_command_reports_missing_index() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = run_search_command(
            Config::default(),
            &["red".to_string()],
            None,
            Some(dir.path().join("missing.json")),
            false,
            0,
        );
        assert!(matches!(result, Err(VoximError::IndexNotFound { .. })));
    }

    #[test]
    fn test_index_command_rejects_zero_batch_size() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = run_index_command(Config::default(), dir.path(), None, Some(0), true);
        assert!(matches!(
            result,
            Err(VoximError::ConfigInvalidValue { .. })
        ));
    }
}
