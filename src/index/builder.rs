//! Offline index construction: enumerate a corpus directory, encode it in
//! batches, build the store and persist it.

use crate::defaults;
use crate::embed::encoder::{EncodeInput, Encoder};
use crate::error::{Result, VoximError};
use crate::index::artifact;
use crate::index::corpus::CorpusMap;
use crate::index::store::VectorStore;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Progress callback receiving `(items_done, items_total)` after each batch.
pub type ProgressFn = Box<dyn Fn(usize, usize) + Send>;

/// What `build_and_save` wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSummary {
    pub path: PathBuf,
    pub items: usize,
    pub dimension: usize,
    pub model: String,
}

/// Batch job turning a directory of images into an index artifact.
pub struct IndexBuilder {
    encoder: Arc<dyn Encoder>,
    batch_size: usize,
    extensions: Vec<String>,
    progress: Option<ProgressFn>,
}

impl IndexBuilder {
    pub fn new(encoder: Arc<dyn Encoder>) -> Self {
        Self {
            encoder,
            batch_size: defaults::BATCH_SIZE,
            extensions: defaults::IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            progress: None,
        }
    }

    /// Items per encoder request. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// File extensions to pick up, compared case-insensitively.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    /// List indexable files directly inside `dir`, sorted by file name.
    ///
    /// The returned order is the id assignment.
    ///
    /// # Errors
    /// - `CorpusNotFound` if `dir` is missing or not a directory
    /// - `EmptyCorpus` if no file has an accepted extension
    pub fn collect_items(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(VoximError::CorpusNotFound {
                path: dir.display().to_string(),
            });
        }

        let mut items = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && self.accepts(&path) {
                items.push(path);
            }
        }

        if items.is_empty() {
            return Err(VoximError::EmptyCorpus {
                path: dir.display().to_string(),
            });
        }

        items.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(items)
    }

    /// Encode every item in `dir` and build the store and map.
    ///
    /// # Errors
    /// Listing errors from [`collect_items`](Self::collect_items), `Encoder`
    /// if a batch fails or returns the wrong number of vectors,
    /// `DimensionMismatch` if vector lengths disagree, `ZeroVector` if a
    /// vector cannot be normalized.
    pub fn build(&self, dir: &Path) -> Result<(VectorStore, CorpusMap)> {
        let items = self.collect_items(dir)?;
        let total = items.len();

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(total);
        let mut dimension: Option<usize> = None;

        for batch in items.chunks(self.batch_size) {
            let inputs: Vec<EncodeInput> = batch.iter().cloned().map(EncodeInput::Image).collect();
            let encoded = self.encoder.encode_batch(&inputs)?;
            if encoded.len() != batch.len() {
                return Err(VoximError::Encoder {
                    message: format!(
                        "returned {} vectors for a batch of {}",
                        encoded.len(),
                        batch.len()
                    ),
                });
            }

            for vector in encoded {
                let expected = *dimension.get_or_insert(vector.len());
                if vector.len() != expected {
                    return Err(VoximError::DimensionMismatch {
                        expected,
                        actual: vector.len(),
                    });
                }
                vectors.push(vector);
            }

            if let Some(progress) = &self.progress {
                progress(vectors.len(), total);
            }
        }

        let store = VectorStore::build(dimension.unwrap_or(0), vectors)?;
        Ok((store, CorpusMap::new(items)))
    }

    /// Build the index for `dir` and write it to `output`.
    ///
    /// Nothing is written unless every step succeeds; an existing artifact
    /// at `output` is left untouched on failure.
    pub fn build_and_save(&self, dir: &Path, output: &Path) -> Result<IndexSummary> {
        let (store, map) = self.build(dir)?;
        let model = self.encoder.model_name().to_string();
        artifact::save(output, &store, &map, &model)?;

        Ok(IndexSummary {
            path: output.to_path_buf(),
            items: store.size(),
            dimension: store.dimension(),
            model,
        })
    }
}
