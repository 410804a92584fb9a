//! On-disk index artifact: one JSON document holding the vector store and
//! the corpus map.
//!
//! Writes go to a sibling temporary file that is renamed into place, so a
//! failed build never leaves a partial artifact behind.

use crate::defaults;
use crate::error::{Result, VoximError};
use crate::index::corpus::CorpusMap;
use crate::index::store::{VectorStore, l2_norm};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Current artifact format version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct IndexDocument {
    format_version: u32,
    dimension: usize,
    #[serde(default)]
    model: String,
    paths: Vec<PathBuf>,
    vectors: Vec<Vec<f32>>,
}

/// A validated index read from disk.
#[derive(Debug, Clone)]
pub struct LoadedIndex {
    pub store: VectorStore,
    pub map: CorpusMap,
    /// Name of the encoder that produced the vectors.
    pub model: String,
}

fn corrupt(message: impl Into<String>) -> VoximError {
    VoximError::IndexCorrupt {
        message: message.into(),
    }
}

/// Persist a store and its corpus map.
///
/// # Errors
/// `IndexCorrupt` if the store and map disagree on their id domain (nothing
/// is written in that case), or I/O and serialization errors.
pub fn save(path: &Path, store: &VectorStore, map: &CorpusMap, model: &str) -> Result<()> {
    if store.size() != map.len() {
        return Err(corrupt(format!(
            "refusing to save {} vectors with {} paths",
            store.size(),
            map.len()
        )));
    }

    let document = IndexDocument {
        format_version: FORMAT_VERSION,
        dimension: store.dimension(),
        model: model.to_string(),
        paths: map.paths().to_vec(),
        vectors: store.iter().map(|(_, v)| v.to_vec()).collect(),
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temporary_path(path);
    let written = write_document(&tmp_path, &document);
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(&tmp_path)
            && cleanup.kind() != std::io::ErrorKind::NotFound
        {
            eprintln!(
                "voxim: failed to remove temporary index {}: {cleanup}",
                tmp_path.display()
            );
        }
        return Err(e);
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| defaults::INDEX_FILE_NAME.into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_document(path: &Path, document: &IndexDocument) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, document)?;
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| VoximError::Io(e.into_error()))?
        .sync_all()?;
    Ok(())
}

/// Load and validate an index artifact.
///
/// # Errors
/// - `IndexNotFound` if no file exists at `path`
/// - `IndexCorrupt` if the document cannot be parsed or violates the
///   dimension, unit-norm or id-domain invariants
pub fn load(path: &Path) -> Result<LoadedIndex> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(VoximError::IndexNotFound {
                path: path.display().to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let document: IndexDocument = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| corrupt(format!("unreadable document: {e}")))?;

    validate(&document)?;

    let store = VectorStore::build(document.dimension, document.vectors)
        .map_err(|e| corrupt(e.to_string()))?;
    let map = CorpusMap::new(document.paths);

    Ok(LoadedIndex {
        store,
        map,
        model: document.model,
    })
}

fn validate(document: &IndexDocument) -> Result<()> {
    if document.format_version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported format version {}",
            document.format_version
        )));
    }
    if document.dimension == 0 {
        return Err(corrupt("dimension is zero"));
    }
    if document.paths.len() != document.vectors.len() {
        return Err(corrupt(format!(
            "{} paths for {} vectors",
            document.paths.len(),
            document.vectors.len()
        )));
    }
    for (id, vector) in document.vectors.iter().enumerate() {
        if vector.len() != document.dimension {
            return Err(corrupt(format!(
                "vector {id} has dimension {}, expected {}",
                vector.len(),
                document.dimension
            )));
        }
        let norm = l2_norm(vector);
        if !norm.is_finite() || (norm - 1.0).abs() > defaults::LOAD_NORM_TOLERANCE {
            return Err(corrupt(format!("vector {id} is not unit-norm ({norm})")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> (VectorStore, CorpusMap) {
        let store = VectorStore::build(
            3,
            vec![vec![1.0, 2.0, 2.0], vec![0.0, 0.0, 1.0], vec![4.0, 0.0, 3.0]],
        )
        .unwrap();
        let map = CorpusMap::new(vec![
            PathBuf::from("/img/a.jpg"),
            PathBuf::from("/img/b.jpg"),
            PathBuf::from("/img/c.jpg"),
        ]);
        (store, map)
    }

    fn write_raw(dir: &TempDir, json: &serde_json::Value) -> PathBuf {
        let path = dir.path().join("index.json");
        fs::write(&path, serde_json::to_vec(json).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_save_then_load_preserves_store_and_map() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let (store, map) = sample();

        save(&path, &store, &map, "mock-encoder").unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(loaded.model, "mock-encoder");
        assert_eq!(loaded.map, map);
        assert_eq!(loaded.store.size(), 3);
        assert_eq!(loaded.store.dimension(), 3);
        for id in 0..3 {
            let original = store.vector(id).unwrap();
            let restored = loaded.store.vector(id).unwrap();
            for (a, b) in original.iter().zip(restored) {
                assert!((a - b).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_save_creates_parent_directories_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("index.json");
        let (store, map) = sample();

        save(&path, &store, &map, "m").unwrap();

        assert!(path.exists());
        assert!(!temporary_path(&path).exists());
    }

    #[test]
    fn test_save_refuses_mismatched_domains() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        let (store, _) = sample();
        let map = CorpusMap::new(vec![PathBuf::from("/img/a.jpg")]);

        let err = save(&path, &store, &map, "m").unwrap_err();
        assert!(matches!(err, VoximError::IndexCorrupt { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, VoximError::IndexNotFound { .. }));
    }

    #[test]
    fn test_load_garbage_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        fs::write(&path, b"not an index").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, VoximError::IndexCorrupt { .. }));
    }

    #[test]
    fn test_load_rejects_id_domain_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = write_raw(
            &dir,
            &serde_json::json!({
                "format_version": 1,
                "dimension": 2,
                "paths": ["a.jpg"],
                "vectors": [[1.0, 0.0], [0.0, 1.0]]
            }),
        );

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("1 paths for 2 vectors"));
    }

    #[test]
    fn test_load_rejects_wrong_vector_dimension() {
        let dir = TempDir::new().unwrap();
        let path = write_raw(
            &dir,
            &serde_json::json!({
                "format_version": 1,
                "dimension": 2,
                "paths": ["a.jpg", "b.jpg"],
                "vectors": [[1.0, 0.0], [0.0, 0.0, 1.0]]
            }),
        );

        let err = load(&path).unwrap_err();
        assert!(matches!(err, VoximError::IndexCorrupt { .. }));
        assert!(err.to_string().contains("vector 1 has dimension 3"));
    }

    #[test]
    fn test_load_rejects_non_unit_vectors() {
        let dir = TempDir::new().unwrap();
        let path = write_raw(
            &dir,
            &serde_json::json!({
                "format_version": 1,
                "dimension": 2,
                "paths": ["a.jpg"],
                "vectors": [[3.0, 4.0]]
            }),
        );

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("not unit-norm"));
    }

    #[test]
    fn test_load_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let path = write_raw(
            &dir,
            &serde_json::json!({
                "format_version": 99,
                "dimension": 2,
                "paths": [],
                "vectors": []
            }),
        );

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported format version 99"));
    }

    #[test]
    fn test_load_accepts_missing_model_field() {
        let dir = TempDir::new().unwrap();
        let path = write_raw(
            &dir,
            &serde_json::json!({
                "format_version": 1,
                "dimension": 2,
                "paths": ["a.jpg"],
                "vectors": [[0.6, 0.8]]
            }),
        );

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.model, "");
        assert_eq!(loaded.store.size(), 1);
    }
}
