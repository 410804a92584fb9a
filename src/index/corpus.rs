//! Association between vector ids and the resources they were encoded from.

use crate::error::{Result, VoximError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Immutable id ↔ path map with the same dense id domain as a [`VectorStore`].
///
/// [`VectorStore`]: crate::index::store::VectorStore
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusMap {
    paths: Vec<PathBuf>,
    ids: HashMap<PathBuf, usize>,
}

impl CorpusMap {
    /// Creates a map where `paths[i]` is the resource for id `i`.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        let mut ids = HashMap::with_capacity(paths.len());
        for (id, path) in paths.iter().enumerate() {
            ids.entry(path.clone()).or_insert(id);
        }
        Self { paths, ids }
    }

    /// Resource path recorded for an id.
    pub fn get_path(&self, id: usize) -> Result<&Path> {
        self.paths
            .get(id)
            .map(PathBuf::as_path)
            .ok_or(VoximError::UnknownId { id })
    }

    /// Reverse lookup. Returns the first id if a path was recorded twice.
    pub fn id_of(&self, path: &Path) -> Option<usize> {
        self.ids.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Path)> {
        self.paths.iter().map(PathBuf::as_path).enumerate()
    }

    pub(crate) fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> CorpusMap {
        CorpusMap::new(vec![
            PathBuf::from("/images/000001.jpg"),
            PathBuf::from("/images/000002.jpg"),
            PathBuf::from("/images/000003.jpg"),
        ])
    }

    #[test]
    fn test_get_path_by_id() {
        let map = map();
        assert_eq!(map.get_path(0).unwrap(), Path::new("/images/000001.jpg"));
        assert_eq!(map.get_path(2).unwrap(), Path::new("/images/000003.jpg"));
    }

    #[test]
    fn test_get_path_out_of_range() {
        let err = map().get_path(3).unwrap_err();
        assert!(matches!(err, VoximError::UnknownId { id: 3 }));
    }

    #[test]
    fn test_reverse_lookup() {
        let map = map();
        assert_eq!(map.id_of(Path::new("/images/000002.jpg")), Some(1));
        assert_eq!(map.id_of(Path::new("/images/missing.jpg")), None);
    }

    #[test]
    fn test_duplicate_path_resolves_to_first_id() {
        let map = CorpusMap::new(vec![
            PathBuf::from("a.jpg"),
            PathBuf::from("b.jpg"),
            PathBuf::from("a.jpg"),
        ]);
        assert_eq!(map.id_of(Path::new("a.jpg")), Some(0));
        assert_eq!(map.get_path(2).unwrap(), Path::new("a.jpg"));
    }

    #[test]
    fn test_iter_yields_dense_ids() {
        let ids: Vec<usize> = map().iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }
}
