//! Search engine: phrase → query vector → ranked corpus paths.

use crate::embed::encoder::Encoder;
use crate::embed::query::QueryEncoder;
use crate::error::Result;
use crate::index::artifact::LoadedIndex;
use crate::index::corpus::CorpusMap;
use crate::index::store::VectorStore;
use std::path::PathBuf;
use std::sync::Arc;

/// One ranked result with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: usize,
    pub path: PathBuf,
    pub score: f32,
}

/// Read-only search over a loaded index. Share it as `Arc<SearchEngine>`.
pub struct SearchEngine {
    store: VectorStore,
    map: CorpusMap,
    query_encoder: QueryEncoder,
}

impl SearchEngine {
    /// The query encoder is pinned to the store's dimension.
    pub fn new(store: VectorStore, map: CorpusMap, query_encoder: QueryEncoder) -> Self {
        let query_encoder = query_encoder.with_expected_dimension(store.dimension());
        Self {
            store,
            map,
            query_encoder,
        }
    }

    pub fn from_index(index: LoadedIndex, encoder: Arc<dyn Encoder>) -> Self {
        if !index.model.is_empty() && index.model != encoder.model_name() {
            eprintln!(
                "voxim: index was built with '{}' but queries use '{}'",
                index.model,
                encoder.model_name()
            );
        }
        Self::new(index.store, index.map, QueryEncoder::new(encoder))
    }

    /// Number of indexed items.
    pub fn len(&self) -> usize {
        self.store.size()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Ranked hits for a phrase, best first.
    ///
    /// # Errors
    /// `EmptyQuery`, encoder errors and `DimensionMismatch` from the query
    /// encoder; `UnknownId` if store and map disagree.
    pub fn search_hits(&self, phrase: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let query = self.query_encoder.encode(phrase)?;
        self.store
            .search(&query, top_k)?
            .into_iter()
            .map(|(id, score)| {
                Ok(SearchHit {
                    id,
                    path: self.map.get_path(id)?.to_path_buf(),
                    score,
                })
            })
            .collect()
    }

    /// Ranked paths for a phrase, best first.
    pub fn search(&self, phrase: &str, top_k: usize) -> Result<Vec<PathBuf>> {
        Ok(self
            .search_hits(phrase, top_k)?
            .into_iter()
            .map(|hit| hit.path)
            .collect())
    }
}
