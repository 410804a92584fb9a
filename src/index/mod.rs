//! Embedding index: vector store, corpus map, on-disk artifact and the
//! offline builder.

pub mod artifact;
pub mod builder;
pub mod corpus;
pub mod store;

pub use artifact::LoadedIndex;
pub use builder::{IndexBuilder, IndexSummary};
pub use corpus::CorpusMap;
pub use store::{VectorStore, normalize};
