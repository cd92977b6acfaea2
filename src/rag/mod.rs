pub mod embeddings;
pub mod index_manager;
pub mod retriever;
pub mod vector_store;

use thiserror::Error;

pub use self::embeddings::{Embedder, EmbeddingGenerator};
pub use self::retriever::Retriever;
pub use self::vector_store::{Distance, SearchHit, VectorIndex};

/// Failures while producing or reading the knowledge-base index. All of
/// them are fatal at startup.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to build index: {0}")]
    Build(String),
    #[error("failed to load index: {0}")]
    Load(String),
    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}
