use std::sync::Arc;

use anyhow::Result;

use super::embeddings::Embedder;
use super::vector_store::VectorIndex;

pub const DEFAULT_TOP_K: usize = 3;

/// Fixed top-k lookup over the shared read-only index.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self { index, embedder, top_k }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn retrieve(&self, question: &str) -> Result<Vec<String>> {
        let query = self.embedder.embed_one(question)?;
        let hits = self.index.search(&query, self.top_k);
        Ok(hits.into_iter().map(|hit| hit.text).collect())
    }

    /// Retrieved chunks joined by a blank line, best match first.
    pub fn retrieve_context(&self, question: &str) -> Result<String> {
        Ok(self.retrieve(question)?.join("\n\n"))
    }
}
