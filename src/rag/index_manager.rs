use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::indexer::chunker::Chunker;
use crate::indexer::loader::load_document;
use super::embeddings::Embedder;
use super::vector_store::{Distance, VectorIndex};
use super::IndexError;

/// Where the knowledge base comes from and where its snapshot lives.
#[derive(Debug, Clone)]
pub struct IndexManager {
    index_path: PathBuf,
    doc_path: PathBuf,
    chunker: Chunker,
    distance: Distance,
}

impl IndexManager {
    pub fn new(index_path: PathBuf, doc_path: PathBuf, chunker: Chunker, distance: Distance) -> Self {
        Self { index_path, doc_path, chunker, distance }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, IndexError> {
        let chunker = Chunker::new(settings.chunk_size, settings.chunk_overlap)
            .map_err(|e| IndexError::Build(e.to_string()))?;
        Ok(Self::new(
            settings.index_path.clone(),
            settings.doc_path.clone(),
            chunker,
            settings.distance_metric,
        ))
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn doc_path(&self) -> &Path {
        &self.doc_path
    }

    /// Loads the persisted snapshot when present, otherwise builds one from
    /// the source document and persists it. Called once per process.
    pub fn open_or_build(&self, embedder: &dyn Embedder) -> Result<VectorIndex, IndexError> {
        if self.index_path.exists() {
            tracing::info!("Loading existing knowledge base from {}", self.index_path.display());
            let index = VectorIndex::load(&self.index_path)?;
            if index.dimension() != embedder.dimension() {
                return Err(IndexError::Load(format!(
                    "index dimension {} does not match embedding model dimension {}",
                    index.dimension(),
                    embedder.dimension()
                )));
            }
            if index.model() != embedder.model_name() {
                tracing::warn!(
                    "Index was built with {} but queries use {}",
                    index.model(),
                    embedder.model_name()
                );
            }
            if index.distance() != self.distance {
                tracing::warn!(
                    "Index was built with {:?} distance but {:?} is configured; using {:?}",
                    index.distance(),
                    self.distance,
                    index.distance()
                );
            }
            tracing::info!("Knowledge base loaded: {} chunks", index.len());
            return Ok(index);
        }

        tracing::info!(
            "Knowledge base not found, building from {}",
            self.doc_path.display()
        );
        self.rebuild(embedder, |_| {})
    }

    /// Chunks and embeds the source document, then overwrites the snapshot.
    pub fn rebuild(
        &self,
        embedder: &dyn Embedder,
        on_batch: impl FnMut(usize),
    ) -> Result<VectorIndex, IndexError> {
        let text = self.read_document()?;
        let chunks: Vec<_> = self.chunker.chunks(&text).collect();
        tracing::info!("Document split into {} chunks", chunks.len());

        let index = VectorIndex::build_with_progress(chunks, embedder, self.distance, on_batch)?;
        index.persist(&self.index_path)?;
        tracing::info!("Knowledge base built and saved to {}", self.index_path.display());
        Ok(index)
    }

    pub fn read_document(&self) -> Result<String, IndexError> {
        if !self.doc_path.exists() {
            return Err(IndexError::Build(format!(
                "document file not found at {}",
                self.doc_path.display()
            )));
        }
        let text = load_document(&self.doc_path).map_err(|e| IndexError::Build(format!("{:#}", e)))?;
        if text.trim().is_empty() {
            return Err(IndexError::Build(format!("document {} is empty", self.doc_path.display())));
        }
        Ok(text)
    }
}
