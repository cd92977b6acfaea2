use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::embeddings::Embedder;
use super::IndexError;
use crate::indexer::chunker::TextChunk;

pub const SCHEMA_VERSION: u32 = 1;
const MANIFEST_FILE: &str = "manifest.json";
const VECTORS_FILE: &str = "vectors.bin";
const CHUNKS_FILE: &str = "chunks.json";
const EMBED_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    Euclidean,
    Cosine,
}

impl Default for Distance {
    fn default() -> Self {
        Distance::Euclidean
    }
}

impl Distance {
    fn between(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Distance::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
            Distance::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (norm_a * norm_b)
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk_id: usize,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    schema_version: u32,
    model: String,
    dimension: usize,
    distance: Distance,
    count: usize,
    vectors_sha256: String,
}

/// Flat exact-search index. Row `i` of `vectors` belongs to `chunks[i]`.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    model: String,
    dimension: usize,
    distance: Distance,
    chunks: Vec<String>,
    vectors: Vec<f32>,
}

impl VectorIndex {
    pub fn build(
        chunks: impl IntoIterator<Item = TextChunk>,
        embedder: &dyn Embedder,
        distance: Distance,
    ) -> Result<Self, IndexError> {
        Self::build_with_progress(chunks, embedder, distance, |_| {})
    }

    /// Like [`VectorIndex::build`], reporting the number of chunks embedded
    /// after every batch.
    pub fn build_with_progress(
        chunks: impl IntoIterator<Item = TextChunk>,
        embedder: &dyn Embedder,
        distance: Distance,
        mut on_batch: impl FnMut(usize),
    ) -> Result<Self, IndexError> {
        let texts: Vec<String> = chunks.into_iter().map(|c| c.text).collect();
        if texts.is_empty() {
            return Err(IndexError::Build("no chunks to index".to_string()));
        }

        let dimension = embedder.dimension();
        let mut vectors = Vec::with_capacity(texts.len() * dimension);

        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            let embedded = embedder.embed(batch.to_vec()).map_err(IndexError::Embedding)?;
            if embedded.len() != batch.len() {
                return Err(IndexError::Build(format!(
                    "embedder returned {} vectors for {} chunks",
                    embedded.len(),
                    batch.len()
                )));
            }
            for vector in embedded {
                if vector.len() != dimension {
                    return Err(IndexError::Build(format!(
                        "vector dimension mismatch: expected {}, got {}",
                        dimension,
                        vector.len()
                    )));
                }
                vectors.extend(vector);
            }
            on_batch(batch.len());
        }

        Ok(Self {
            model: embedder.model_name().to_string(),
            dimension,
            distance,
            chunks: texts,
            vectors,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn distance(&self) -> Distance {
        self.distance
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dimension..(i + 1) * self.dimension]
    }

    /// The `k` closest chunks, best first. Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        if query.len() != self.dimension {
            tracing::warn!(
                "Query dimension mismatch: expected {}, got {}",
                self.dimension,
                query.len()
            );
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .map(|i| (i, self.distance.between(query, self.row(i))))
            .collect();
        // Stable sort; NaN distances sink to the end.
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or_else(|| a.1.is_nan().cmp(&b.1.is_nan())));

        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| SearchHit { chunk_id: i, text: self.chunks[i].clone(), score })
            .collect()
    }

    pub fn persist(&self, dir: &Path) -> Result<(), IndexError> {
        std::fs::create_dir_all(dir)?;

        let bytes: Vec<u8> = self.vectors.iter().flat_map(|v| v.to_le_bytes()).collect();
        let manifest = Manifest {
            schema_version: SCHEMA_VERSION,
            model: self.model.clone(),
            dimension: self.dimension,
            distance: self.distance,
            count: self.chunks.len(),
            vectors_sha256: hex::encode(Sha256::digest(&bytes)),
        };

        std::fs::write(dir.join(VECTORS_FILE), &bytes)?;
        std::fs::write(dir.join(CHUNKS_FILE), serde_json::to_vec(&self.chunks)?)?;
        // Manifest last: a directory without one never loads.
        std::fs::write(dir.join(MANIFEST_FILE), serde_json::to_vec_pretty(&manifest)?)?;

        tracing::info!("Persisted {} vectors to {}", self.chunks.len(), dir.display());
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let read = |name: &str| {
            std::fs::read(dir.join(name))
                .map_err(|e| IndexError::Load(format!("cannot read {}: {}", name, e)))
        };

        let manifest: Manifest = serde_json::from_slice(&read(MANIFEST_FILE)?)
            .map_err(|e| IndexError::Load(format!("invalid manifest: {}", e)))?;
        if manifest.schema_version != SCHEMA_VERSION {
            return Err(IndexError::Load(format!(
                "unsupported schema version {} (expected {})",
                manifest.schema_version, SCHEMA_VERSION
            )));
        }

        let bytes = read(VECTORS_FILE)?;
        if hex::encode(Sha256::digest(&bytes)) != manifest.vectors_sha256 {
            return Err(IndexError::Load("vector file checksum mismatch".to_string()));
        }
        let expected_len = manifest
            .count
            .checked_mul(manifest.dimension)
            .and_then(|floats| floats.checked_mul(4));
        if manifest.dimension == 0 || expected_len != Some(bytes.len()) {
            return Err(IndexError::Load(format!(
                "vector file holds {} bytes, expected {} x {} floats",
                bytes.len(),
                manifest.count,
                manifest.dimension
            )));
        }

        let chunks: Vec<String> = serde_json::from_slice(&read(CHUNKS_FILE)?)
            .map_err(|e| IndexError::Load(format!("invalid chunk table: {}", e)))?;
        if chunks.len() != manifest.count {
            return Err(IndexError::Load(format!(
                "chunk table holds {} entries, manifest says {}",
                chunks.len(),
                manifest.count
            )));
        }

        let vectors = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        Ok(Self {
            model: manifest.model,
            dimension: manifest.dimension,
            distance: manifest.distance,
            chunks,
            vectors,
        })
    }
}
