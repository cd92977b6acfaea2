use std::path::Path;

use anyhow::{Context, Result};
use fastembed::{
    EmbeddingModel, InitOptions, InitOptionsUserDefined, TextEmbedding, TokenizerFiles,
    UserDefinedEmbeddingModel,
};

pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";
const MINILM_DIMENSION: usize = 384;

/// Turns text into fixed-size vectors. Implementations must be deterministic.
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(vec![text.to_string()])?
            .into_iter()
            .next()
            .context("Embedding model returned no vector")
    }
}

pub struct EmbeddingGenerator {
    model: TextEmbedding,
    model_name: String,
}

impl EmbeddingGenerator {
    /// Loads all-MiniLM-L6-v2, either from a local export in `model_dir` or
    /// through the fastembed download cache.
    pub fn new(model_dir: Option<&Path>) -> Result<Self> {
        match model_dir {
            Some(dir) => Self::from_dir(dir),
            None => {
                tracing::info!("Loading embedding model ({})...", DEFAULT_MODEL_NAME);
                let model = TextEmbedding::try_new(InitOptions {
                    model_name: EmbeddingModel::AllMiniLML6V2,
                    show_download_progress: true,
                    ..Default::default()
                })
                .map_err(|e| anyhow::anyhow!("Failed to initialize embedding model: {}", e))?;
                tracing::info!("Embedding model initialized successfully");
                Ok(Self { model, model_name: DEFAULT_MODEL_NAME.to_string() })
            }
        }
    }

    fn from_dir(model_dir: &Path) -> Result<Self> {
        tracing::info!("Initializing embedding model from {}", model_dir.display());

        if !model_dir.exists() {
            anyhow::bail!("Model directory not found: {}", model_dir.display());
        }

        let read = |name: &str| {
            std::fs::read(model_dir.join(name))
                .with_context(|| format!("Failed to read {}", name))
        };

        let user_model = UserDefinedEmbeddingModel {
            onnx_file: read("model.onnx")?,
            tokenizer_files: TokenizerFiles {
                tokenizer_file: read("tokenizer.json")?,
                config_file: read("config.json")?,
                special_tokens_map_file: read("special_tokens_map.json")?,
                tokenizer_config_file: read("tokenizer_config.json")?,
            },
        };

        let model = TextEmbedding::try_new_from_user_defined(user_model, InitOptionsUserDefined::default())
            .map_err(|e| anyhow::anyhow!("Failed to initialize embedding model: {}", e))?;

        tracing::info!("Embedding model initialized successfully");
        Ok(Self { model, model_name: DEFAULT_MODEL_NAME.to_string() })
    }
}

impl Embedder for EmbeddingGenerator {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dimension(&self) -> usize {
        MINILM_DIMENSION
    }

    fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embeddings = self.model.embed(texts, None)?;
        Ok(embeddings)
    }
}
