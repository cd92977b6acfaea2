use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::rag::Distance;

pub const CONFIG_FILE: &str = "feroze";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    pub cors_origins: String,

    pub google_sheet_webhook: String,
    pub sheet_timeout_secs: u64,

    pub jwt_secret: String,
    pub jwt_algorithm: String,
    pub jwt_expiry_hours: i64,
    pub bcrypt_cost: u32,

    pub groq_api_key: String,
    pub groq_base_url: String,
    pub groq_model: String,
    pub generation_timeout_secs: u64,

    pub google_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,

    pub doc_path: PathBuf,
    pub index_path: PathBuf,
    pub embedding_model_dir: Option<PathBuf>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub distance_metric: Distance,
    pub chat_history_limit: usize,
}

impl Settings {
    /// Defaults, then `feroze.toml` if present, then the environment
    /// (after `.env` is loaded by the caller).
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings: Settings = Self::builder()?
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(config::Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("bind_addr", "0.0.0.0:8000")?
            .set_default(
                "cors_origins",
                "http://localhost:8080,http://localhost:3000,http://127.0.0.1:3000",
            )?
            .set_default("sheet_timeout_secs", 10)?
            .set_default("jwt_algorithm", "HS256")?
            .set_default("jwt_expiry_hours", 24)?
            .set_default("bcrypt_cost", bcrypt::DEFAULT_COST)?
            .set_default("groq_base_url", "https://api.groq.com/openai/v1")?
            .set_default("groq_model", "openai/gpt-oss-20b")?
            .set_default("generation_timeout_secs", 120)?
            .set_default("gemini_base_url", "https://generativelanguage.googleapis.com/v1beta")?
            .set_default("gemini_model", "gemini-2.5-flash")?
            .set_default("doc_path", "docs/feroze.txt")?
            .set_default("index_path", "feroze_faiss_index")?
            .set_default("chunk_size", 1000)?
            .set_default("chunk_overlap", 100)?
            .set_default("top_k", 3)?
            .set_default("distance_metric", "euclidean")?
            .set_default("chat_history_limit", 10)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        let required = [
            ("GOOGLE_SHEET_WEBHOOK", &self.google_sheet_webhook),
            ("JWT_SECRET", &self.jwt_secret),
            ("GROQ_API_KEY", &self.groq_api_key),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(config::ConfigError::Message(format!("{} must not be empty", key)));
            }
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(config::ConfigError::Message(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 || self.chat_history_limit == 0 {
            return Err(config::ConfigError::Message(
                "TOP_K and CHAT_HISTORY_LIMIT must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn vision_api_key(&self) -> Option<&str> {
        self.google_api_key.as_deref().filter(|key| !key.trim().is_empty())
    }

    pub fn sheet_timeout(&self) -> Duration {
        Duration::from_secs(self.sheet_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}
