pub mod gemini;
pub mod groq;
pub mod vision;

use async_trait::async_trait;
use thiserror::Error;

use crate::chat::prompt::PromptPart;
pub use self::gemini::GeminiClient;
pub use self::groq::GroqClient;
pub use self::vision::{decode_image, DecodedImage, ImageDecodeError};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("model API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("model returned no content")]
    Empty,
}

/// Single-prompt text completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Completion over interleaved text sections and one image.
#[async_trait]
pub trait VisionGenerator: Send + Sync {
    async fn generate_with_image(
        &self,
        parts: &[PromptPart],
        image: &DecodedImage,
    ) -> Result<String, GenerationError>;
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GenerationError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(GenerationError::Api { status, body })
}
