use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::vision::DecodedImage;
use super::{check_status, GenerationError, VisionGenerator};
use crate::chat::prompt::PromptPart;

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(base_url: String, api_key: String, model: String, timeout: Duration) -> Result<Self, GenerationError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    fn to_parts(parts: &[PromptPart], image: &DecodedImage) -> Vec<GeminiPart> {
        parts
            .iter()
            .map(|part| match part {
                PromptPart::Text(text) => GeminiPart::Text { text: text.clone() },
                PromptPart::Screenshot => GeminiPart::InlineData {
                    inline_data: GeminiInlineData {
                        mime_type: image.mime_type.to_string(),
                        data: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
                    },
                },
            })
            .collect()
    }
}

#[async_trait]
impl VisionGenerator for GeminiClient {
    async fn generate_with_image(
        &self,
        parts: &[PromptPart],
        image: &DecodedImage,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = GenerateRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: Self::to_parts(parts, image),
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let generated: GenerateResponse = check_status(response).await?.json().await?;

        let text: String = generated
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| match part {
                        GeminiPart::Text { text } => Some(text),
                        GeminiPart::InlineData { .. } => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationError::Empty);
        }
        Ok(text)
    }
}
