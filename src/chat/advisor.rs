use std::sync::Arc;

use uuid::Uuid;

use super::history::HistoryStore;
use super::prompt::{assemble_prompt, consult_prompt_parts};
use crate::error::AppError;
use crate::llm::{decode_image, TextGenerator, VisionGenerator};
use crate::rag::Retriever;

pub const GENERATION_FALLBACK: &str = "An internal error occurred while generating the AI response.";
pub const EMPTY_QUESTION_REPLY: &str = "Please ask a valid question.";
pub const SCREENSHOT_APOLOGY: &str =
    "I'm sorry, I couldn't understand the screenshot you sent. Please try again.";
pub const VISION_APOLOGY: &str =
    "I'm sorry, I encountered an error analyzing the screen. Please ask again.";

/// Answers questions in the advisor persona. Retrieval failures are errors;
/// model and image failures become apologetic answers.
pub struct Advisor {
    retriever: Retriever,
    history: Arc<dyn HistoryStore>,
    generator: Arc<dyn TextGenerator>,
    vision: Option<Arc<dyn VisionGenerator>>,
}

impl Advisor {
    pub fn new(
        retriever: Retriever,
        history: Arc<dyn HistoryStore>,
        generator: Arc<dyn TextGenerator>,
        vision: Option<Arc<dyn VisionGenerator>>,
    ) -> Self {
        Self { retriever, history, generator, vision }
    }

    pub fn vision_enabled(&self) -> bool {
        self.vision.is_some()
    }

    pub fn indexed_chunks(&self) -> usize {
        self.retriever.index().len()
    }

    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Query embedding is CPU-bound, so it runs on the blocking pool.
    async fn context_for(&self, question: &str) -> Result<String, AppError> {
        let retriever = self.retriever.clone();
        let question = question.to_string();
        tokio::task::spawn_blocking(move || retriever.retrieve_context(&question))
            .await
            .map_err(|e| AppError::Internal(format!("retrieval task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("retrieval failed: {:#}", e)))
    }

    /// Retrieve, prompt, generate. Never fails on the model call.
    pub async fn answer(&self, question: &str, chat_history: &str) -> Result<String, AppError> {
        if question.trim().is_empty() {
            return Ok(EMPTY_QUESTION_REPLY.to_string());
        }

        let context = self.context_for(question).await?;
        let prompt = assemble_prompt(chat_history, &context, question);

        match self.generator.generate(&prompt).await {
            Ok(answer) => Ok(answer),
            Err(e) => {
                tracing::error!("Text generation failed: {}", e);
                Ok(GENERATION_FALLBACK.to_string())
            }
        }
    }

    pub async fn chat(&self, user: &str, question: &str) -> Result<String, AppError> {
        let request_id = Uuid::new_v4();
        tracing::info!(%request_id, "Received question from {}", user);

        let turns = self.history.get(user).await;
        let history = self.history.format(&turns);
        let answer = self.answer(question, &history).await?;

        if !question.trim().is_empty() {
            self.history
                .append_exchange(user, question.to_string(), answer.clone())
                .await;
        }

        tracing::info!(%request_id, "Answered with {} characters", answer.len());
        Ok(answer)
    }

    pub async fn consult(&self, user: &str, question: &str, screenshot: &str) -> Result<String, AppError> {
        let vision = self
            .vision
            .as_ref()
            .ok_or_else(|| AppError::Unavailable("Screen consultation is not configured".to_string()))?;

        let request_id = Uuid::new_v4();
        tracing::info!(%request_id, "Processing consultation with screenshot from {}", user);

        let image = match decode_image(screenshot) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(%request_id, "Error processing image: {}", e);
                return Ok(SCREENSHOT_APOLOGY.to_string());
            }
        };

        let turns = self.history.get(user).await;
        let history = self.history.format(&turns);
        let context = self.context_for(question).await?;
        let parts = consult_prompt_parts(question, &history, &context);

        let answer = match vision.generate_with_image(&parts, &image).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(%request_id, "Vision generation failed: {}", e);
                VISION_APOLOGY.to_string()
            }
        };

        self.history
            .append_exchange(user, question.to_string(), answer.clone())
            .await;
        Ok(answer)
    }
}
