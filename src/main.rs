use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use feroze_backend::api::{self, AppState};
use feroze_backend::auth::{AuthConfig, AuthService};
use feroze_backend::chat::{Advisor, InMemoryHistoryStore};
use feroze_backend::config::Settings;
use feroze_backend::llm::{GeminiClient, GroqClient, VisionGenerator};
use feroze_backend::rag::index_manager::IndexManager;
use feroze_backend::rag::{Embedder, EmbeddingGenerator, Retriever};
use feroze_backend::sheets::WebhookSheets;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::load().context("Invalid configuration")?;
    let auth_config = AuthConfig::from_settings(&settings).map_err(anyhow::Error::msg)?;

    tracing::info!("Connecting to spreadsheet webhook");
    let sheets = Arc::new(WebhookSheets::new(settings.google_sheet_webhook.clone(), settings.sheet_timeout())?);

    let embedder: Arc<dyn Embedder> =
        Arc::new(EmbeddingGenerator::new(settings.embedding_model_dir.as_deref())?);
    let manager = IndexManager::from_settings(&settings)?;
    let index = manager
        .open_or_build(embedder.as_ref())
        .context("Knowledge base unavailable")?;
    let retriever = Retriever::new(Arc::new(index), embedder, settings.top_k);

    let generator = Arc::new(GroqClient::new(
        settings.groq_base_url.clone(),
        settings.groq_api_key.clone(),
        settings.groq_model.clone(),
        settings.generation_timeout(),
    )?);
    tracing::info!("Text generation via {}", generator.model());

    let vision: Option<Arc<dyn VisionGenerator>> = match settings.vision_api_key() {
        Some(key) => {
            tracing::info!("Screen consultation enabled ({})", settings.gemini_model);
            Some(Arc::new(GeminiClient::new(
                settings.gemini_base_url.clone(),
                key.to_string(),
                settings.gemini_model.clone(),
                settings.generation_timeout(),
            )?))
        }
        None => {
            tracing::warn!("GOOGLE_API_KEY not set, screen consultation disabled");
            None
        }
    };

    let state = Arc::new(AppState {
        auth: AuthService::new(auth_config, sheets),
        advisor: Advisor::new(
            retriever,
            Arc::new(InMemoryHistoryStore::new(settings.chat_history_limit)),
            generator,
            vision,
        ),
    });
    let app = api::router(state, &settings.cors_origin_list());

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("Backend server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
