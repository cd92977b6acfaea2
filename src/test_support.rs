//! Deterministic doubles shared by the unit tests.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jsonwebtoken::Algorithm;

use crate::auth::AuthConfig;
use crate::chat::prompt::PromptPart;
use crate::indexer::chunker::TextChunk;
use crate::llm::{DecodedImage, GenerationError, TextGenerator, VisionGenerator};
use crate::rag::{Distance, Embedder, Retriever, VectorIndex};
use crate::sheets::{SheetError, SheetRow, SheetStore};

/// Bag-of-words feature hashing, L2-normalised.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            vector[(hasher.finish() % self.dimension as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::with_dimension(256)
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-test"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

#[derive(Default)]
pub struct CountingEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(texts)
    }
}

pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "hash-test"
    }

    fn dimension(&self) -> usize {
        256
    }

    fn embed(&self, _texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("embedding backend offline")
    }
}

/// Records the thread each embedding call runs on.
#[derive(Default)]
pub struct ThreadRecordingEmbedder {
    inner: HashEmbedder,
    threads: Mutex<Vec<std::thread::ThreadId>>,
}

impl ThreadRecordingEmbedder {
    pub fn threads(&self) -> Vec<std::thread::ThreadId> {
        self.threads.lock().unwrap().clone()
    }
}

impl Embedder for ThreadRecordingEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        self.threads.lock().unwrap().push(std::thread::current().id());
        self.inner.embed(texts)
    }
}

const KNOWLEDGE: &[&str] = &[
    "SIP is a systematic investment plan where you invest a fixed amount every month.",
    "Equity is the only asset class that has consistently beaten inflation over 15 years.",
    "Gold is a hedge, not a wealth creator. Keep it under ten percent of the portfolio.",
    "Real estate is illiquid and its rental yield rarely beats fixed deposits.",
    "Review asset allocation once a year and rebalance when equity drifts beyond the band.",
];

/// Retriever over a small fixed knowledge base, queried with `embedder`.
pub fn retriever_with(embedder: Arc<dyn Embedder>) -> Retriever {
    let chunks = KNOWLEDGE.iter().enumerate().map(|(i, text)| TextChunk {
        text: text.to_string(),
        chunk_index: i,
        start: 0,
        end: text.len(),
    });
    let index = VectorIndex::build(chunks, &HashEmbedder::default(), Distance::Euclidean).unwrap();
    Retriever::new(Arc::new(index), embedder, 3)
}

pub fn retriever() -> Retriever {
    retriever_with(Arc::new(HashEmbedder::default()))
}

pub struct StubGenerator {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    pub fn replying(reply: &str) -> Self {
        Self { reply: Some(reply.to_string()), prompts: Mutex::new(Vec::new()) }
    }

    pub fn failing() -> Self {
        Self { reply: None, prompts: Mutex::new(Vec::new()) }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().ok_or(GenerationError::Api { status: 503, body: "overloaded".into() })
    }
}

pub struct StubVision {
    reply: Option<String>,
    last: Mutex<Option<(Vec<PromptPart>, &'static str)>>,
}

impl StubVision {
    pub fn replying(reply: &str) -> Self {
        Self { reply: Some(reply.to_string()), last: Mutex::new(None) }
    }

    pub fn failing() -> Self {
        Self { reply: None, last: Mutex::new(None) }
    }

    pub fn last_parts(&self) -> Option<Vec<PromptPart>> {
        self.last.lock().unwrap().as_ref().map(|(parts, _)| parts.clone())
    }

    pub fn last_mime(&self) -> Option<&'static str> {
        self.last.lock().unwrap().as_ref().map(|(_, mime)| *mime)
    }
}

#[async_trait]
impl VisionGenerator for StubVision {
    async fn generate_with_image(
        &self,
        parts: &[PromptPart],
        image: &DecodedImage,
    ) -> Result<String, GenerationError> {
        *self.last.lock().unwrap() = Some((parts.to_vec(), image.mime_type));
        self.reply.clone().ok_or(GenerationError::Empty)
    }
}

/// In-memory spreadsheet with the webhook's append/update semantics.
#[derive(Default)]
pub struct MemorySheets {
    sheets: Mutex<HashMap<String, Vec<SheetRow>>>,
    fail_next: AtomicBool,
}

impl MemorySheets {
    pub fn sheet(&self, name: &str) -> Vec<SheetRow> {
        self.sheets.lock().unwrap().get(name).cloned().unwrap_or_default()
    }

    /// The next call returns a webhook error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SheetError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SheetError::Status("Script error".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SheetStore for MemorySheets {
    async fn rows(&self, sheet: &str, params: &[(&str, &str)]) -> Result<Vec<SheetRow>, SheetError> {
        self.check()?;
        Ok(self
            .sheet(sheet)
            .into_iter()
            .filter(|row| params.iter().all(|(k, v)| row.get(*k).and_then(|c| c.as_str()) == Some(*v)))
            .collect())
    }

    async fn append(&self, sheet: &str, data: SheetRow) -> Result<(), SheetError> {
        self.check()?;
        self.sheets.lock().unwrap().entry(sheet.to_string()).or_default().push(data);
        Ok(())
    }

    async fn update(
        &self,
        sheet: &str,
        key_column: &str,
        key: &str,
        values: SheetRow,
    ) -> Result<(), SheetError> {
        self.check()?;
        let mut sheets = self.sheets.lock().unwrap();
        let row = sheets
            .get_mut(sheet)
            .and_then(|rows| rows.iter_mut().find(|row| row.get(key_column).and_then(|c| c.as_str()) == Some(key)))
            .ok_or_else(|| SheetError::Status(format!("No row with {}={}", key_column, key)))?;
        row.extend(values);
        Ok(())
    }
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-secret".to_string(),
        algorithm: Algorithm::HS256,
        jwt_expiration_hours: 24,
        bcrypt_cost: 4,
    }
}
