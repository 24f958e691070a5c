#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info};
use url::Url;

use crate::RagError;
use crate::config::GeminiConfig;
use crate::embeddings::EmbeddingFunction;
use crate::generation::TextGenerator;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Blocking client for the Gemini embedding and generation endpoints
#[derive(Clone)]
pub struct GeminiClient {
    base_url: Url,
    api_key: String,
    embedding_model: String,
    generation_model: String,
    batch_size: u32,
    agent: ureq::Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TaskType {
    RetrievalDocument,
    RetrievalQuery,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

impl Content {
    fn text(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    model: String,
    content: Content,
    task_type: TaskType,
}

#[derive(Debug, Serialize)]
struct BatchEmbedContentsRequest {
    requests: Vec<EmbedContentRequest>,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedContentsResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ApiError,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: Option<u16>,
    pub message: String,
    pub status: Option<String>,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("embedding_model", &self.embedding_model)
            .field("generation_model", &self.generation_model)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    #[inline]
    pub fn new(config: &GeminiConfig, api_key: impl Into<String>) -> crate::Result<Self> {
        let base_url = config
            .api_url()
            .map_err(|e| RagError::Config(format!("Failed to build Gemini URL: {e}")))?;

        Ok(Self {
            base_url,
            api_key: api_key.into(),
            embedding_model: model_path(&config.embedding_model),
            generation_model: model_path(&config.generation_model),
            batch_size: config.batch_size.max(1),
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    /// Check that both configured models exist and the key is accepted
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Gemini at {}", self.base_url);

        for model in [&self.embedding_model, &self.generation_model] {
            let url = self
                .base_url
                .join(model)
                .context("Failed to build model URL")?;

            let mut response = self
                .agent
                .get(url.as_str())
                .header(API_KEY_HEADER, self.api_key.as_str())
                .call()
                .with_context(|| format!("Failed to reach Gemini API for {model}"))?;

            let status = response.status();
            let body = response
                .body_mut()
                .read_to_string()
                .context("Failed to read model response")?;

            if !status.is_success() {
                return Err(api_error(status.as_u16(), &body))
                    .with_context(|| format!("Model validation failed for {model}"));
            }
        }

        info!(
            "Health check passed for {} and {}",
            self.embedding_model, self.generation_model
        );
        Ok(())
    }

    /// Embed stored texts, sending at most `batch_size` texts per request
    #[inline]
    pub fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size as usize) {
            let batch_embeddings = self
                .embed_single_batch(batch)
                .with_context(|| format!("Failed to process batch of {} texts", batch.len()))?;

            embeddings.extend(batch_embeddings);
        }

        debug!("Generated {} embeddings total", embeddings.len());
        Ok(embeddings)
    }

    /// Embed a search query
    #[inline]
    pub fn embed_query_text(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating query embedding (length: {})", text.len());

        let request = EmbedContentRequest {
            model: self.embedding_model.clone(),
            content: Content::text(text),
            task_type: TaskType::RetrievalQuery,
        };

        let url = self.model_url(&self.embedding_model, "embedContent")?;
        let response: EmbedContentResponse = self
            .post_json(&url, &request)
            .context("Failed to generate query embedding")?;

        Ok(response.embedding.values)
    }

    /// Send a prompt to the generation model and return the answer text
    #[inline]
    pub fn generate_content(&self, prompt: &str) -> Result<String> {
        debug!(
            "Generating content with {} (prompt length: {})",
            self.generation_model,
            prompt.len()
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                ..Content::text(prompt)
            }],
        };

        let url = self.model_url(&self.generation_model, "generateContent")?;
        let response: GenerateContentResponse = self
            .post_json(&url, &request)
            .context("Failed to generate content")?;

        extract_text(response)
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = BatchEmbedContentsRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: self.embedding_model.clone(),
                    content: Content::text(text),
                    task_type: TaskType::RetrievalDocument,
                })
                .collect(),
        };

        let url = self.model_url(&self.embedding_model, "batchEmbedContents")?;
        let response: BatchEmbedContentsResponse = self
            .post_json(&url, &request)
            .context("Failed to generate batch embeddings")?;

        if response.embeddings.len() != texts.len() {
            return Err(anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            ));
        }

        Ok(response
            .embeddings
            .into_iter()
            .map(|embedding| embedding.values)
            .collect())
    }

    fn model_url(&self, model: &str, method: &str) -> Result<Url> {
        self.base_url
            .join(&format!("{model}:{method}"))
            .with_context(|| format!("Failed to build {method} URL"))
    }

    fn post_json<T, R>(&self, url: &Url, body: &T) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let request_json = serde_json::to_string(body).context("Failed to serialize request")?;

        let mut response = self
            .agent
            .post(url.as_str())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .map_err(|e| {
                error!("Request to {} failed: {}", url.path(), e);
                anyhow!("Request error: {e}")
            })?;

        let status = response.status();
        let response_text = response
            .body_mut()
            .read_to_string()
            .context("Failed to read response body")?;

        if !status.is_success() {
            error!("Gemini API returned HTTP {} for {}", status, url.path());
            return Err(api_error(status.as_u16(), &response_text));
        }

        serde_json::from_str(&response_text).context("Failed to parse response")
    }
}

impl EmbeddingFunction for GeminiClient {
    #[inline]
    fn embed_documents(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        self.embed_texts(texts)
            .map_err(|e| RagError::Embedding(format!("{e:#}")))
    }

    #[inline]
    fn embed_query(&self, text: &str) -> crate::Result<Vec<f32>> {
        self.embed_query_text(text)
            .map_err(|e| RagError::Embedding(format!("{e:#}")))
    }
}

impl TextGenerator for GeminiClient {
    #[inline]
    fn generate(&self, prompt: &str) -> crate::Result<String> {
        self.generate_content(prompt)
            .map_err(|e| RagError::Generation(format!("{e:#}")))
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Accept model names with or without the `models/` prefix
fn model_path(model: &str) -> String {
    let model = model.trim();
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

fn api_error(status: u16, body: &str) -> anyhow::Error {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => anyhow!(
            "Gemini API error (HTTP {}{}): {}",
            status,
            parsed
                .error
                .status
                .map(|s| format!(", {s}"))
                .unwrap_or_default(),
            parsed.error.message
        ),
        Err(_) => anyhow!("Gemini API error: HTTP {status}"),
    }
}

fn extract_text(response: GenerateContentResponse) -> Result<String> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(anyhow!("Gemini returned no answer: {reason}"));
    };

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(anyhow!(
            "Gemini returned an empty answer (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ));
    }

    Ok(text)
}
