//! Generative-model passthrough for drafting posts and suggesting edits.
//!
//! [`GeminiClient`] calls the Gemini `generateContent` REST endpoint. The API
//! key travels in the `x-goog-api-key` header, never in the URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::auth::ErrorKind;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub const MAX_TOPIC_LEN: usize = 500;
pub const MAX_CONTENT_LEN: usize = 20_000;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("{0}")]
    Validation(String),

    #[error("AI provider error: {0}")]
    Provider(String),

    #[error("AI provider returned no text")]
    EmptyResponse,

    #[error("AI configuration error: {0}")]
    Config(String),
}

impl AiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AiError::Validation(_) => ErrorKind::Validation,
            AiError::Provider(_) | AiError::EmptyResponse => ErrorKind::Upstream,
            AiError::Config(_) => ErrorKind::Internal,
        }
    }
}

/// Text generation backend.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Model identifier reported back to clients.
    fn model(&self) -> &str;

    /// Draft a blog post about `topic`.
    async fn generate_post(&self, topic: &str) -> Result<String, AiError>;

    /// Suggest improvements for an existing text.
    async fn suggest_improvements(&self, content: &str) -> Result<String, AiError>;
}

/// Trim and bound-check user input before it reaches the model.
pub fn validate_input<'a>(field: &str, value: &'a str, max: usize) -> Result<&'a str, AiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AiError::Validation(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(AiError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(value)
}

fn post_prompt(topic: &str) -> String {
    format!(
        "Write a 300-word professional blog post about: {topic}\n\
         Format: Markdown with headings (##), bullet points, and 1-2 code blocks\n\
         Tone: Technical but accessible\n\
         Audience: Software developers"
    )
}

fn suggestion_prompt(content: &str) -> String {
    format!(
        "Suggest improvements for the following content:\n\n{content}\n\n\
         Focus on clarity, technical accuracy, and engagement.\n\
         Format: Markdown bullet points\n\
         Tone: Constructive and professional"
    )
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Concatenated text of the first candidate, or `EmptyResponse`.
fn first_candidate_text(resp: GenerateResponse) -> Result<String, AiError> {
    let text: String = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    let text = text.trim();
    if text.is_empty() {
        return Err(AiError::EmptyResponse);
    }
    Ok(text.to_string())
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    pub fn new(api_key: String, model: Option<String>) -> Result<Self, AiError> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(
        api_key: String,
        model: Option<String>,
        base_url: String,
    ) -> Result<Self, AiError> {
        if api_key.trim().is_empty() {
            return Err(AiError::Config("GEMINI_API_KEY is empty".into()));
        }
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AiError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            api_key,
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        let model = self.model.strip_prefix("models/").unwrap_or(&self.model);
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }

    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let started = std::time::Instant::now();
        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&GenerateRequest {
                contents: [RequestContent {
                    parts: [RequestPart { text: prompt }],
                }],
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Provider(format!("request timed out after {HTTP_TIMEOUT:?}"))
                } else {
                    AiError::Provider(format!("request failed: {e}"))
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(AiError::Provider(format!("Gemini returned {status}: {body}")));
        }

        let data: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| AiError::Provider(format!("response parse error: {e}")))?;
        let text = first_candidate_text(data)?;
        debug!(model = %self.model, elapsed_ms = started.elapsed().as_millis() as u64, "generation done");
        Ok(text)
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_post(&self, topic: &str) -> Result<String, AiError> {
        let topic = validate_input("topic", topic, MAX_TOPIC_LEN)?;
        self.generate(&post_prompt(topic)).await
    }

    async fn suggest_improvements(&self, content: &str) -> Result<String, AiError> {
        let content = validate_input("content", content, MAX_CONTENT_LEN)?;
        self.generate(&suggestion_prompt(content)).await
    }
}
