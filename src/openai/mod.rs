
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::OpenAiConfig;
use crate::{ChatError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

/// HTTP client for the OpenAI embeddings and chat completions APIs.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
    agent: ureq::Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAiClient {
    #[inline]
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| ChatError::Config(format!("Invalid OpenAI base URL: {e}")))?;

        // Treat HTTP error statuses as responses so the provider's error
        // message can be surfaced.
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
            agent,
        })
    }

    #[inline]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        self
    }

    /// Generate an embedding vector for a single text.
    #[inline]
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()])?;
        embeddings
            .pop()
            .ok_or_else(|| ChatError::Embedding("Response carried no embedding".to_string()))
    }

    /// Generate embedding vectors for multiple texts, in input order.
    #[inline]
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let request = EmbeddingsRequest {
            model: self.embedding_model.clone(),
            input: texts.to_vec(),
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| ChatError::Embedding(format!("Failed to serialize request: {e}")))?;

        let response_text = self.post("/v1/embeddings", &body, ChatError::Embedding)?;

        let response: EmbeddingsResponse = serde_json::from_str(&response_text)
            .map_err(|e| ChatError::Embedding(format!("Failed to parse response: {e}")))?;

        if response.data.len() != texts.len() {
            return Err(ChatError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            )));
        }

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    /// Submit a chat completion request and return the answer text.
    #[inline]
    pub fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!(
            "Requesting chat completion with {} messages at temperature {}",
            messages.len(),
            self.temperature
        );

        let request = ChatCompletionRequest {
            model: self.chat_model.clone(),
            messages: messages.to_vec(),
            temperature: self.temperature,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| ChatError::Generation(format!("Failed to serialize request: {e}")))?;

        let response_text = self.post("/v1/chat/completions", &body, ChatError::Generation)?;

        let response: ChatCompletionResponse = serde_json::from_str(&response_text)
            .map_err(|e| ChatError::Generation(format!("Failed to parse response: {e}")))?;

        let answer = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        if answer.trim().is_empty() {
            return Err(ChatError::Generation(
                "Provider returned an empty answer".to_string(),
            ));
        }

        debug!("Received answer ({} characters)", answer.len());
        Ok(answer)
    }

    fn post(
        &self,
        path: &str,
        body: &str,
        provider_error: fn(String) -> ChatError,
    ) -> Result<String> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ChatError::Config(format!("Failed to build request URL: {e}")))?;

        let mut response = self
            .agent
            .post(url.as_str())
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(body)
            .map_err(|e| map_transport_error(&e))?;

        let status = response.status();
        let response_text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ChatError::Network(format!("Failed to read response body: {e}")))?;

        if status.is_success() {
            return Ok(response_text);
        }

        let message = parse_error_message(&response_text)
            .unwrap_or_else(|| format!("HTTP {status}: {response_text}"));

        warn!("OpenAI request to {path} failed: {message}");

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ChatError::Network(format!(
                "Authentication failed: {message}"
            )));
        }

        Err(provider_error(message))
    }
}

fn parse_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
}

fn map_transport_error(error: &ureq::Error) -> ChatError {
    ChatError::Network(format!("Failed to reach OpenAI: {error}"))
}
