use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of one LLM call. Carries the HTTP status when the endpoint
/// answered at all; transport failures and malformed responses have none.
#[derive(Debug, Clone, Error)]
#[error("llm call failed: {message}")]
pub struct LlmError {
    pub status: Option<u16>,
    pub message: String,
}

impl LlmError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.2,
            max_tokens: 1000,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends one review prompt and returns the raw completion text.
    async fn review(&self, prompt: &str) -> Result<String, LlmError>;
}

pub fn create_client(config: &GenerationConfig) -> anyhow::Result<Box<dyn LlmClient>> {
    Ok(Box::new(crate::adapters::OpenAiClient::new(config.clone())?))
}

/// Expected shape of the model's completion.
#[derive(Debug, Deserialize)]
pub struct ReviewResponse {
    pub reviews: Vec<ReviewSuggestion>,
}

/// One model-produced finding. The model is told to emit an integer line
/// number but in practice sends either a JSON number or a quoted string,
/// and sometimes neither; coercion is deferred to the assembler.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewSuggestion {
    #[serde(rename = "lineNumber")]
    pub line_number: serde_json::Value,
    #[serde(rename = "reviewComment")]
    pub comment: String,
}

/// Parses a completion into suggestions. A shape mismatch is an error on the
/// same footing as a failed call, so the retry layer classifies it instead of
/// the caller crashing on bad model output.
pub fn parse_review_response(content: &str) -> Result<Vec<ReviewSuggestion>, LlmError> {
    let parsed: ReviewResponse = serde_json::from_str(content).map_err(|e| {
        LlmError::new(None, format!("response did not match expected schema: {e}"))
    })?;
    Ok(parsed.reviews)
}
