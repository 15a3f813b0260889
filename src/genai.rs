use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;

/// Anything that can go wrong while asking the model for structured content.
/// Callers treat every variant the same way: the generation failed.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("generation api error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed generation output: {0}")]
    MalformedOutput(String),
    #[error("output violated the requested schema: {0}")]
    Schema(#[from] serde_json::Error),
}

/// Boundary to the generative content service: one instruction plus a target
/// schema in, one schema-conforming JSON value out, or a `GenerateError`.
#[async_trait]
pub trait Generative: Send + Sync {
    async fn generate(&self, instruction: &str, schema: Value) -> Result<Value, GenerateError>;
}

/// Typed wrapper over `generate`. A value that parses but does not fit `T` is
/// a schema violation, reported as a first-class error rather than asserted.
pub async fn generate_as<T: DeserializeOwned>(
    generator: &dyn Generative,
    instruction: &str,
    schema: Value,
) -> Result<T, GenerateError> {
    let value = generator.generate(instruction, schema).await?;
    Ok(serde_json::from_value(value)?)
}

/// Gemini `generateContent` client with structured (JSON) output.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, base_url: String) -> GeminiClient {
        GeminiClient {
            http: Client::new(),
            api_key,
            model,
            base_url,
        }
    }

    pub fn from_config(config: &Config) -> GeminiClient {
        Self::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.gemini_base_url.clone(),
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl Generative for GeminiClient {
    async fn generate(&self, instruction: &str, schema: Value) -> Result<Value, GenerateError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": instruction }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
            },
        });

        let response = self
            .http
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerateError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GeminiResponse = response.json().await?;
        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| GenerateError::MalformedOutput("no candidates in response".to_string()))?;

        serde_json::from_str(text)
            .map_err(|e| GenerateError::MalformedOutput(format!("candidate is not valid JSON: {e}")))
    }
}
