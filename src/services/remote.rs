//! Remote AI model client for the problem solver
//!
//! Provides integration with the Generative Language API:
//! - One `generateContent` call per attempt
//! - Distinguishes "model unknown" from every other failure so the solver can
//!   walk its fallback list

use crate::error::{MathRpcError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// A text-generation backend addressed by model identifier
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteModel: Send + Sync {
    /// Send `prompt` to `model` and return the generated text.
    ///
    /// Must return [`MathRpcError::ModelUnavailable`] when the service does not
    /// know `model`, and any other error for every other failure.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String>;
}

/// Configuration for the remote model client
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// API credential
    pub api_key: String,

    /// Request timeout
    pub timeout: Duration,
}

/// HTTP client for the Generative Language API
pub struct GeminiClient {
    config: RemoteConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<Part>,
}

impl GeminiClient {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(MathRpcError::Config(config::ConfigError::Message(
                "remote API key not set".to_string(),
            )));
        }

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }
}

/// Whether an error reply means the model identifier is unknown to the service
pub(crate) fn is_model_unavailable(status: reqwest::StatusCode, body: &str) -> bool {
    if status == reqwest::StatusCode::NOT_FOUND {
        return true;
    }
    if status == reqwest::StatusCode::BAD_REQUEST {
        let body = body.to_lowercase();
        return body.contains("model")
            && (body.contains("not found") || body.contains("not supported"));
    }
    false
}

#[async_trait]
impl RemoteModel for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        debug!("Calling remote model {}", model);

        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(format!("{}/{}:generateContent", API_BASE, model))
            .header("x-goog-api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            if is_model_unavailable(status, &error_text) {
                return Err(MathRpcError::ModelUnavailable(model.to_string()));
            }
            return Err(MathRpcError::RemoteService(format!(
                "API request failed with status {}: {}",
                status, error_text
            )));
        }

        let api_response: GenerateResponse = response.json().await.map_err(|e| {
            MathRpcError::RemoteService(format!("Failed to parse response: {}", e))
        })?;

        api_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| MathRpcError::RemoteService("Empty response from API".to_string()))
    }
}
