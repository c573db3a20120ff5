//! Gemini `generateContent` client.
//!
//! - `POST {endpoint}?key={api_key}` with a single user part and a JSON
//!   response MIME type
//! - The answer text lives at `candidates[0].content.parts[0].text`

use std::env;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::TextGenerator;
use crate::error::{Error, Result};

/// Default `generateContent` URL (Gemini 2.5 Flash)
pub const DEFAULT_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent";

/// Environment variable overriding the endpoint
pub const ENDPOINT_ENV: &str = "SECRETARIAT_GEMINI_ENDPOINT";

/// Configuration for [`GeminiClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiConfig {
    /// Full `generateContent` URL
    pub endpoint: String,
}

impl GeminiConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

/// [`TextGenerator`] backed by the Gemini REST API
#[derive(Debug, Clone, Default)]
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    /// Client for `config`
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// The configured endpoint
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl TextGenerator for GeminiClient {
    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String> {
        let response = self
            .http
            .post(&self.config.endpoint)
            .query(&[("key", api_key)])
            .json(&request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Gemini request failed");
                Error::LlmNetwork(format!("Failed to connect to Gemini API: {}", e))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::LlmNetwork(format!("Failed to read Gemini response: {}", e)))?;

        if !status.is_success() {
            let err = classify_failure(status.as_u16(), &body);
            tracing::warn!(status = status.as_u16(), error = %err, "Gemini returned an error");
            return Err(err);
        }

        extract_text(&body)
    }
}

fn request_body(prompt: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": { "responseMimeType": "application/json" }
    })
}

/// Map a non-success response to an error kind
pub fn classify_failure(status: u16, body: &str) -> Error {
    match status {
        401 | 403 => return Error::LlmAuth,
        429 => return Error::LlmRateLimited,
        _ => {}
    }

    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let api_error = parsed.as_ref().and_then(|v| v.get("error"));
    let message = api_error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string);
    let api_status = api_error
        .and_then(|e| e.get("status"))
        .and_then(|s| s.as_str());

    if let (Some("INVALID_ARGUMENT"), Some(msg)) = (api_status, message.as_deref()) {
        if msg.to_lowercase().contains("api key") {
            return Error::LlmAuth;
        }
    }

    Error::LlmNetwork(message.unwrap_or_else(|| format!("Gemini API error: {}", status)))
}

/// Pull the generated text out of a success body
pub fn extract_text(body: &str) -> Result<String> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        Error::LlmInvalidResponse(format!("Failed to parse Gemini API response: {}", e))
    })?;

    value
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            Error::LlmInvalidResponse("Unexpected response format from Gemini API".to_string())
        })
}
