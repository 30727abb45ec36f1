//! AI advisory gateway for ShelfLife.
//!
//! Wraps a generative text backend behind two read-only operations.
//! Every failure is caught at this boundary and degrades to a fixed
//! fallback value; callers never see an error.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sl_core::Item;

/// Category returned when the backend fails or answers with nothing.
pub const DEFAULT_CATEGORY: &str = "General";

/// Message returned when the insights request fails.
pub const INSIGHTS_FALLBACK: &str = "Insights are unavailable right now.";

/// Environment variable holding the backend API key.
pub const API_KEY_ENV: &str = "SHELFLIFE_API_KEY";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Failures internal to the gateway; mapped to fallbacks, never returned.
#[derive(Debug, Error)]
enum AiError {
    #[error("no API key configured (set {API_KEY_ENV})")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned status {0}")]
    Status(u16),
    #[error("backend returned no text")]
    EmptyResponse,
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<Part>>,
}

/// Client for the generative text backend.
#[derive(Debug, Clone)]
pub struct Advisor {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl Advisor {
    /// Create an advisor configured from the environment.
    pub fn from_env() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self {
            client,
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            api_key,
        }
    }

    /// Override the backend base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Ask the backend for three strategic observations over the
    /// collection. Returns the raw response text, or the fixed fallback
    /// message on any failure.
    pub async fn inventory_insights(&self, items: &[Item]) -> String {
        match self.request_insights(items).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(%err, "insights request failed, using fallback");
                INSIGHTS_FALLBACK.to_string()
            }
        }
    }

    /// Ask the backend for a single category label for a product name.
    /// Returns the trimmed response text, or `General` on failure or an
    /// empty answer.
    pub async fn suggest_category(&self, product_name: &str) -> String {
        match self.request_category(product_name).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(%err, product_name, "category request failed, using fallback");
                DEFAULT_CATEGORY.to_string()
            }
        }
    }

    async fn request_insights(&self, items: &[Item]) -> Result<String, AiError> {
        let snapshot = serde_json::to_string(items)?;
        let config = GenerationConfig {
            temperature: Some(0.7),
            max_output_tokens: None,
        };
        self.generate(&insights_prompt(&snapshot), config).await
    }

    async fn request_category(&self, product_name: &str) -> Result<String, AiError> {
        let config = GenerationConfig {
            temperature: None,
            max_output_tokens: Some(20),
        };
        let text = self.generate(&category_prompt(product_name), config).await?;
        Ok(text.trim().to_string())
    }

    async fn generate(&self, prompt: &str, config: GenerationConfig) -> Result<String, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::MissingApiKey)?;
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(config),
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AiError::Status(status.as_u16()));
        }

        let payload: GenerateResponse = response.json().await?;
        extract_text(&payload).ok_or(AiError::EmptyResponse)
    }
}

fn insights_prompt(snapshot: &str) -> String {
    format!(
        "Review these stock items and provide three strategic observations \
         (stale stock, expiration risk, restock suggestions): {snapshot}"
    )
}

fn category_prompt(product_name: &str) -> String {
    format!(
        "Suggest a single category for the product: \"{product_name}\". \
         Respond with only the category name."
    )
}

/// Pull the concatenated text out of a response, treating it as opaque.
fn extract_text(response: &GenerateResponse) -> Option<String> {
    let parts = response
        .candidates
        .as_ref()?
        .first()?
        .content
        .as_ref()?
        .parts
        .as_ref()?;
    let text: String = parts.iter().map(|part| part.text.as_str()).collect();
    if text.trim().is_empty() {
        return None;
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Nothing listens here; requests fail immediately with a refused
    // connection, which is exactly the failure path under test.
    const DEAD_ENDPOINT: &str = "http://127.0.0.1:9";

    fn offline_advisor(api_key: Option<&str>) -> Advisor {
        Advisor {
            client: Client::new(),
            base_url: DEAD_ENDPOINT.into(),
            model: DEFAULT_MODEL.into(),
            api_key: api_key.map(String::from),
        }
    }

    #[test]
    fn prompts_embed_their_inputs() {
        assert!(category_prompt("Rice").contains("\"Rice\""));
        assert!(insights_prompt("[{\"product_name\":\"Rice\"}]").contains("product_name"));
    }

    #[test]
    fn extract_text_joins_candidate_parts() {
        let payload = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [{"text": "Dairy"}, {"text": " & Eggs"}]
                }
            }]
        });
        let response: GenerateResponse = serde_json::from_value(payload).expect("response");
        assert_eq!(extract_text(&response).as_deref(), Some("Dairy & Eggs"));
    }

    #[test]
    fn extract_text_rejects_empty_payloads() {
        let response: GenerateResponse =
            serde_json::from_value(serde_json::json!({})).expect("response");
        assert!(extract_text(&response).is_none());

        let blank = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "   "}]}}]
        });
        let response: GenerateResponse = serde_json::from_value(blank).expect("response");
        assert!(extract_text(&response).is_none());
    }

    #[tokio::test]
    async fn backend_failure_yields_default_category() {
        let advisor = offline_advisor(Some("test-key"));
        assert_eq!(advisor.suggest_category("Rice").await, DEFAULT_CATEGORY);
    }

    #[tokio::test]
    async fn missing_api_key_yields_fallbacks_without_network() {
        let advisor = offline_advisor(None);
        assert_eq!(advisor.suggest_category("Rice").await, DEFAULT_CATEGORY);
        assert_eq!(advisor.inventory_insights(&[]).await, INSIGHTS_FALLBACK);
    }

    #[tokio::test]
    async fn backend_failure_yields_insights_fallback() {
        let advisor = offline_advisor(Some("test-key"));
        assert_eq!(advisor.inventory_insights(&[]).await, INSIGHTS_FALLBACK);
    }
}
