use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use quire_core::{BoundarySuggestion, OpenAiSettings, TokenBudget};
use reqwest::Client;
use tracing::debug;

use crate::suggest::{build_analysis_prompt, parse_suggestion, BoundarySuggester};

pub const OPENAI_RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

const SYSTEM_PROMPT: &str = "You segment documents for a retrieval system. \
     Return only JSON describing where the text should be split.";

#[derive(Clone)]
pub struct OpenAiBoundarySuggester {
    client: Client,
    settings: OpenAiSettings,
    endpoint: String,
}

impl OpenAiBoundarySuggester {
    pub fn new(settings: OpenAiSettings, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed building HTTP client")?;

        Ok(Self {
            client,
            settings,
            endpoint: OPENAI_RESPONSES_URL.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn payload(&self, text: &str, budget: TokenBudget) -> serde_json::Value {
        serde_json::json!({
            "model": self.settings.model,
            "input": [
                {
                    "role": "system",
                    "content": [
                        { "type": "input_text", "text": SYSTEM_PROMPT }
                    ]
                },
                {
                    "role": "user",
                    "content": [
                        { "type": "input_text", "text": build_analysis_prompt(text, budget) }
                    ]
                }
            ],
            "temperature": 0.1
        })
    }
}

#[async_trait]
impl BoundarySuggester for OpenAiBoundarySuggester {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn suggest(&self, text: &str, budget: TokenBudget) -> Result<BoundarySuggestion> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.settings.api_key.as_str())
            .json(&self.payload(text, budget))
            .send()
            .await
            .context("OpenAI boundary request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI non-success status {}: {}", status.as_u16(), body);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .context("OpenAI response parse failed")?;
        let output = extract_output_text(&body)
            .filter(|value| !value.trim().is_empty())
            .context("OpenAI output text missing")?;

        let suggestion = parse_suggestion(&output)?;
        debug!(
            splits = suggestion.suggested_splits.len(),
            topics = suggestion.topics.len(),
            "received boundary suggestion"
        );
        Ok(suggestion)
    }
}

pub fn extract_output_text(payload: &serde_json::Value) -> Option<String> {
    if let Some(value) = payload.get("output_text").and_then(|value| value.as_str()) {
        return Some(value.to_string());
    }

    let texts = payload
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(|value| value.as_array()))
        .flatten()
        .filter(|content| content.get("type").and_then(|value| value.as_str()) == Some("output_text"))
        .filter_map(|content| content.get("text").and_then(|value| value.as_str()))
        .map(str::to_string)
        .collect::<Vec<_>>();

    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n\n"))
    }
}
