//! OpenAI chat-completions backend
//!
//! # API Reference
//! - `POST {base}/chat/completions` with `Authorization: Bearer <key>`
//! - Image sent inline as a `data:` URL; `response_format` forces a JSON object
//! - Reply text at `choices[0].message.content`

use super::prompts::{
    refinement_request, review_request, IDENTIFY_INSTRUCTIONS, IDENTIFY_REQUEST,
    REFINE_INSTRUCTIONS, REVIEW_INSTRUCTIONS,
};
use super::response::{parse_identification, parse_review};
use super::{
    image_mime_type, status_error, transport_error, IdentificationClient, ProviderError,
    ReviewClient,
};
use crate::config::resolve_api_key;
use crate::types::{EnrichmentResult, IdentificationOutcome, IdentificationResult, SearchRefinement};
use albumscan_common::config::ProviderConfig;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

pub struct OpenAiClient {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    /// Resolves the API key now so a missing key fails at construction, not per call
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = resolve_api_key(config)?;
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            model: config.model_or_default(),
            base_url: config.base_url_or_default().trim_end_matches('/').to_string(),
        })
    }

    fn vision_body(&self, instructions: &str, request: &str, image: &[u8]) -> Result<Value, ProviderError> {
        let data_url = format!(
            "data:{};base64,{}",
            image_mime_type(image)?,
            general_purpose::STANDARD.encode(image)
        );
        Ok(json!({
            "model": self.model,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": instructions},
                {"role": "user", "content": [
                    {"type": "text", "text": request},
                    {"type": "image_url", "image_url": {"url": data_url}}
                ]}
            ]
        }))
    }

    fn text_body(&self, instructions: &str, request: &str) -> Value {
        json!({
            "model": self.model,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": instructions},
                {"role": "user", "content": request}
            ]
        })
    }

    /// POST a chat completion and return the assistant message text
    async fn complete(&self, body: &Value) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, "OpenAI chat completion request");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &error_text));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| ProviderError::Validation(format!("chat completion: {}", e)))?;

        message_text(completion)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

fn message_text(completion: ChatCompletion) -> Result<String, ProviderError> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ProviderError::Validation("chat completion has no content".to_string()))
}

#[async_trait]
impl IdentificationClient for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn identify(&self, image: &[u8]) -> Result<IdentificationOutcome, ProviderError> {
        let body = self.vision_body(IDENTIFY_INSTRUCTIONS, IDENTIFY_REQUEST, image)?;
        let text = self.complete(&body).await?;
        parse_identification(&text)
    }

    async fn identify_with_refinement(
        &self,
        image: &[u8],
        refinement: &SearchRefinement,
    ) -> Result<IdentificationOutcome, ProviderError> {
        let body = self.vision_body(REFINE_INSTRUCTIONS, &refinement_request(refinement), image)?;
        let text = self.complete(&body).await?;
        parse_identification(&text)
    }
}

#[async_trait]
impl ReviewClient for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn review(&self, album: &IdentificationResult) -> Result<EnrichmentResult, ProviderError> {
        let body = self.text_body(REVIEW_INSTRUCTIONS, &review_request(album));
        let text = self.complete(&body).await?;
        parse_review(&text)
    }
}
