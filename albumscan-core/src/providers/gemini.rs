//! Gemini generateContent backend
//!
//! # API Reference
//! - `POST {base}/models/{model}:generateContent` with `x-goog-api-key`
//! - Image sent as `inlineData`; `responseMimeType` requests JSON output
//! - Reply text at `candidates[0].content.parts[*].text`

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

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiClient {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
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

    fn request_body(instructions: &str, parts: Vec<Value>) -> Value {
        json!({
            "systemInstruction": {"parts": [{"text": instructions}]},
            "contents": [{"role": "user", "parts": parts}],
            "generationConfig": {"responseMimeType": "application/json"}
        })
    }

    fn vision_body(instructions: &str, request: &str, image: &[u8]) -> Result<Value, ProviderError> {
        let inline = json!({
            "inlineData": {
                "mimeType": image_mime_type(image)?,
                "data": general_purpose::STANDARD.encode(image)
            }
        });
        Ok(Self::request_body(instructions, vec![json!({"text": request}), inline]))
    }

    async fn generate(&self, body: &Value) -> Result<String, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!(model = %self.model, "Gemini generateContent request");

        let response = self
            .http_client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &error_text));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Validation(format!("generateContent: {}", e)))?;

        candidate_text(generated)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

/// Concatenated text parts of the first candidate
fn candidate_text(generated: GenerateResponse) -> Result<String, ProviderError> {
    let text: String = generated
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ProviderError::Validation("generateContent returned no text".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl IdentificationClient for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn identify(&self, image: &[u8]) -> Result<IdentificationOutcome, ProviderError> {
        let body = Self::vision_body(IDENTIFY_INSTRUCTIONS, IDENTIFY_REQUEST, image)?;
        let text = self.generate(&body).await?;
        parse_identification(&text)
    }

    async fn identify_with_refinement(
        &self,
        image: &[u8],
        refinement: &SearchRefinement,
    ) -> Result<IdentificationOutcome, ProviderError> {
        let body = Self::vision_body(REFINE_INSTRUCTIONS, &refinement_request(refinement), image)?;
        let text = self.generate(&body).await?;
        parse_identification(&text)
    }
}

#[async_trait]
impl ReviewClient for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn review(&self, album: &IdentificationResult) -> Result<EnrichmentResult, ProviderError> {
        let body = Self::request_body(REVIEW_INSTRUCTIONS, vec![json!({"text": review_request(album)})]);
        let text = self.generate(&body).await?;
        parse_review(&text)
    }
}
