//! OpenAI image generation.
//!
//! Implements `ImageModel` against the `/images/generations` endpoint. Models
//! such as `dall-e-3` answer with a hosted URL, `gpt-image-1` with inline
//! base64 data; both are surfaced as an `ImagePayload`.

use async_trait::async_trait;
use postforge_abstraction::{
    GeneratedImage, ImageGenerationRequest, ImageModel, ImagePayload, ModelError,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{debug, error};

use crate::openai::{OPENAI_BASE_URL, PROVIDER, build_client, map_send_error};

/// OpenAI image model implementation.
#[derive(Debug, Clone)]
pub struct OpenAIImageModel {
    model_id: String,
    api_key: String,
    base_url: String,
    client: Client,
}

impl OpenAIImageModel {
    /// Creates a new `OpenAIImageModel`, reading `OPENAI_API_KEY` from the environment.
    ///
    /// # Errors
    /// Returns a `ModelError` if the API key is not set.
    #[allow(clippy::disallowed_methods)] // env::var is needed for API key loading
    pub fn new(model_id: String) -> Result<Self, ModelError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            ModelError::UnsupportedModelProvider(
                "OPENAI_API_KEY environment variable not set".to_string(),
            )
        })?;
        Ok(Self::with_api_key(model_id, api_key))
    }

    /// Creates a new `OpenAIImageModel` with a custom API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self { model_id, api_key, base_url: OPENAI_BASE_URL.to_string(), client: Client::new() }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets a per-request timeout on the underlying HTTP client.
    ///
    /// # Errors
    /// Returns a `ModelError` if the HTTP client cannot be built.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ModelError> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    /// Quality value understood by the configured model, if any.
    fn default_quality(&self) -> Option<String> {
        match self.model_id.as_str() {
            "gpt-image-1" => Some("high".to_string()),
            "dall-e-3" => Some("standard".to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl ImageModel for OpenAIImageModel {
    async fn generate_image(
        &self,
        request: &ImageGenerationRequest,
    ) -> Result<GeneratedImage, ModelError> {
        debug!(
            model_id = %self.model_id,
            prompt_len = request.prompt.len(),
            size = %request.size,
            "OpenAIImageModel generating image"
        );

        let url = format!("{}/images/generations", self.base_url);
        let body = OpenAIImageRequest {
            model: self.model_id.clone(),
            prompt: request.prompt.clone(),
            size: request.size.as_str().to_string(),
            n: 1,
            quality: request.quality.clone().or_else(|| self.default_quality()),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to OpenAI images API");
                map_send_error(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "OpenAI images API returned error status");
            return Err(ModelError::from_status(PROVIDER, status.as_u16(), error_text));
        }

        let parsed: OpenAIImageResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse OpenAI images API response");
            ModelError::SerializationError(format!("Failed to parse response: {}", e))
        })?;

        let datum = parsed.data.into_iter().next().ok_or_else(|| {
            ModelError::ModelResponseError("No image in API response".to_string())
        })?;

        let payload = match (datum.url, datum.b64_json) {
            (Some(url), _) if !url.is_empty() => ImagePayload::Remote { url },
            (_, Some(data)) if !data.is_empty() => {
                ImagePayload::Inline { data, mime_type: "image/png".to_string() }
            }
            _ => {
                error!("Image response carried neither url nor b64_json");
                return Err(ModelError::ModelResponseError(
                    "No image URL or data in response".to_string(),
                ));
            }
        };

        Ok(GeneratedImage {
            payload,
            revised_prompt: datum.revised_prompt,
            model_id: Some(self.model_id.clone()),
        })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[derive(Debug, Serialize)]
struct OpenAIImageRequest {
    model: String,
    prompt: String,
    size: String,
    n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    quality: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIImageResponse {
    data: Vec<OpenAIImageDatum>,
}

#[derive(Debug, Deserialize)]
struct OpenAIImageDatum {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}
