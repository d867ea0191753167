//! OpenAI model implementation.
//!
//! This module provides an implementation of the `Model` trait for OpenAI's
//! chat completions API.

use async_trait::async_trait;
use postforge_abstraction::{
    ChatMessage, Model, ModelError, ModelParameters, ModelResponse, ModelUsage, ResponseFormat,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{debug, error};

/// Default OpenAI API endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Provider name reported in quota and rate-limit errors.
pub(crate) const PROVIDER: &str = "openai";

/// OpenAI model implementation.
#[derive(Debug, Clone)]
pub struct OpenAIModel {
    /// The model ID (e.g., "gpt-4o").
    model_id: String,
    /// The API key for authentication.
    api_key: String,
    /// The base URL for the OpenAI API.
    base_url: String,
    /// HTTP client for making requests.
    client: Client,
}

impl OpenAIModel {
    /// Creates a new `OpenAIModel` with the given model ID.
    ///
    /// # Errors
    /// Returns a `ModelError` if the API key is not found in environment variables.
    #[allow(clippy::disallowed_methods)] // env::var is needed for API key loading
    pub fn new(model_id: String) -> Result<Self, ModelError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            ModelError::UnsupportedModelProvider(
                "OPENAI_API_KEY environment variable not set".to_string(),
            )
        })?;

        Ok(Self::with_api_key(model_id, api_key))
    }

    /// Creates a new `OpenAIModel` with a custom API key.
    #[must_use]
    pub fn with_api_key(model_id: String, api_key: String) -> Self {
        Self { model_id, api_key, base_url: OPENAI_BASE_URL.to_string(), client: Client::new() }
    }

    /// Overrides the API base URL (e.g. for a proxy or a test server).
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

    /// Converts our ChatMessage role to OpenAI API role format.
    fn role_to_openai(role: &str) -> String {
        match role {
            "assistant" => "assistant".to_string(),
            "system" => "system".to_string(),
            "user" => "user".to_string(),
            _ => role.to_string(),
        }
    }

    /// Converts the abstract response format to OpenAI's `response_format` object.
    fn convert_response_format(format: Option<ResponseFormat>) -> Option<OpenAIResponseFormat> {
        match format {
            Some(ResponseFormat::Json) => {
                Some(OpenAIResponseFormat { format_type: "json_object".to_string() })
            }
            Some(ResponseFormat::Text) | None => None,
        }
    }
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client, ModelError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ModelError::Other(format!("Failed to build HTTP client: {e}")))
}

/// Maps a transport-level reqwest failure to a classified model error.
pub(crate) fn map_send_error(e: &reqwest::Error) -> ModelError {
    if e.is_timeout() {
        ModelError::Timeout(format!("Request timed out: {e}"))
    } else {
        ModelError::RequestError(format!("Network error: {e}"))
    }
}

#[async_trait]
impl Model for OpenAIModel {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            prompt_len = prompt.len(),
            parameters = ?parameters,
            "OpenAIModel generating text"
        );

        let messages = vec![ChatMessage::user(prompt)];
        self.generate_chat_completion(&messages, parameters).await
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.model_id,
            message_count = messages.len(),
            parameters = ?parameters,
            "OpenAIModel generating chat completion"
        );

        let url = format!("{}/chat/completions", self.base_url);

        let openai_messages: Vec<OpenAIMessage> = messages
            .iter()
            .map(|msg| OpenAIMessage {
                role: Self::role_to_openai(&msg.role),
                content: Some(msg.content.clone()),
            })
            .collect();

        let mut request_body = OpenAIRequest {
            model: self.model_id.clone(),
            messages: openai_messages,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: None,
            response_format: None,
        };

        if let Some(params) = parameters {
            request_body.temperature = params.temperature;
            request_body.top_p = params.top_p;
            request_body.max_tokens = params.max_tokens;
            request_body.stop = params.stop_sequences;
            request_body.response_format = Self::convert_response_format(params.response_format);
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to send request to OpenAI API");
                map_send_error(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(
                status = %status,
                error = %error_text,
                "OpenAI API returned error status"
            );
            return Err(ModelError::from_status(PROVIDER, status.as_u16(), error_text));
        }

        let openai_response: OpenAIResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse OpenAI API response");
            ModelError::SerializationError(format!("Failed to parse response: {}", e))
        })?;

        let content = openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                error!("No content in OpenAI API response");
                ModelError::ModelResponseError("No content in API response".to_string())
            })?;

        let usage = openai_response.usage.map(|u| ModelUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ModelResponse {
            content,
            model_id: openai_response.model.or_else(|| Some(self.model_id.clone())),
            usage,
        })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// OpenAI API request/response structures

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAIResponseFormat>,
}

#[derive(Debug, Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)] // Matches API naming
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_conversion() {
        assert_eq!(OpenAIModel::role_to_openai("user"), "user");
        assert_eq!(OpenAIModel::role_to_openai("assistant"), "assistant");
        assert_eq!(OpenAIModel::role_to_openai("system"), "system");
    }

    #[test]
    fn test_openai_model_creation_with_api_key() {
        let model = OpenAIModel::with_api_key("gpt-4o".to_string(), "test-key".to_string());
        assert_eq!(model.model_id(), "gpt-4o");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let model = OpenAIModel::with_api_key("gpt-4o".to_string(), "k".to_string())
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(model.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_response_format_conversion() {
        let json = OpenAIModel::convert_response_format(Some(ResponseFormat::Json)).unwrap();
        let serialized = serde_json::to_string(&json).unwrap();
        assert_eq!(serialized, r#"{"type":"json_object"}"#);
        assert!(OpenAIModel::convert_response_format(Some(ResponseFormat::Text)).is_none());
        assert!(OpenAIModel::convert_response_format(None).is_none());
    }
}
