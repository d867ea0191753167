//! Model factory for creating model instances from configuration.
//!
//! This module provides functionality to create model instances based on configuration,
//! handling API key loading from environment variables.

use crate::{MockImageModel, MockModel, OpenAIImageModel, OpenAIModel};
use postforge_abstraction::{ImageModel, Model, ModelError};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Model type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Mock model for testing.
    Mock,
    /// OpenAI model.
    OpenAI,
}

impl FromStr for ModelType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "openai" => Ok(Self::OpenAI),
            other => Err(ModelError::UnsupportedModelProvider(format!(
                "unknown provider '{other}' (expected 'openai' or 'mock')"
            ))),
        }
    }
}

/// Model configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// The type of model to create.
    pub model_type: ModelType,
    /// The model ID (e.g., "gpt-4o", "gpt-image-1").
    pub model_id: String,
    /// Optional API key (if not provided, will be loaded from environment).
    pub api_key: Option<String>,
    /// Optional base URL override.
    pub base_url: Option<String>,
    /// Optional HTTP request timeout.
    pub timeout: Option<Duration>,
}

impl ModelConfig {
    /// Creates a new `ModelConfig` with the given type and model ID.
    #[must_use]
    pub fn new(model_type: ModelType, model_id: String) -> Self {
        Self { model_type, model_id, api_key: None, base_url: None, timeout: None }
    }

    /// Sets the API key for this configuration.
    #[must_use]
    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Sets the base URL for this configuration.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Factory for creating model instances.
pub struct ModelFactory;

impl ModelFactory {
    /// Creates a text model instance from the given configuration.
    ///
    /// # Errors
    /// Returns a `ModelError` if model creation fails (e.g., missing API key).
    pub fn create(config: ModelConfig) -> Result<Arc<dyn Model + Send + Sync>, ModelError> {
        debug!(
            model_type = ?config.model_type,
            model_id = %config.model_id,
            "Creating model instance"
        );

        match config.model_type {
            ModelType::Mock => Ok(Arc::new(MockModel::new(config.model_id))),
            ModelType::OpenAI => {
                let mut model = match config.api_key {
                    Some(api_key) => OpenAIModel::with_api_key(config.model_id, api_key),
                    None => OpenAIModel::new(config.model_id)?,
                };
                if let Some(base_url) = config.base_url {
                    model = model.with_base_url(base_url);
                }
                if let Some(timeout) = config.timeout {
                    model = model.with_timeout(timeout)?;
                }
                Ok(Arc::new(model))
            }
        }
    }

    /// Creates an image model instance from the given configuration.
    ///
    /// # Errors
    /// Returns a `ModelError` if model creation fails (e.g., missing API key).
    pub fn create_image(
        config: ModelConfig,
    ) -> Result<Arc<dyn ImageModel + Send + Sync>, ModelError> {
        debug!(
            model_type = ?config.model_type,
            model_id = %config.model_id,
            "Creating image model instance"
        );

        match config.model_type {
            ModelType::Mock => Ok(Arc::new(MockImageModel::new(config.model_id))),
            ModelType::OpenAI => {
                let mut model = match config.api_key {
                    Some(api_key) => OpenAIImageModel::with_api_key(config.model_id, api_key),
                    None => OpenAIImageModel::new(config.model_id)?,
                };
                if let Some(base_url) = config.base_url {
                    model = model.with_base_url(base_url);
                }
                if let Some(timeout) = config.timeout {
                    model = model.with_timeout(timeout)?;
                }
                Ok(Arc::new(model))
            }
        }
    }

    /// Creates a text model from a provider string.
    ///
    /// # Errors
    /// Returns a `ModelError` if the provider is unknown or creation fails.
    pub fn create_from_str(
        model_type: &str,
        model_id: String,
    ) -> Result<Arc<dyn Model + Send + Sync>, ModelError> {
        let model_type = model_type.parse::<ModelType>()?;
        Self::create(ModelConfig::new(model_type, model_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_from_str() {
        assert_eq!("mock".parse::<ModelType>().unwrap(), ModelType::Mock);
        assert_eq!("OpenAI".parse::<ModelType>().unwrap(), ModelType::OpenAI);
        assert!(matches!(
            "gemini".parse::<ModelType>(),
            Err(ModelError::UnsupportedModelProvider(_))
        ));
    }

    #[test]
    fn test_create_mock_models() {
        let model = ModelFactory::create_from_str("mock", "mock-model".to_string()).unwrap();
        assert_eq!(model.model_id(), "mock-model");

        let image = ModelFactory::create_image(ModelConfig::new(
            ModelType::Mock,
            "mock-image".to_string(),
        ))
        .unwrap();
        assert_eq!(image.model_id(), "mock-image");
    }

    #[test]
    fn test_create_openai_with_explicit_key() {
        let config = ModelConfig::new(ModelType::OpenAI, "gpt-4o".to_string())
            .with_api_key("test-key".to_string())
            .with_base_url("http://127.0.0.1:1/v1".to_string())
            .with_timeout(Duration::from_secs(5));
        let model = ModelFactory::create(config).unwrap();
        assert_eq!(model.model_id(), "gpt-4o");
    }
}
