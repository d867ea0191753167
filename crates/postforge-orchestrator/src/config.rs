//! Pipeline configuration file support.
//!
//! Configuration is layered: built-in defaults, then the global file
//! (`~/.postforge/config.toml`), then the local file (`./postforge.toml`).
//! Later layers override earlier ones field by field.

use postforge_abstraction::ImageSize;
use postforge_models::ModelType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{AgentError, Result};
use crate::models::ImageStyle;
use crate::retry::RetryPolicy;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Fully resolved pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Model provider (`openai` or `mock`).
    pub provider: String,
    /// API key; falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// API base URL override.
    pub base_url: Option<String>,
    pub research_model: String,
    pub content_model: String,
    pub image_model: String,
    /// Where inline images are written.
    pub images_dir: PathBuf,
    /// Facts scoring below this are discarded during research.
    pub min_relevance: f64,
    pub image_size: ImageSize,
    pub image_style: ImageStyle,
    /// Image quality hint; the provider's default applies when unset.
    pub image_quality: Option<String>,
    pub retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: None,
            base_url: None,
            research_model: "gpt-4o".to_string(),
            content_model: "gpt-4o".to_string(),
            image_model: "gpt-image-1".to_string(),
            images_dir: PathBuf::from("images"),
            min_relevance: 0.0,
            image_size: ImageSize::default(),
            image_style: ImageStyle::default(),
            image_quality: None,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry settings as they appear in the `[retry]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub call_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 8000,
            multiplier: 2.0,
            call_timeout_secs: 60,
        }
    }
}

impl RetryConfig {
    /// The per-call deadline.
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.multiplier,
        )
        .with_call_timeout(self.call_timeout())
    }
}

/// One configuration file. Every field is optional so that a layer only
/// overrides what it names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub research_model: Option<String>,
    pub content_model: Option<String>,
    pub image_model: Option<String>,
    pub images_dir: Option<PathBuf>,
    pub min_relevance: Option<f64>,
    pub image_size: Option<ImageSize>,
    pub image_style: Option<ImageStyle>,
    pub image_quality: Option<String>,
    #[serde(default)]
    pub retry: RetryLayer,
}

/// The optional `[retry]` table of a [`ConfigLayer`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryLayer {
    pub max_attempts: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub multiplier: Option<f64>,
    pub call_timeout_secs: Option<u64>,
}

impl ConfigLayer {
    /// Load a layer from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AgentError::Configuration(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;

        toml::from_str(&content).map_err(|e| {
            AgentError::Configuration(format!("failed to parse {}: {e}", path.display()))
        })
    }
}

impl PipelineConfig {
    /// Get default global configuration file path.
    pub fn default_global_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".postforge")
            .join("config.toml")
    }

    /// Get default local configuration file path.
    pub fn default_local_path() -> PathBuf {
        PathBuf::from("postforge.toml")
    }

    /// Loads configuration.
    ///
    /// With an explicit path only that file is layered over the defaults and
    /// it must exist. Otherwise the global and local files are discovered.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => {
                let mut config = Self::default();
                config.merge(ConfigLayer::load_from_file(path)?);
                config
            }
            None => Self::discover_from(&Self::default_global_path(), &Self::default_local_path())?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Layers `global` then `local` over the defaults, skipping files that do
    /// not exist. A file that exists but cannot be parsed is an error.
    pub fn discover_from(global: &Path, local: &Path) -> Result<Self> {
        let mut config = Self::default();
        for path in [global, local] {
            if path.exists() {
                debug!(path = %path.display(), "Loading configuration layer");
                config.merge(ConfigLayer::load_from_file(path)?);
            }
        }
        Ok(config)
    }

    /// Merge a layer into this configuration.
    ///
    /// Values from `layer` override values in `self` if they are Some.
    pub fn merge(&mut self, layer: ConfigLayer) {
        if let Some(provider) = layer.provider {
            self.provider = provider;
        }
        if layer.api_key.is_some() {
            self.api_key = layer.api_key;
        }
        if layer.base_url.is_some() {
            self.base_url = layer.base_url;
        }
        if let Some(model) = layer.research_model {
            self.research_model = model;
        }
        if let Some(model) = layer.content_model {
            self.content_model = model;
        }
        if let Some(model) = layer.image_model {
            self.image_model = model;
        }
        if let Some(dir) = layer.images_dir {
            self.images_dir = dir;
        }
        if let Some(min_relevance) = layer.min_relevance {
            self.min_relevance = min_relevance;
        }
        if let Some(size) = layer.image_size {
            self.image_size = size;
        }
        if let Some(style) = layer.image_style {
            self.image_style = style;
        }
        if layer.image_quality.is_some() {
            self.image_quality = layer.image_quality;
        }

        let retry = layer.retry;
        if let Some(v) = retry.max_attempts {
            self.retry.max_attempts = v;
        }
        if let Some(v) = retry.initial_delay_ms {
            self.retry.initial_delay_ms = v;
        }
        if let Some(v) = retry.max_delay_ms {
            self.retry.max_delay_ms = v;
        }
        if let Some(v) = retry.multiplier {
            self.retry.multiplier = v;
        }
        if let Some(v) = retry.call_timeout_secs {
            self.retry.call_timeout_secs = v;
        }
    }

    /// The configured provider.
    pub fn model_type(&self) -> Result<ModelType> {
        self.provider.parse().map_err(|e| AgentError::Configuration(format!("{e}")))
    }

    /// Checks value ranges that the TOML types cannot express.
    pub fn validate(&self) -> Result<()> {
        self.model_type()?;
        if !(0.0..=1.0).contains(&self.min_relevance) {
            return Err(AgentError::Configuration(format!(
                "min_relevance must be within 0.0..=1.0 (got {})",
                self.min_relevance
            )));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(AgentError::Configuration(format!(
                "retry.multiplier must be at least 1.0 (got {})",
                self.retry.multiplier
            )));
        }
        if self.retry.call_timeout_secs == 0 {
            return Err(AgentError::Configuration(
                "retry.call_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The API key to use: the configured one, else `OPENAI_API_KEY`.
    ///
    /// # Errors
    /// `Configuration` when neither is set or the value is blank.
    pub fn resolve_api_key(&self) -> Result<String> {
        self.resolve_api_key_with(std::env::var(API_KEY_ENV).ok())
    }

    fn resolve_api_key_with(&self, from_env: Option<String>) -> Result<String> {
        self.api_key
            .iter()
            .chain(from_env.iter())
            .map(|key| key.trim())
            .find(|key| !key.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                AgentError::Configuration(format!(
                    "an OpenAI API key is required: set {API_KEY_ENV} or pass --api-key"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.provider, "openai");
        assert!(config.image_quality.is_none());
        assert_eq!(config.image_model, "gpt-image-1");
        assert_eq!(config.retry.policy(), RetryPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("postforge.toml");

        let config_content = r#"
provider = "mock"
content_model = "gpt-4o-mini"
images_dir = "out/images"
image_size = "1792x1024"
image_style = "watercolor"
image_quality = "standard"

[retry]
max_attempts = 5
call_timeout_secs = 10
"#;
        std::fs::write(&config_path, config_content).unwrap();

        let config = PipelineConfig::load(Some(&config_path)).unwrap();
        assert_eq!(config.provider, "mock");
        assert_eq!(config.content_model, "gpt-4o-mini");
        assert_eq!(config.research_model, "gpt-4o");
        assert_eq!(config.images_dir, PathBuf::from("out/images"));
        assert_eq!(config.image_size, ImageSize::Landscape);
        assert_eq!(config.image_style, ImageStyle::Watercolor);
        assert_eq!(config.image_quality.as_deref(), Some("standard"));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 500);
        assert_eq!(config.retry.call_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_local_overrides_global() {
        let temp_dir = TempDir::new().unwrap();
        let global = temp_dir.path().join("global.toml");
        let local = temp_dir.path().join("local.toml");
        std::fs::write(&global, "research_model = \"gpt-4.1\"\nmin_relevance = 0.5\n").unwrap();
        std::fs::write(&local, "min_relevance = 0.7\n").unwrap();

        let config = PipelineConfig::discover_from(&global, &local).unwrap();
        assert_eq!(config.research_model, "gpt-4.1");
        assert!((config.min_relevance - 0.7).abs() < f64::EPSILON);

        let missing = temp_dir.path().join("missing.toml");
        let config = PipelineConfig::discover_from(&missing, &missing).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let err = PipelineConfig::load(Some(&temp_dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");

        std::fs::write(&path, "provider = \"gemini\"\n").unwrap();
        assert!(matches!(PipelineConfig::load(Some(&path)), Err(AgentError::Configuration(_))));

        std::fs::write(&path, "min_relevance = 1.5\n").unwrap();
        assert!(matches!(PipelineConfig::load(Some(&path)), Err(AgentError::Configuration(_))));

        std::fs::write(&path, "unknown_key = true\n").unwrap();
        assert!(matches!(PipelineConfig::load(Some(&path)), Err(AgentError::Configuration(_))));
    }

    #[test]
    fn test_resolve_api_key() {
        let mut config = PipelineConfig::default();
        assert!(matches!(config.resolve_api_key_with(None), Err(AgentError::Configuration(_))));
        assert!(config.resolve_api_key_with(Some("  ".into())).is_err());
        assert_eq!(config.resolve_api_key_with(Some("env-key".into())).unwrap(), "env-key");

        config.api_key = Some("file-key".to_string());
        assert_eq!(config.resolve_api_key_with(Some("env-key".into())).unwrap(), "file-key");

        config.api_key = Some(String::new());
        assert_eq!(config.resolve_api_key_with(Some("env-key".into())).unwrap(), "env-key");
    }
}
