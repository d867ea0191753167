//! Error types for the content pipeline.

use postforge_abstraction::{FailureClass, ModelError};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::retry::RetryFailure;
use crate::workflow::WorkflowStage;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors raised by agents and the orchestrator.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// Missing or invalid setup (credentials, config file, provider).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Bad input parameters or unusable model output.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The external model service failed, possibly after retries.
    #[error("External service error ({class}) after {attempts} attempt(s)")]
    ExternalService {
        /// Classification of the final failure.
        class: FailureClass,
        /// Number of attempts made, including the first.
        attempts: u32,
        /// Provider message, kept for logs.
        detail: String,
    },

    /// Persisting a generated image failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The caller cancelled the workflow.
    #[error("Workflow cancelled")]
    Cancelled,

    /// The workflow state machine was driven out of order.
    #[error("Invalid workflow transition from {from} to {to}")]
    InvalidTransition {
        /// Stage the workflow was in.
        from: WorkflowStage,
        /// Stage that was requested.
        to: WorkflowStage,
    },
}

impl AgentError {
    /// Maps a model failure after `attempts` attempts onto the pipeline taxonomy.
    #[must_use]
    pub fn from_model(error: ModelError, attempts: u32) -> Self {
        match error.class() {
            FailureClass::InvalidResponse => Self::Validation(format!("unusable model output: {error}")),
            FailureClass::Configuration => Self::Configuration(error.to_string()),
            class => Self::ExternalService { class, attempts, detail: error.to_string() },
        }
    }

    /// Stable snake_case tag for this error.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Validation(_) => "validation",
            Self::ExternalService { .. } => "external_service",
            Self::Storage(_) => "storage",
            Self::Cancelled => "cancelled",
            Self::InvalidTransition { .. } => "internal",
        }
    }

    /// Attempts made before the error surfaced, when a model call was involved.
    #[must_use]
    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::ExternalService { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

impl From<RetryFailure> for AgentError {
    fn from(failure: RetryFailure) -> Self {
        Self::from_model(failure.error, failure.attempts)
    }
}

/// The pipeline stage an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Fact gathering.
    Research,
    /// Copy generation.
    Content,
    /// Image generation.
    Image,
}

impl Stage {
    /// Lowercase stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Content => "content",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An [`AgentError`] tagged with the stage that produced it.
#[derive(Debug, Clone, Error)]
#[error("{stage} stage failed: {error}")]
pub struct StageError {
    /// Originating stage.
    pub stage: Stage,
    /// The underlying error.
    pub error: AgentError,
}

impl StageError {
    /// Tags `error` with `stage`.
    #[must_use]
    pub const fn new(stage: Stage, error: AgentError) -> Self {
        Self { stage, error }
    }
}

impl Serialize for StageError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("StageError", 4)?;
        state.serialize_field("stage", &self.stage)?;
        state.serialize_field("kind", self.error.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("attempts", &self.error.attempts())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_model_mapping() {
        let err = AgentError::from_model(ModelError::ModelResponseError("empty".into()), 1);
        assert!(matches!(err, AgentError::Validation(_)));

        let err = AgentError::from_model(ModelError::UnsupportedModelProvider("no key".into()), 1);
        assert!(matches!(err, AgentError::Configuration(_)));

        let err = AgentError::from_model(ModelError::Timeout("slow".into()), 3);
        assert!(matches!(
            err,
            AgentError::ExternalService { class: FailureClass::Timeout, attempts: 3, .. }
        ));
        assert_eq!(err.kind(), "external_service");
        assert_eq!(err.attempts(), Some(3));
    }

    #[test]
    fn test_external_service_display_hides_transport_detail() {
        let err = AgentError::from_model(
            ModelError::ServerError { status: 502, message: "<html>bad gateway</html>".into() },
            3,
        );
        let shown = err.to_string();
        assert_eq!(shown, "External service error (server_error) after 3 attempt(s)");
        assert!(!shown.contains("html"));
    }

    #[test]
    fn test_stage_error_display_and_json() {
        let err = StageError::new(Stage::Content, AgentError::Validation("empty post".into()));
        assert_eq!(err.to_string(), "content stage failed: Validation error: empty post");

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["stage"], "content");
        assert_eq!(json["kind"], "validation");
        assert!(json["attempts"].is_null());
    }
}
