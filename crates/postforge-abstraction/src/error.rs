//! Model error types and failure classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse classification of a model failure.
///
/// The orchestration layer only ever reasons about the class of a failure,
/// never about the provider's raw transport details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Credentials were rejected (401/403).
    Authentication,
    /// The provider asked us to slow down (429 without a quota message).
    RateLimit,
    /// The account has no quota left (402, or 429 naming the quota).
    QuotaExceeded,
    /// The call did not complete in time.
    Timeout,
    /// Connection-level failure before a status was received.
    Network,
    /// The provider rejected the request shape (other 4xx).
    MalformedRequest,
    /// The provider failed internally (5xx, 408).
    ServerError,
    /// The provider answered but the payload was unusable.
    InvalidResponse,
    /// The provider is unknown or not configured.
    Configuration,
    /// Anything else.
    Other,
}

impl FailureClass {
    /// Returns `true` if a call failing with this class may succeed when retried.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::RateLimit | Self::Timeout | Self::Network | Self::ServerError)
    }

    /// Stable snake_case name used in logs and user-facing messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::RateLimit => "rate_limit",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::MalformedRequest => "malformed_request",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::Configuration => "configuration",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents an error that can occur when interacting with an AI model.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelError {
    /// The provider rejected the credentials.
    #[error("Authentication Error: {0}")]
    Authentication(String),

    /// Provider rate limit hit; the request may be retried later.
    #[error("Provider '{provider}' rate limited the request{}", .message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    RateLimited {
        /// The provider name (e.g., "openai").
        provider: String,
        /// Optional error message from the provider.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Provider quota exceeded (hard stop error).
    #[error("Provider '{provider}' quota exceeded{}", .message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    QuotaExceeded {
        /// The provider name (e.g., "openai").
        provider: String,
        /// Optional error message from the provider.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// The request did not complete within its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// An error occurred while sending the request (e.g., connection refused).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The provider rejected the request as invalid.
    #[error("Malformed Request: {0}")]
    MalformedRequest(String),

    /// The provider returned a server-side failure.
    #[error("Server Error ({status}): {message}")]
    ServerError {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Error body returned by the provider.
        message: String,
    },

    /// The model returned a response that could not be used (e.g., no choices).
    #[error("Model Response Error: {0}")]
    ModelResponseError(String),

    /// An error occurred during serialization or deserialization.
    #[error("Serialization Error: {0}")]
    SerializationError(String),

    /// The model provider is not supported or configured.
    #[error("Unsupported Model Provider: {0}")]
    UnsupportedModelProvider(String),

    /// Other unexpected errors.
    #[error("Other Model Error: {0}")]
    Other(String),
}

impl ModelError {
    /// Classifies this error.
    #[must_use]
    pub const fn class(&self) -> FailureClass {
        match self {
            Self::Authentication(_) => FailureClass::Authentication,
            Self::RateLimited { .. } => FailureClass::RateLimit,
            Self::QuotaExceeded { .. } => FailureClass::QuotaExceeded,
            Self::Timeout(_) => FailureClass::Timeout,
            Self::RequestError(_) => FailureClass::Network,
            Self::MalformedRequest(_) => FailureClass::MalformedRequest,
            Self::ServerError { .. } => FailureClass::ServerError,
            Self::ModelResponseError(_) | Self::SerializationError(_) => {
                FailureClass::InvalidResponse
            }
            Self::UnsupportedModelProvider(_) => FailureClass::Configuration,
            Self::Other(_) => FailureClass::Other,
        }
    }

    /// Returns `true` if the failed call may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.class().is_transient()
    }

    /// Maps a non-success HTTP status and body to a classified error.
    ///
    /// A 429 is a quota failure only when the body says so; otherwise it is a
    /// plain rate limit and therefore retryable.
    #[must_use]
    pub fn from_status(provider: &str, status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Authentication(format!("API error ({status}): {body}")),
            402 => Self::QuotaExceeded { provider: provider.to_string(), message: Some(body) },
            429 => {
                let lower = body.to_lowercase();
                if lower.contains("insufficient_quota") || lower.contains("exceeded your current quota")
                {
                    Self::QuotaExceeded { provider: provider.to_string(), message: Some(body) }
                } else {
                    Self::RateLimited { provider: provider.to_string(), message: Some(body) }
                }
            }
            408 | 500..=599 => Self::ServerError { status, message: body },
            _ => Self::MalformedRequest(format!("API error ({status}): {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ModelError::from_status("openai", 401, "no".into()).class(), FailureClass::Authentication);
        assert_eq!(ModelError::from_status("openai", 403, "no".into()).class(), FailureClass::Authentication);
        assert_eq!(ModelError::from_status("openai", 400, "bad".into()).class(), FailureClass::MalformedRequest);
        assert_eq!(ModelError::from_status("openai", 404, "gone".into()).class(), FailureClass::MalformedRequest);
        assert_eq!(ModelError::from_status("openai", 500, "oops".into()).class(), FailureClass::ServerError);
        assert_eq!(ModelError::from_status("openai", 503, "busy".into()).class(), FailureClass::ServerError);
        assert_eq!(ModelError::from_status("openai", 408, "slow".into()).class(), FailureClass::ServerError);
        assert_eq!(ModelError::from_status("openai", 402, "pay".into()).class(), FailureClass::QuotaExceeded);
    }

    #[test]
    fn test_429_quota_vs_rate_limit() {
        let quota = ModelError::from_status(
            "openai",
            429,
            r#"{"error":{"code":"insufficient_quota"}}"#.to_string(),
        );
        assert_eq!(quota.class(), FailureClass::QuotaExceeded);
        assert!(!quota.is_transient());

        let limited = ModelError::from_status("openai", 429, "Rate limit reached".to_string());
        assert_eq!(limited.class(), FailureClass::RateLimit);
        assert!(limited.is_transient());
    }

    #[test]
    fn test_transient_classes() {
        assert!(ModelError::Timeout("t".into()).is_transient());
        assert!(ModelError::RequestError("refused".into()).is_transient());
        assert!(!ModelError::Authentication("key".into()).is_transient());
        assert!(!ModelError::SerializationError("json".into()).is_transient());
        assert!(!ModelError::UnsupportedModelProvider("x".into()).is_transient());
    }

    #[test]
    fn test_display() {
        let err = ModelError::RateLimited { provider: "openai".into(), message: None };
        assert_eq!(err.to_string(), "Provider 'openai' rate limited the request");
        assert_eq!(FailureClass::ServerError.to_string(), "server_error");
    }
}
