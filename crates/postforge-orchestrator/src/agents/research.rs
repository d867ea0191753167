//! Research agent: turns a topic into a validated list of facts.

use chrono::Utc;
use postforge_abstraction::{ChatMessage, Model, ModelParameters, ResponseFormat};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{AgentError, Result};
use crate::models::{Fact, ResearchMetadata, ResearchRequest, ResearchResponse};
use crate::prompts;
use crate::retry::RetryPolicy;

/// Gathers facts about a topic from a text model.
#[derive(Clone)]
pub struct ResearchAgent {
    model: Arc<dyn Model + Send + Sync>,
    retry: RetryPolicy,
}

impl fmt::Debug for ResearchAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResearchAgent")
            .field("model_id", &self.model.model_id())
            .field("retry", &self.retry)
            .finish()
    }
}

impl ResearchAgent {
    #[must_use]
    pub fn new(model: Arc<dyn Model + Send + Sync>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Researches `request.topic()`.
    ///
    /// Invalid candidates and those below the request's relevance floor are
    /// dropped; the call fails only when none survive.
    ///
    /// # Errors
    /// `ExternalService` once retries are exhausted, `Validation` when the
    /// output is not JSON or holds no valid fact, `Configuration` when the
    /// provider is not set up.
    pub async fn research(&self, request: &ResearchRequest) -> Result<ResearchResponse> {
        let prompt = prompts::research_prompt(request);
        info!(
            target: super::PROMPT_TARGET,
            agent = "research",
            model = %self.model.model_id(),
            topic = %request.topic(),
            %prompt,
            "Research prompt"
        );

        let messages = [ChatMessage::system(prompts::RESEARCH_SYSTEM), ChatMessage::user(prompt)];
        let params = ModelParameters {
            temperature: Some(0.3),
            max_tokens: Some(2000),
            response_format: Some(ResponseFormat::Json),
            ..ModelParameters::default()
        };

        let attempted = self
            .retry
            .run("research", || self.model.generate_chat_completion(&messages, Some(params.clone())))
            .await
            .map_err(|failure| {
                error!(topic = %request.topic(), error = %failure.error, attempts = failure.attempts, "Research call failed");
                AgentError::from(failure)
            })?;

        let candidates = parse_candidates(&attempted.value.content)?;
        let total = candidates.len();
        let facts: Vec<Fact> = candidates
            .iter()
            .filter_map(fact_from_candidate)
            .filter(|fact| fact.relevance() >= request.min_relevance())
            .collect();
        let discarded = total - facts.len();

        if discarded > 0 {
            warn!(topic = %request.topic(), discarded, total, "Discarded invalid or low-relevance facts");
        }
        if facts.is_empty() {
            return Err(AgentError::Validation(format!(
                "model returned no valid facts ({total} candidate(s) discarded)"
            )));
        }

        info!(topic = %request.topic(), facts = facts.len(), attempts = attempted.attempts, "Research complete");

        let metadata = ResearchMetadata {
            model_id: attempted
                .value
                .model_id
                .unwrap_or_else(|| self.model.model_id().to_string()),
            created_at: Utc::now(),
            search_queries: request.search_queries(),
            attempts: attempted.attempts,
            discarded,
        };
        Ok(ResearchResponse::new(request.topic(), facts, metadata))
    }
}

/// Extracts the candidate list from a top-level array or a `{"facts": [...]}` object.
fn parse_candidates(raw: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(strip_code_fence(raw)).map_err(|e| {
        error!(error = %e, "Research output is not valid JSON");
        AgentError::Validation(format!("research output is not valid JSON: {e}"))
    })?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("facts") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(AgentError::Validation("research output has no facts array".to_string())),
        },
        _ => Err(AgentError::Validation("research output is not a list of facts".to_string())),
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn fact_from_candidate(value: &Value) -> Option<Fact> {
    let object = value.as_object()?;
    let text = object.get("fact").or_else(|| object.get("text"))?.as_str()?;
    let relevance = match object.get("relevance_score")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };

    let fact = match Fact::new(text, relevance) {
        Ok(fact) => fact,
        Err(e) => {
            debug!(error = %e, "Skipping invalid fact");
            return None;
        }
    };
    let fact = match object.get("source").and_then(Value::as_str) {
        Some(source) => fact.with_source(source),
        None => fact,
    };
    Some(match object.get("category").and_then(Value::as_str) {
        Some(category) => fact.with_category(category),
        None => fact,
    })
}
