//! Research stage records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Upper bound for `ResearchRequest::max_facts`.
pub const MAX_FACTS_LIMIT: usize = 10;

/// A single researched statement.
///
/// Only constructible through [`Fact::new`], so every `Fact` in circulation
/// has non-empty text and a relevance inside `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fact {
    text: String,
    relevance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
}

impl Fact {
    /// Creates a validated fact.
    pub fn new(text: impl Into<String>, relevance: f64) -> Result<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(AgentError::Validation("fact text must not be empty".to_string()));
        }
        if !relevance.is_finite() || !(0.0..=1.0).contains(&relevance) {
            return Err(AgentError::Validation(format!(
                "relevance must be within 0.0..=1.0 (got {relevance})"
            )));
        }
        Ok(Self { text, relevance, source: None, category: None })
    }

    /// Attaches a source reference. Blank sources are ignored.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = non_blank(source.into());
        self
    }

    /// Attaches a category tag. Blank categories are ignored.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = non_blank(category.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn relevance(&self) -> f64 {
        self.relevance
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Input to the research agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchRequest {
    topic: String,
    max_facts: usize,
    min_relevance: f64,
}

impl ResearchRequest {
    /// Creates a request for up to `max_facts` facts about `topic`.
    pub fn new(topic: impl Into<String>, max_facts: usize) -> Result<Self> {
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(AgentError::Validation("topic must not be empty".to_string()));
        }
        if !(1..=MAX_FACTS_LIMIT).contains(&max_facts) {
            return Err(AgentError::Validation(format!(
                "max_facts must be within 1..={MAX_FACTS_LIMIT} (got {max_facts})"
            )));
        }
        Ok(Self { topic, max_facts, min_relevance: 0.0 })
    }

    /// Sets the minimum relevance a fact needs to be kept.
    pub fn with_min_relevance(mut self, min_relevance: f64) -> Result<Self> {
        if !min_relevance.is_finite() || !(0.0..=1.0).contains(&min_relevance) {
            return Err(AgentError::Validation(format!(
                "min_relevance must be within 0.0..=1.0 (got {min_relevance})"
            )));
        }
        self.min_relevance = min_relevance;
        Ok(self)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn max_facts(&self) -> usize {
        self.max_facts
    }

    pub fn min_relevance(&self) -> f64 {
        self.min_relevance
    }

    /// Search queries derived from the topic.
    pub fn search_queries(&self) -> Vec<String> {
        vec![
            format!("{} latest developments", self.topic),
            format!("{} key facts and statistics", self.topic),
            format!("{} recent news and updates", self.topic),
        ]
    }
}

/// Provenance of a research response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchMetadata {
    /// Model that produced the facts.
    pub model_id: String,
    /// When the research completed.
    pub created_at: DateTime<Utc>,
    /// Queries the research was framed around.
    pub search_queries: Vec<String>,
    /// Model calls made, including retries.
    pub attempts: u32,
    /// Candidates dropped as invalid or below the relevance floor.
    pub discarded: usize,
}

/// Output of the research agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchResponse {
    topic: String,
    facts: Vec<Fact>,
    metadata: ResearchMetadata,
}

impl ResearchResponse {
    /// Creates a response; facts keep the order given.
    pub fn new(topic: impl Into<String>, facts: Vec<Fact>, metadata: ResearchMetadata) -> Self {
        Self { topic: topic.into(), facts, metadata }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Facts in model order.
    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn metadata(&self) -> &ResearchMetadata {
        &self.metadata
    }

    /// The `k` most relevant facts, highest first. Ties keep model order.
    pub fn top_facts(&self, k: usize) -> Vec<Fact> {
        let mut ranked: Vec<&Fact> = self.facts.iter().collect();
        ranked.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        ranked.into_iter().take(k).cloned().collect()
    }

    /// A new response holding only [`top_facts(k)`](Self::top_facts).
    #[must_use]
    pub fn filtered(&self, k: usize) -> Self {
        Self { topic: self.topic.clone(), facts: self.top_facts(k), metadata: self.metadata.clone() }
    }

    /// Facts at or above `threshold`, in model order.
    pub fn relevant_facts(&self, threshold: f64) -> Vec<&Fact> {
        self.facts.iter().filter(|fact| fact.relevance >= threshold).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> ResearchMetadata {
        ResearchMetadata {
            model_id: "mock".to_string(),
            created_at: Utc::now(),
            search_queries: Vec::new(),
            attempts: 1,
            discarded: 0,
        }
    }

    fn response(scores: &[f64]) -> ResearchResponse {
        let facts = scores
            .iter()
            .enumerate()
            .map(|(i, score)| Fact::new(format!("fact {i}"), *score).unwrap())
            .collect();
        ResearchResponse::new("topic", facts, metadata())
    }

    #[test]
    fn test_fact_validation() {
        assert!(Fact::new("  ", 0.5).is_err());
        assert!(Fact::new("ok", 1.5).is_err());
        assert!(Fact::new("ok", -0.1).is_err());
        assert!(Fact::new("ok", f64::NAN).is_err());

        let fact = Fact::new(" Solar is cheap ", 1.0).unwrap().with_source(" ").with_category("cost");
        assert_eq!(fact.text(), "Solar is cheap");
        assert!(fact.source().is_none());
        assert_eq!(fact.category(), Some("cost"));
    }

    #[test]
    fn test_request_validation() {
        assert!(ResearchRequest::new("", 3).is_err());
        assert!(ResearchRequest::new("solar", 0).is_err());
        assert!(ResearchRequest::new("solar", 11).is_err());
        assert!(ResearchRequest::new("solar", 3).unwrap().with_min_relevance(2.0).is_err());

        let request = ResearchRequest::new(" solar ", 3).unwrap();
        assert_eq!(request.topic(), "solar");
        assert_eq!(request.search_queries()[1], "solar key facts and statistics");
    }

    #[test]
    fn test_top_facts_orders_by_relevance() {
        let response = response(&[0.2, 0.9, 0.5, 0.9, 0.7]);
        let top: Vec<_> = response.top_facts(3).iter().map(|f| f.text().to_string()).collect();
        assert_eq!(top, vec!["fact 1", "fact 3", "fact 4"]);
        assert_eq!(response.top_facts(10).len(), 5);
        // The source response is untouched.
        assert_eq!(response.facts()[0].text(), "fact 0");
    }

    #[test]
    fn test_filtered_is_idempotent() {
        let response = response(&[0.3, 0.8, 0.6, 0.1]);
        let once = response.filtered(2);
        assert_eq!(once.facts().len(), 2);
        assert_eq!(once.filtered(2).facts(), once.facts());
        assert_eq!(once.filtered(5).facts(), once.facts());
    }

    #[test]
    fn test_relevant_facts() {
        let response = response(&[0.3, 0.8, 0.7]);
        assert_eq!(response.relevant_facts(0.7).len(), 2);
    }
}
