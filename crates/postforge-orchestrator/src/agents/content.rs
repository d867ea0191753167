//! Content agent: turns facts into platform-tailored copy.

use chrono::Utc;
use postforge_abstraction::{ChatMessage, Model, ModelParameters};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{AgentError, Result};
use crate::models::{ContentMetadata, ContentRequest, ContentResponse, Fact, Platform};
use crate::prompts;
use crate::retry::RetryPolicy;

const TRUNCATION_MARKER: &str = "...";

/// Writes social copy from research facts.
#[derive(Clone)]
pub struct ContentAgent {
    model: Arc<dyn Model + Send + Sync>,
    retry: RetryPolicy,
}

impl fmt::Debug for ContentAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentAgent")
            .field("model_id", &self.model.model_id())
            .field("retry", &self.retry)
            .finish()
    }
}

impl ContentAgent {
    #[must_use]
    pub fn new(model: Arc<dyn Model + Send + Sync>, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Generates a post for `request.platform()`.
    ///
    /// Output longer than the effective limit is truncated with a `...`
    /// marker instead of failing.
    ///
    /// # Errors
    /// `ExternalService` once retries are exhausted, `Validation` when the
    /// output is empty (before or after truncation).
    pub async fn generate(&self, request: &ContentRequest) -> Result<ContentResponse> {
        let platform = request.platform();
        let limit = request.effective_max_length();
        let prompt = prompts::content_prompt(request);
        info!(
            target: super::PROMPT_TARGET,
            agent = "content",
            model = %self.model.model_id(),
            %platform,
            tone = %request.tone(),
            limit,
            %prompt,
            "Content prompt"
        );

        let messages = [ChatMessage::system(prompts::CONTENT_SYSTEM), ChatMessage::user(prompt)];
        let params = ModelParameters {
            temperature: Some(0.7),
            max_tokens: Some(500),
            ..ModelParameters::default()
        };

        let attempted = self
            .retry
            .run("content", || self.model.generate_chat_completion(&messages, Some(params.clone())))
            .await
            .map_err(|failure| {
                error!(%platform, error = %failure.error, attempts = failure.attempts, "Content call failed");
                AgentError::from(failure)
            })?;

        let cleaned = clean_output(&attempted.value.content);
        if cleaned.is_empty() {
            return Err(AgentError::Validation("model returned empty content".to_string()));
        }

        let original_char_count = cleaned.chars().count();
        let (text, truncated) = truncate(cleaned, platform, limit)?;
        if truncated {
            warn!(
                %platform,
                from = original_char_count,
                to = text.chars().count(),
                "Content truncated to fit platform limit"
            );
        }

        let mut hashtags = extract_hashtags(&text);
        let wanted = platform.profile().default_hashtags;
        if hashtags.is_empty() && request.include_hashtags() && wanted > 0 {
            hashtags = derive_hashtags(request.facts(), wanted);
        }

        let char_count = text.chars().count();
        info!(%platform, char_count, truncated, attempts = attempted.attempts, "Content generated");

        Ok(ContentResponse {
            platform,
            tone: request.tone(),
            text,
            hashtags,
            char_count,
            truncated,
            metadata: ContentMetadata {
                model_id: attempted
                    .value
                    .model_id
                    .unwrap_or_else(|| self.model.model_id().to_string()),
                created_at: Utc::now(),
                attempts: attempted.attempts,
                original_char_count,
            },
        })
    }
}

/// Trims whitespace and one pair of surrounding quotes.
fn clean_output(raw: &str) -> &str {
    let trimmed = raw.trim();
    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}'), ('\'', '\'')] {
        if let Some(inner) = trimmed.strip_prefix(open).and_then(|s| s.strip_suffix(close)) {
            return inner.trim();
        }
    }
    trimmed
}

/// Fits `text` into `limit` characters.
///
/// Twitter is cut hard to leave room for the marker. Elsewhere the cut lands
/// on the last sentence boundary when one lies past half the limit.
fn truncate(text: &str, platform: Platform, limit: usize) -> Result<(String, bool)> {
    if text.chars().count() <= limit {
        return Ok((text.to_string(), false));
    }

    let body: String = if platform == Platform::Twitter {
        text.chars().take(limit.saturating_sub(4)).collect()
    } else {
        let window: String = text.chars().take(limit.saturating_sub(3)).collect();
        let boundary = [". ", "! ", "? "].iter().filter_map(|p| window.rfind(p)).max();
        match boundary {
            Some(idx) if window[..idx].chars().count() > limit / 2 => window[..=idx].to_string(),
            _ => window,
        }
    };

    let body = body.trim_end();
    if body.is_empty() {
        return Err(AgentError::Validation(
            "content would be empty after truncation".to_string(),
        ));
    }
    Ok((format!("{body}{TRUNCATION_MARKER}"), true))
}

/// Hashtags already present in the text, in order of appearance.
fn extract_hashtags(text: &str) -> Vec<String> {
    let mut tags = Vec::new();
    for word in text.split_whitespace() {
        let Some(rest) = word.strip_prefix('#') else {
            continue;
        };
        let tag: String =
            rest.chars().take_while(|c| c.is_alphanumeric() || *c == '_').collect();
        if tag.is_empty() {
            continue;
        }
        let tag = format!("#{tag}");
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

/// Up to `count` hashtags built from fact keywords.
fn derive_hashtags(facts: &[Fact], count: usize) -> Vec<String> {
    let mut tags = Vec::new();
    if count == 0 {
        return tags;
    }
    for word in facts.iter().flat_map(|fact| fact.text().split_whitespace()) {
        let word = word.trim_matches(|c: char| ".,!?;:\"'()".contains(c)).to_lowercase();
        if word.chars().count() <= 4 || !word.chars().all(char::is_alphanumeric) {
            continue;
        }
        let tag = format!("#{word}");
        if !tags.contains(&tag) {
            tags.push(tag);
            if tags.len() == count {
                break;
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_output() {
        assert_eq!(clean_output("  \"Hello there\"  "), "Hello there");
        assert_eq!(clean_output("\u{201c}Curly\u{201d}"), "Curly");
        assert_eq!(clean_output("No quotes"), "No quotes");
        assert_eq!(clean_output("\"unbalanced"), "\"unbalanced");
    }

    #[test]
    fn test_short_text_is_untouched() {
        let (text, truncated) = truncate("Short post.", Platform::Twitter, 280).unwrap();
        assert_eq!(text, "Short post.");
        assert!(!truncated);
    }

    #[test]
    fn test_twitter_hard_cut() {
        let long = "a".repeat(300);
        let (text, truncated) = truncate(&long, Platform::Twitter, 280).unwrap();
        assert!(truncated);
        assert_eq!(text.chars().count(), 279);
        assert!(text.ends_with("..."));
    }

    #[test]
    fn test_sentence_boundary_cut() {
        let long = format!("{}. {}", "a".repeat(70), "b".repeat(60));
        let (text, truncated) = truncate(&long, Platform::LinkedIn, 100).unwrap();
        assert!(truncated);
        assert_eq!(text, format!("{}....", "a".repeat(70)));
        assert!(text.chars().count() <= 100);
    }

    #[test]
    fn test_early_boundary_falls_back_to_hard_cut() {
        let long = format!("{}. {}", "a".repeat(10), "b".repeat(200));
        let (text, _) = truncate(&long, Platform::Facebook, 100).unwrap();
        assert_eq!(text.chars().count(), 100);
        assert!(text.ends_with("b..."));
    }

    #[test]
    fn test_multibyte_text_counts_chars() {
        let long = "é".repeat(300);
        let (text, truncated) = truncate(&long, Platform::Blog, 200).unwrap();
        assert!(truncated);
        assert_eq!(text.chars().count(), 200);
    }

    #[test]
    fn test_whitespace_body_is_rejected() {
        let long = format!("{}{}", " ".repeat(290), "x");
        assert!(matches!(
            truncate(&long, Platform::Twitter, 280),
            Err(AgentError::Validation(_))
        ));
    }

    #[test]
    fn test_extract_hashtags() {
        let tags = extract_hashtags("Go green! #Solar #wind_power, #Solar #");
        assert_eq!(tags, vec!["#Solar", "#wind_power"]);
    }

    #[test]
    fn test_derive_hashtags() {
        let facts = vec![
            Fact::new("Solar capacity doubled.", 0.9).unwrap(),
            Fact::new("Offshore wind capacity grew", 0.8).unwrap(),
        ];
        assert_eq!(derive_hashtags(&facts, 3), vec!["#solar", "#capacity", "#doubled"]);
        assert!(derive_hashtags(&facts, 0).is_empty());
    }
}
