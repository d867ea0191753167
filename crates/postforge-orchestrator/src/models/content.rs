//! Content stage records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::research::Fact;
use crate::error::{AgentError, Result};

/// Smallest accepted length hint.
pub const MIN_LENGTH_HINT: usize = 50;
/// Largest accepted length hint.
pub const MAX_LENGTH_HINT: usize = 2000;

/// Target platform for generated copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    LinkedIn,
    Facebook,
    Instagram,
    Blog,
}

/// Per-platform formatting constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformProfile {
    /// Hard character limit for a post.
    pub max_length: usize,
    /// Hashtags to ask for (and to derive when the model adds none).
    pub default_hashtags: usize,
    /// How posts on this platform should read.
    pub voice: &'static str,
}

impl Platform {
    pub const ALL: [Self; 5] =
        [Self::Twitter, Self::LinkedIn, Self::Facebook, Self::Instagram, Self::Blog];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::LinkedIn => "linkedin",
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::Blog => "blog",
        }
    }

    pub const fn profile(self) -> PlatformProfile {
        match self {
            Self::Twitter => PlatformProfile {
                max_length: 280,
                default_hashtags: 2,
                voice: "concise and engaging",
            },
            Self::LinkedIn => PlatformProfile {
                max_length: 1300,
                default_hashtags: 3,
                voice: "professional and insightful",
            },
            Self::Facebook => PlatformProfile {
                max_length: 800,
                default_hashtags: 2,
                voice: "conversational and friendly",
            },
            Self::Instagram => PlatformProfile {
                max_length: 2200,
                default_hashtags: 5,
                voice: "visual and engaging",
            },
            Self::Blog => PlatformProfile {
                max_length: 2000,
                default_hashtags: 0,
                voice: "informative and detailed",
            },
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == wanted).ok_or_else(|| {
            AgentError::Validation(format!(
                "unknown platform '{s}' (expected one of twitter, linkedin, facebook, instagram, blog)"
            ))
        })
    }
}

/// Voice of the generated copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Informative,
    Persuasive,
    Casual,
    Professional,
    Enthusiastic,
}

impl Tone {
    pub const ALL: [Self; 5] =
        [Self::Informative, Self::Persuasive, Self::Casual, Self::Professional, Self::Enthusiastic];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Informative => "informative",
            Self::Persuasive => "persuasive",
            Self::Casual => "casual",
            Self::Professional => "professional",
            Self::Enthusiastic => "enthusiastic",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == wanted).ok_or_else(|| {
            AgentError::Validation(format!(
                "unknown tone '{s}' (expected one of informative, persuasive, casual, professional, enthusiastic)"
            ))
        })
    }
}

/// Input to the content agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentRequest {
    facts: Vec<Fact>,
    platform: Platform,
    tone: Tone,
    max_length: Option<usize>,
    include_hashtags: bool,
    call_to_action: Option<String>,
}

impl ContentRequest {
    /// Creates a request; at least one fact is required.
    pub fn new(facts: Vec<Fact>, platform: Platform, tone: Tone) -> Result<Self> {
        if facts.is_empty() {
            return Err(AgentError::Validation("at least one fact is required".to_string()));
        }
        Ok(Self {
            facts,
            platform,
            tone,
            max_length: None,
            include_hashtags: true,
            call_to_action: None,
        })
    }

    /// Same as [`ContentRequest::new`] but parses platform and tone first.
    pub fn parse(facts: Vec<Fact>, platform: &str, tone: &str) -> Result<Self> {
        Self::new(facts, platform.parse()?, tone.parse()?)
    }

    /// Sets a length hint within `50..=2000` characters.
    pub fn with_max_length(mut self, max_length: usize) -> Result<Self> {
        if !(MIN_LENGTH_HINT..=MAX_LENGTH_HINT).contains(&max_length) {
            return Err(AgentError::Validation(format!(
                "max_length must be within {MIN_LENGTH_HINT}..={MAX_LENGTH_HINT} (got {max_length})"
            )));
        }
        self.max_length = Some(max_length);
        Ok(self)
    }

    #[must_use]
    pub fn with_hashtags(mut self, include_hashtags: bool) -> Self {
        self.include_hashtags = include_hashtags;
        self
    }

    #[must_use]
    pub fn with_call_to_action(mut self, call_to_action: impl Into<String>) -> Self {
        let call_to_action = call_to_action.into();
        self.call_to_action = (!call_to_action.trim().is_empty()).then_some(call_to_action);
        self
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn tone(&self) -> Tone {
        self.tone
    }

    pub fn include_hashtags(&self) -> bool {
        self.include_hashtags
    }

    pub fn call_to_action(&self) -> Option<&str> {
        self.call_to_action.as_deref()
    }

    /// The limit the generated text must respect: the hint, never above the
    /// platform's own limit.
    pub fn effective_max_length(&self) -> usize {
        let platform_max = self.platform.profile().max_length;
        self.max_length.map_or(platform_max, |hint| hint.min(platform_max))
    }
}

/// Provenance of generated copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub model_id: String,
    pub created_at: DateTime<Utc>,
    pub attempts: u32,
    /// Character count of the raw model output before truncation.
    pub original_char_count: usize,
}

/// Output of the content agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentResponse {
    pub platform: Platform,
    pub tone: Tone,
    pub text: String,
    pub hashtags: Vec<String>,
    /// Unicode scalar count of `text`.
    pub char_count: usize,
    /// Whether the model output was cut to fit.
    pub truncated: bool,
    pub metadata: ContentMetadata,
}

impl ContentResponse {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts() -> Vec<Fact> {
        vec![Fact::new("Wind power doubled", 0.9).unwrap()]
    }

    #[test]
    fn test_platform_and_tone_parse_case_insensitively() {
        assert_eq!("Twitter".parse::<Platform>().unwrap(), Platform::Twitter);
        assert_eq!(" LINKEDIN ".parse::<Platform>().unwrap(), Platform::LinkedIn);
        assert_eq!("Casual".parse::<Tone>().unwrap(), Tone::Casual);
        assert!(matches!("myspace".parse::<Platform>(), Err(AgentError::Validation(_))));
        assert!(matches!("angry".parse::<Tone>(), Err(AgentError::Validation(_))));
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Platform::LinkedIn).unwrap(), "\"linkedin\"");
        assert_eq!(serde_json::to_string(&Tone::Enthusiastic).unwrap(), "\"enthusiastic\"");
    }

    #[test]
    fn test_request_validation() {
        assert!(ContentRequest::new(Vec::new(), Platform::Blog, Tone::Casual).is_err());
        assert!(ContentRequest::parse(facts(), "tiktok", "casual").is_err());
        assert!(ContentRequest::parse(facts(), "blog", "sarcastic").is_err());

        let request = ContentRequest::parse(facts(), "blog", "casual").unwrap();
        assert!(request.clone().with_max_length(49).is_err());
        assert!(request.clone().with_max_length(2001).is_err());
        assert!(request.include_hashtags());
    }

    #[test]
    fn test_effective_max_length() {
        let twitter = ContentRequest::new(facts(), Platform::Twitter, Tone::Informative).unwrap();
        assert_eq!(twitter.effective_max_length(), 280);
        assert_eq!(twitter.clone().with_max_length(1000).unwrap().effective_max_length(), 280);
        assert_eq!(twitter.with_max_length(100).unwrap().effective_max_length(), 100);
    }

    #[test]
    fn test_profiles() {
        assert_eq!(Platform::Instagram.profile().max_length, 2200);
        assert_eq!(Platform::LinkedIn.profile().default_hashtags, 3);
        assert_eq!(Platform::Blog.profile().default_hashtags, 0);
    }
}
