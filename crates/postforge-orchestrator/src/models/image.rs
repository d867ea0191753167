//! Image stage records.

use chrono::{DateTime, Utc};
use postforge_abstraction::ImageSize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::content::Platform;
use crate::error::{AgentError, Result};

/// Visual style requested from the image model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageStyle {
    #[default]
    Photorealistic,
    Illustration,
    DigitalArt,
    Minimalist,
    Watercolor,
}

impl ImageStyle {
    pub const ALL: [Self; 5] = [
        Self::Photorealistic,
        Self::Illustration,
        Self::DigitalArt,
        Self::Minimalist,
        Self::Watercolor,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Photorealistic => "photorealistic",
            Self::Illustration => "illustration",
            Self::DigitalArt => "digital-art",
            Self::Minimalist => "minimalist",
            Self::Watercolor => "watercolor",
        }
    }
}

impl fmt::Display for ImageStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageStyle {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace(['_', ' '], "-");
        Self::ALL.into_iter().find(|style| style.as_str() == wanted).ok_or_else(|| {
            AgentError::Validation(format!("unknown image style '{s}'"))
        })
    }
}

/// Input to the image agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRequest {
    content: String,
    platform: Platform,
    topic: String,
    size: ImageSize,
    style: ImageStyle,
    quality: Option<String>,
}

impl ImageRequest {
    /// Creates a request for an image illustrating `content`.
    pub fn new(
        content: impl Into<String>,
        platform: Platform,
        topic: impl Into<String>,
    ) -> Result<Self> {
        let content = content.into();
        let topic = topic.into();
        if content.trim().is_empty() {
            return Err(AgentError::Validation("image content must not be empty".to_string()));
        }
        if topic.trim().is_empty() {
            return Err(AgentError::Validation("image topic must not be empty".to_string()));
        }
        Ok(Self {
            content,
            platform,
            topic,
            size: ImageSize::default(),
            style: ImageStyle::default(),
            quality: None,
        })
    }

    #[must_use]
    pub const fn with_size(mut self, size: ImageSize) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub const fn with_style(mut self, style: ImageStyle) -> Self {
        self.style = style;
        self
    }

    /// Provider quality hint such as `"high"` or `"standard"`. Blank values are ignored.
    #[must_use]
    pub fn with_quality(mut self, quality: Option<String>) -> Self {
        self.quality = quality.filter(|q| !q.trim().is_empty());
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    pub fn style(&self) -> ImageStyle {
        self.style
    }

    pub fn quality(&self) -> Option<&str> {
        self.quality.as_deref()
    }
}

/// Where the generated image lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSource {
    /// Hosted by the provider; not downloaded.
    Remote { url: String },
    /// Returned inline and decoded.
    Inline {
        mime_type: String,
        #[serde(skip)]
        bytes: Vec<u8>,
    },
}

/// Provenance of a generated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub model_id: String,
    pub created_at: DateTime<Utc>,
    pub attempts: u32,
    pub size: ImageSize,
    pub style: ImageStyle,
}

/// Output of the image agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageResponse {
    pub source: ImageSource,
    /// Where inline bytes were stored. `None` for remote images.
    pub local_path: Option<PathBuf>,
    /// Prompt sent to the model.
    pub prompt: String,
    /// Prompt as rewritten by the provider, if reported.
    pub revised_prompt: Option<String>,
    pub metadata: ImageMetadata,
}

impl ImageResponse {
    /// Remote URL, if the image was not returned inline.
    pub fn url(&self) -> Option<&str> {
        match &self.source {
            ImageSource::Remote { url } => Some(url),
            ImageSource::Inline { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_parsing() {
        assert_eq!("digital-art".parse::<ImageStyle>().unwrap(), ImageStyle::DigitalArt);
        assert_eq!("Digital Art".parse::<ImageStyle>().unwrap(), ImageStyle::DigitalArt);
        assert!("cubist".parse::<ImageStyle>().is_err());
        assert_eq!(serde_json::to_string(&ImageStyle::DigitalArt).unwrap(), "\"digital-art\"");
    }

    #[test]
    fn test_request_validation() {
        assert!(ImageRequest::new(" ", Platform::Twitter, "solar").is_err());
        assert!(ImageRequest::new("post", Platform::Twitter, "").is_err());

        let request = ImageRequest::new("post", Platform::Twitter, "solar").unwrap();
        assert_eq!(request.size(), ImageSize::Square);
        assert_eq!(request.style(), ImageStyle::Photorealistic);
    }

    #[test]
    fn test_blank_quality_is_ignored() {
        let request = ImageRequest::new("post", Platform::Twitter, "solar").unwrap();
        assert_eq!(request.quality(), None);
        assert_eq!(request.clone().with_quality(Some("hd".into())).quality(), Some("hd"));
        assert_eq!(request.with_quality(Some("  ".into())).quality(), None);
    }

    #[test]
    fn test_inline_bytes_are_not_serialized() {
        let source = ImageSource::Inline { mime_type: "image/png".into(), bytes: vec![1, 2, 3] };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["kind"], "inline");
        assert!(json.get("bytes").is_none());
    }
}
