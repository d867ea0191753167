//! Image generation types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output dimensions supported by the image models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSize {
    /// 1024x1024.
    #[default]
    #[serde(rename = "1024x1024")]
    Square,
    /// 1024x1792.
    #[serde(rename = "1024x1792")]
    Portrait,
    /// 1792x1024.
    #[serde(rename = "1792x1024")]
    Landscape,
}

impl ImageSize {
    /// All supported sizes.
    pub const ALL: [Self; 3] = [Self::Square, Self::Portrait, Self::Landscape];

    /// The `WIDTHxHEIGHT` string sent to providers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Portrait => "1024x1792",
            Self::Landscape => "1792x1024",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|size| size.as_str() == s.trim()).ok_or_else(|| {
            format!("size must be one of 1024x1024, 1024x1792, 1792x1024 (got '{s}')")
        })
    }
}

/// A request to an image model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationRequest {
    /// Text prompt describing the image.
    pub prompt: String,
    /// Output size.
    pub size: ImageSize,
    /// Optional provider-specific quality hint (e.g. "high", "standard").
    pub quality: Option<String>,
}

impl ImageGenerationRequest {
    /// Creates a request with no quality hint.
    #[must_use]
    pub fn new(prompt: impl Into<String>, size: ImageSize) -> Self {
        Self { prompt: prompt.into(), size, quality: None }
    }

    /// Sets the quality hint; providers fall back to their own default without one.
    #[must_use]
    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }
}

/// The image bytes or a reference to them, as returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImagePayload {
    /// The provider hosts the image; only a URL was returned.
    Remote {
        /// Location of the generated image.
        url: String,
    },
    /// The image was returned inline as base64 text.
    Inline {
        /// Base64 data, optionally wrapped in a `data:` URL.
        data: String,
        /// MIME type of the decoded bytes.
        mime_type: String,
    },
}

/// A generated image together with provider metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// The image itself.
    pub payload: ImagePayload,
    /// Prompt as rewritten by the provider, if it reports one.
    pub revised_prompt: Option<String>,
    /// Optional: The ID of the model that produced the image.
    pub model_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_size_parsing() {
        assert_eq!("1024x1024".parse::<ImageSize>().unwrap(), ImageSize::Square);
        assert_eq!("1792x1024".parse::<ImageSize>().unwrap(), ImageSize::Landscape);
        assert!("512x512".parse::<ImageSize>().is_err());
    }

    #[test]
    fn test_payload_serialization_is_tagged() {
        let payload = ImagePayload::Remote { url: "https://img.example/1.png".to_string() };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "remote");
        assert_eq!(json["url"], "https://img.example/1.png");
    }
}
