//! Validated request/response records for each pipeline stage.

pub mod content;
pub mod image;
pub mod research;

pub use content::{
    ContentMetadata, ContentRequest, ContentResponse, MAX_LENGTH_HINT, MIN_LENGTH_HINT, Platform,
    PlatformProfile, Tone,
};
pub use image::{ImageMetadata, ImageRequest, ImageResponse, ImageSource, ImageStyle};
pub use research::{Fact, MAX_FACTS_LIMIT, ResearchMetadata, ResearchRequest, ResearchResponse};
