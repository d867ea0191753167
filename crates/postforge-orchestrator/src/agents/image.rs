//! Image agent: generates an illustration for a post.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use postforge_abstraction::{ImageGenerationRequest, ImageModel, ImagePayload};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::{AgentError, Result};
use crate::models::{ImageMetadata, ImageRequest, ImageResponse, ImageSource};
use crate::prompts;
use crate::retry::RetryPolicy;
use crate::storage::ImageStore;

/// Generates and stores images.
#[derive(Clone)]
pub struct ImageAgent {
    model: Arc<dyn ImageModel + Send + Sync>,
    store: Arc<dyn ImageStore>,
    retry: RetryPolicy,
}

impl fmt::Debug for ImageAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAgent")
            .field("model_id", &self.model.model_id())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ImageAgent {
    #[must_use]
    pub fn new(
        model: Arc<dyn ImageModel + Send + Sync>,
        store: Arc<dyn ImageStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self { model, store, retry }
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Generates an image for `request`.
    ///
    /// Inline payloads are decoded and handed to the store; remote payloads
    /// are recorded by URL only.
    ///
    /// # Errors
    /// `ExternalService` once retries are exhausted, `Validation` for an
    /// undecodable payload, `Storage` when the bytes cannot be persisted.
    pub async fn generate(&self, request: &ImageRequest) -> Result<ImageResponse> {
        let prompt = prompts::image_prompt(request);
        info!(
            target: super::PROMPT_TARGET,
            agent = "image",
            model = %self.model.model_id(),
            topic = %request.topic(),
            platform = %request.platform(),
            style = %request.style(),
            %prompt,
            "Image prompt"
        );

        let mut generation = ImageGenerationRequest::new(prompt.clone(), request.size());
        if let Some(quality) = request.quality() {
            generation = generation.with_quality(quality);
        }
        let attempted = self
            .retry
            .run("image", || self.model.generate_image(&generation))
            .await
            .map_err(|failure| {
                error!(error = %failure.error, attempts = failure.attempts, "Image call failed");
                AgentError::from(failure)
            })?;
        let image = attempted.value;

        let (source, local_path) = match image.payload {
            ImagePayload::Remote { url } => {
                info!(%url, "Image generated at remote URL");
                (ImageSource::Remote { url }, None)
            }
            ImagePayload::Inline { data, mime_type } => {
                let (mime_type, bytes) = decode_inline(&data, &mime_type)?;
                let path = self.store.store(&bytes, &mime_type).await?;
                (ImageSource::Inline { mime_type, bytes }, Some(path))
            }
        };

        Ok(ImageResponse {
            source,
            local_path,
            prompt,
            revised_prompt: image.revised_prompt,
            metadata: ImageMetadata {
                model_id: image.model_id.unwrap_or_else(|| self.model.model_id().to_string()),
                created_at: Utc::now(),
                attempts: attempted.attempts,
                size: request.size(),
                style: request.style(),
            },
        })
    }
}

/// Decodes raw base64 or a `data:<mime>;base64,<data>` URL.
fn decode_inline(data: &str, mime_type: &str) -> Result<(String, Vec<u8>)> {
    let (mime_type, encoded) = match data.strip_prefix("data:") {
        Some(url) => {
            let (header, encoded) = url.split_once(',').ok_or_else(|| {
                AgentError::Validation("malformed data URL in image payload".to_string())
            })?;
            let mime = header.split(';').next().filter(|m| !m.is_empty()).unwrap_or(mime_type);
            (mime.to_string(), encoded)
        }
        None => (mime_type.to_string(), data),
    };

    let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
        error!(error = %e, "Image payload is not valid base64");
        AgentError::Validation(format!("image payload is not valid base64: {e}"))
    })?;
    if bytes.is_empty() {
        return Err(AgentError::Validation("image payload is empty".to_string()));
    }
    Ok((mime_type, bytes))
}
