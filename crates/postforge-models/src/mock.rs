//! Mock models for testing and demonstration.

use async_trait::async_trait;
use postforge_abstraction::{
    ChatMessage, GeneratedImage, ImageGenerationRequest, ImageModel, ImagePayload, Model,
    ModelError, ModelParameters, ModelResponse, ModelUsage, ResponseFormat,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Replays scripted outcomes in order; the final outcome repeats once reached.
#[derive(Debug)]
struct Script<T> {
    outcomes: Mutex<VecDeque<Result<T, ModelError>>>,
}

impl<T: Clone> Script<T> {
    fn new(outcomes: Vec<Result<T, ModelError>>) -> Self {
        Self { outcomes: Mutex::new(outcomes.into()) }
    }

    fn next(&self) -> Option<Result<T, ModelError>> {
        let mut outcomes = self.outcomes.lock().unwrap_or_else(PoisonError::into_inner);
        if outcomes.len() > 1 { outcomes.pop_front() } else { outcomes.front().cloned() }
    }
}

/// A 1x1 transparent PNG.
const PIXEL_PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// A mock implementation of the `Model` trait.
///
/// Without a script the model echoes the prompt back, or answers JSON-mode
/// requests with canned facts about the quoted topic. With a script it returns
/// each scripted outcome in turn, which lets tests simulate transient
/// failures followed by success.
#[derive(Debug)]
pub struct MockModel {
    id: String,
    script: Option<Script<String>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockModel {
    /// Creates a new echoing `MockModel` with the given ID.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self { id, script: None, calls: AtomicUsize::new(0), prompts: Mutex::new(Vec::new()) }
    }

    /// Creates a `MockModel` that replays `outcomes` in order.
    #[must_use]
    pub fn scripted(id: impl Into<String>, outcomes: Vec<Result<String, ModelError>>) -> Self {
        Self { script: Some(Script::new(outcomes)), ..Self::new(id.into()) }
    }

    /// Number of completed calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The user prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new("mock-model".to_string())
    }
}

#[async_trait]
impl Model for MockModel {
    async fn generate_text(
        &self,
        prompt: &str,
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        self.generate_chat_completion(&[ChatMessage::user(prompt)], parameters).await
    }

    async fn generate_chat_completion(
        &self,
        messages: &[ChatMessage],
        parameters: Option<ModelParameters>,
    ) -> Result<ModelResponse, ModelError> {
        debug!(
            model_id = %self.id,
            message_count = messages.len(),
            parameters = ?parameters,
            "MockModel generating chat completion"
        );

        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).push(prompt.clone());

        let json_mode = parameters
            .as_ref()
            .is_some_and(|p| p.response_format == Some(ResponseFormat::Json));
        let content = match self.script.as_ref().and_then(Script::next) {
            Some(outcome) => outcome?,
            None if json_mode => canned_facts(&prompt),
            None => format!("Mock response for: {prompt}"),
        };

        let prompt_tokens = messages.iter().map(|m| count_tokens(&m.content)).sum::<u32>();
        let completion_tokens = count_tokens(&content);

        Ok(ModelResponse {
            content,
            model_id: Some(self.id.clone()),
            usage: Some(ModelUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
        })
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

/// Facts about the first quoted phrase in `prompt`, shaped like a research reply.
fn canned_facts(prompt: &str) -> String {
    let topic = prompt
        .split('"')
        .nth(1)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| prompt.trim());
    json!({
        "facts": [
            {
                "fact": format!("Interest in {topic} has grown steadily in recent years"),
                "source": "https://mock.invalid/trends",
                "relevance_score": 0.9,
                "category": "trend"
            },
            {
                "fact": format!("Investment in {topic} keeps rising"),
                "source": "https://mock.invalid/economics",
                "relevance_score": 0.8,
                "category": "economics"
            },
            {
                "fact": format!("Experts expect {topic} to keep evolving"),
                "relevance_score": 0.7
            },
            {
                "fact": format!("Adoption of {topic} varies widely by region"),
                "relevance_score": 0.6
            },
            {
                "fact": format!("Plenty of beginner guides cover {topic}"),
                "relevance_score": 0.4
            }
        ]
    })
    .to_string()
}

/// A mock implementation of the `ImageModel` trait.
#[derive(Debug)]
pub struct MockImageModel {
    id: String,
    script: Script<GeneratedImage>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ImageGenerationRequest>>,
}

impl MockImageModel {
    /// Creates a mock that always returns a small inline PNG.
    #[must_use]
    pub fn new(id: String) -> Self {
        let image = GeneratedImage {
            payload: ImagePayload::Inline {
                data: PIXEL_PNG.to_string(),
                mime_type: "image/png".to_string(),
            },
            revised_prompt: None,
            model_id: Some(id.clone()),
        };
        Self::scripted(id, vec![Ok(image)])
    }

    /// Creates a mock that replays `outcomes` in order.
    #[must_use]
    pub fn scripted(
        id: impl Into<String>,
        outcomes: Vec<Result<GeneratedImage, ModelError>>,
    ) -> Self {
        Self {
            id: id.into(),
            script: Script::new(outcomes),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of completed calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The requests received so far, in call order.
    pub fn requests(&self) -> Vec<ImageGenerationRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl ImageModel for MockImageModel {
    async fn generate_image(
        &self,
        request: &ImageGenerationRequest,
    ) -> Result<GeneratedImage, ModelError> {
        debug!(model_id = %self.id, size = %request.size, "MockImageModel generating image");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(request.clone());
        self.script.next().unwrap_or_else(|| {
            Err(ModelError::ModelResponseError("mock image script is empty".to_string()))
        })
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

/// Count tokens in a string (simplified: word count).
#[allow(clippy::cast_possible_truncation)]
fn count_tokens(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}
