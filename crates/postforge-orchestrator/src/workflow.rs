//! Workflow state machine sequencing research, content and image generation.
//!
//! ```text
//! INIT -> RESEARCHING -> RESEARCHED -> GENERATING_CONTENT -> CONTENT_READY
//!      -> GENERATING_IMAGE -> COMPLETE
//! ```
//!
//! `FAILED` is reachable from every non-terminal stage. Research and content
//! failures are fatal; an image failure is recorded and the run still
//! completes unless the image was required.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use postforge_abstraction::ImageSize;
use postforge_models::{ModelConfig, ModelFactory, ModelType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agents::{ContentAgent, ImageAgent, ResearchAgent};
use crate::config::PipelineConfig;
use crate::error::{AgentError, Result, Stage, StageError};
use crate::models::{
    ContentRequest, ContentResponse, Fact, ImageRequest, ImageResponse, ImageStyle, MAX_LENGTH_HINT,
    MIN_LENGTH_HINT, Platform, ResearchRequest, ResearchResponse, Tone,
};
use crate::storage::FsImageStore;

/// Workflow stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStage {
    Init,
    Researching,
    Researched,
    GeneratingContent,
    ContentReady,
    GeneratingImage,
    Complete,
    Failed,
}

impl WorkflowStage {
    /// Checks if the workflow can move to the given stage.
    #[must_use]
    #[allow(clippy::match_same_arms)] // Each arm represents a distinct transition rule
    pub const fn can_transition_to(self, to: Self) -> bool {
        match (self, to) {
            (Self::Init, Self::Researching) => true,
            (Self::Researching, Self::Researched) => true,
            (Self::Researched, Self::GeneratingContent) => true,
            (Self::GeneratingContent, Self::ContentReady) => true,
            // Skipping the image goes straight to COMPLETE
            (Self::ContentReady, Self::GeneratingImage | Self::Complete) => true,
            (Self::GeneratingImage, Self::Complete) => true,
            (from, Self::Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Researching => "RESEARCHING",
            Self::Researched => "RESEARCHED",
            Self::GeneratingContent => "GENERATING_CONTENT",
            Self::ContentReady => "CONTENT_READY",
            Self::GeneratingImage => "GENERATING_IMAGE",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The running aggregate of one workflow invocation.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    run_id: Uuid,
    topic: String,
    platform: Platform,
    tone: Tone,
    max_facts: usize,
    stage: WorkflowStage,
    research: Option<ResearchResponse>,
    content: Option<ContentResponse>,
    image: Option<ImageResponse>,
    error: Option<StageError>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl WorkflowState {
    fn new(topic: &str, platform: Platform, tone: Tone, max_facts: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            topic: topic.to_string(),
            platform,
            tone,
            max_facts,
            stage: WorkflowStage::Init,
            research: None,
            content: None,
            image: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn advance(&mut self, to: WorkflowStage) -> Result<()> {
        if !self.stage.can_transition_to(to) {
            error!(run_id = %self.run_id, from = %self.stage, %to, "Invalid workflow transition");
            return Err(AgentError::InvalidTransition { from: self.stage, to });
        }
        info!(run_id = %self.run_id, from = %self.stage, %to, "Workflow transition");
        self.stage = to;
        if to.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn tone(&self) -> Tone {
        self.tone
    }

    pub fn max_facts(&self) -> usize {
        self.max_facts
    }

    pub fn stage(&self) -> WorkflowStage {
        self.stage
    }

    /// Research output, already filtered to `max_facts`.
    pub fn research(&self) -> Option<&ResearchResponse> {
        self.research.as_ref()
    }

    pub fn content(&self) -> Option<&ContentResponse> {
        self.content.as_ref()
    }

    pub fn image(&self) -> Option<&ImageResponse> {
        self.image.as_ref()
    }

    /// The fatal error of a failed run, or the image error of a partial one.
    pub fn error(&self) -> Option<&StageError> {
        self.error.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }
}

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    /// Every requested stage succeeded.
    Success,
    /// Content is usable but the image stage failed.
    Partial,
    /// A fatal stage failed.
    Failed,
}

/// What a workflow run hands back to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub status: WorkflowStatus,
    pub state: WorkflowState,
}

impl WorkflowResult {
    pub fn success(&self) -> bool {
        self.status == WorkflowStatus::Success
    }

    pub fn is_partial(&self) -> bool {
        self.status == WorkflowStatus::Partial
    }

    /// The stage that aborted the run, if it failed.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self.status {
            WorkflowStatus::Failed => self.state.error.as_ref().map(|e| e.stage),
            _ => None,
        }
    }

    /// Stage-tagged message for the recorded error, if any.
    pub fn error_message(&self) -> Option<String> {
        self.state.error.as_ref().map(ToString::to_string)
    }

    /// The final state, or the fatal error for a failed run.
    pub fn into_result(self) -> std::result::Result<WorkflowState, StageError> {
        match (self.status, self.state.error.clone()) {
            (WorkflowStatus::Failed, Some(error)) => Err(error),
            _ => Ok(self.state),
        }
    }
}

/// Progress notifications sent while a run executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    StageEntered { run_id: Uuid, stage: WorkflowStage },
    StageFailed { run_id: Uuid, stage: Stage, error: String },
    Finished { run_id: Uuid, status: WorkflowStatus },
}

/// Per-run switches.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Run the image stage at all.
    pub generate_image: bool,
    /// Treat an image failure as fatal.
    pub require_image: bool,
    /// Ask the model for hashtags.
    pub include_hashtags: bool,
    pub call_to_action: Option<String>,
    /// Cancels the run at the next stage boundary or in-flight call.
    pub cancel: CancellationToken,
    /// Receives [`WorkflowEvent`]s when set.
    pub events: Option<mpsc::UnboundedSender<WorkflowEvent>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            generate_image: true,
            require_image: false,
            include_hashtags: true,
            call_to_action: None,
            cancel: CancellationToken::new(),
            events: None,
        }
    }
}

/// Raw workflow parameters, validated at INIT.
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    pub topic: String,
    pub platform: String,
    pub tone: String,
    pub max_facts: usize,
    pub max_length: Option<usize>,
    pub options: RunOptions,
}

impl WorkflowRequest {
    pub fn new(
        topic: impl Into<String>,
        platform: impl Into<String>,
        tone: impl Into<String>,
        max_facts: usize,
    ) -> Self {
        Self {
            topic: topic.into(),
            platform: platform.into(),
            tone: tone.into(),
            max_facts,
            max_length: None,
            options: RunOptions::default(),
        }
    }

    #[must_use]
    pub const fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }
}

/// Runs workflows over a fixed set of agents.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    research: ResearchAgent,
    content: ContentAgent,
    image: ImageAgent,
    min_relevance: f64,
    image_size: ImageSize,
    image_style: ImageStyle,
    image_quality: Option<String>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(research: ResearchAgent, content: ContentAgent, image: ImageAgent) -> Self {
        Self {
            research,
            content,
            image,
            min_relevance: 0.0,
            image_size: ImageSize::default(),
            image_style: ImageStyle::default(),
            image_quality: None,
        }
    }

    /// Builds model-backed agents from configuration.
    ///
    /// Credentials are resolved before any agent exists.
    ///
    /// # Errors
    /// `Configuration` when the provider is unknown, no API key is available
    /// for a remote provider, or a model client cannot be built.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let model_type = config.model_type()?;
        let api_key = match model_type {
            ModelType::OpenAI => Some(config.resolve_api_key()?),
            ModelType::Mock => config.api_key.clone(),
        };

        let model_config = |model_id: &str| {
            let mut model_config = ModelConfig::new(model_type, model_id.to_string())
                .with_timeout(config.retry.call_timeout());
            if let Some(key) = &api_key {
                model_config = model_config.with_api_key(key.clone());
            }
            if let Some(base_url) = &config.base_url {
                model_config = model_config.with_base_url(base_url.clone());
            }
            model_config
        };
        let configuration = |e: postforge_abstraction::ModelError| {
            AgentError::Configuration(e.to_string())
        };

        let research_model = ModelFactory::create(model_config(&config.research_model)).map_err(configuration)?;
        let content_model = ModelFactory::create(model_config(&config.content_model)).map_err(configuration)?;
        let image_model = ModelFactory::create_image(model_config(&config.image_model)).map_err(configuration)?;

        let retry = config.retry.policy();
        let store = Arc::new(FsImageStore::new(&config.images_dir));

        info!(
            provider = %config.provider,
            research_model = %config.research_model,
            content_model = %config.content_model,
            image_model = %config.image_model,
            "Orchestrator configured"
        );

        Ok(Self::new(
            ResearchAgent::new(research_model, retry.clone()),
            ContentAgent::new(content_model, retry.clone()),
            ImageAgent::new(image_model, store, retry),
        )
        .with_min_relevance(config.min_relevance)
        .with_image_options(config.image_size, config.image_style)
        .with_image_quality(config.image_quality.clone()))
    }

    #[must_use]
    pub const fn with_min_relevance(mut self, min_relevance: f64) -> Self {
        self.min_relevance = min_relevance;
        self
    }

    #[must_use]
    pub const fn with_image_options(mut self, size: ImageSize, style: ImageStyle) -> Self {
        self.image_size = size;
        self.image_style = style;
        self
    }

    #[must_use]
    pub fn with_image_quality(mut self, quality: Option<String>) -> Self {
        self.image_quality = quality;
        self
    }

    /// Runs the full pipeline with default options.
    ///
    /// # Errors
    /// Only when the parameters fail validation. Stage failures are reported
    /// in the returned [`WorkflowResult`].
    pub async fn run_workflow(
        &self,
        topic: &str,
        platform: &str,
        tone: &str,
        max_facts: usize,
    ) -> Result<WorkflowResult> {
        self.run(WorkflowRequest::new(topic, platform, tone, max_facts)).await
    }

    /// Runs one workflow.
    ///
    /// # Errors
    /// Only when the parameters fail validation. Stage failures are reported
    /// in the returned [`WorkflowResult`].
    pub async fn run(&self, request: WorkflowRequest) -> Result<WorkflowResult> {
        let WorkflowRequest { topic, platform, tone, max_facts, max_length, options } = request;

        let platform: Platform = platform.parse()?;
        let tone: Tone = tone.parse()?;
        let research_request =
            ResearchRequest::new(topic, max_facts)?.with_min_relevance(self.min_relevance)?;
        if let Some(len) = max_length
            && !(MIN_LENGTH_HINT..=MAX_LENGTH_HINT).contains(&len)
        {
            return Err(AgentError::Validation(format!(
                "max_length must be within {MIN_LENGTH_HINT}..={MAX_LENGTH_HINT} (got {len})"
            )));
        }

        let mut run = Run {
            state: WorkflowState::new(research_request.topic(), platform, tone, max_facts),
            options: &options,
        };
        info!(
            run_id = %run.state.run_id,
            topic = %run.state.topic,
            %platform,
            %tone,
            max_facts,
            "Workflow started"
        );

        let outcome = self.execute(&mut run, &research_request, max_length).await;
        let status = match outcome {
            Ok(()) if run.state.error.is_some() => WorkflowStatus::Partial,
            Ok(()) => WorkflowStatus::Success,
            Err(stage_error) => {
                error!(run_id = %run.state.run_id, error = %stage_error, "Workflow failed");
                run.emit(WorkflowEvent::StageFailed {
                    run_id: run.state.run_id,
                    stage: stage_error.stage,
                    error: stage_error.to_string(),
                });
                run.state.error = Some(stage_error);
                if let Err(e) = run.state.advance(WorkflowStage::Failed) {
                    error!(error = %e, "Could not mark workflow as failed");
                }
                WorkflowStatus::Failed
            }
        };

        info!(run_id = %run.state.run_id, ?status, "Workflow finished");
        run.emit(WorkflowEvent::Finished { run_id: run.state.run_id, status });
        Ok(WorkflowResult { status, state: run.state })
    }

    /// Runs independent workflows with at most `concurrency` in flight.
    /// Results keep the order of `requests`.
    pub async fn run_batch(
        &self,
        requests: Vec<WorkflowRequest>,
        concurrency: usize,
    ) -> Vec<Result<WorkflowResult>> {
        stream::iter(requests)
            .map(|request| self.run(request))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    async fn execute(
        &self,
        run: &mut Run<'_>,
        research_request: &ResearchRequest,
        max_length: Option<usize>,
    ) -> std::result::Result<(), StageError> {
        // RESEARCHING
        run.enter(WorkflowStage::Researching, Stage::Research)?;
        let research = guarded(&run.options.cancel, self.research.research(research_request))
            .await
            .map_err(|e| StageError::new(Stage::Research, e))?;

        // RESEARCHED
        run.enter(WorkflowStage::Researched, Stage::Research)?;
        let filtered = research.filtered(research_request.max_facts());
        info!(
            run_id = %run.state.run_id,
            candidates = research.facts().len(),
            kept = filtered.facts().len(),
            "Facts filtered by relevance"
        );
        let facts = filtered.facts().to_vec();
        run.state.research = Some(filtered);

        // GENERATING_CONTENT
        run.enter(WorkflowStage::GeneratingContent, Stage::Content)?;
        let content = self
            .generate_content(run, facts, max_length)
            .await
            .map_err(|e| StageError::new(Stage::Content, e))?;

        // CONTENT_READY
        let post = content.text.clone();
        run.state.content = Some(content);
        run.enter(WorkflowStage::ContentReady, Stage::Content)?;

        if !run.options.generate_image {
            info!(run_id = %run.state.run_id, "Image stage skipped");
            return run.enter(WorkflowStage::Complete, Stage::Content);
        }

        // GENERATING_IMAGE
        run.enter(WorkflowStage::GeneratingImage, Stage::Image)?;
        let image = self.generate_image(run, post).await;

        match image {
            Ok(image) => run.state.image = Some(image),
            Err(e) if run.options.require_image || matches!(e, AgentError::Cancelled) => {
                return Err(StageError::new(Stage::Image, e));
            }
            Err(e) => {
                let stage_error = StageError::new(Stage::Image, e);
                warn!(run_id = %run.state.run_id, error = %stage_error, "Image stage failed; continuing without image");
                run.emit(WorkflowEvent::StageFailed {
                    run_id: run.state.run_id,
                    stage: Stage::Image,
                    error: stage_error.to_string(),
                });
                run.state.error = Some(stage_error);
            }
        }

        // COMPLETE
        run.enter(WorkflowStage::Complete, Stage::Image)
    }

    async fn generate_content(
        &self,
        run: &Run<'_>,
        facts: Vec<Fact>,
        max_length: Option<usize>,
    ) -> Result<ContentResponse> {
        let mut request = ContentRequest::new(facts, run.state.platform, run.state.tone)?
            .with_hashtags(run.options.include_hashtags);
        if let Some(len) = max_length {
            request = request.with_max_length(len)?;
        }
        if let Some(call_to_action) = &run.options.call_to_action {
            request = request.with_call_to_action(call_to_action.clone());
        }
        guarded(&run.options.cancel, self.content.generate(&request)).await
    }

    async fn generate_image(&self, run: &Run<'_>, post: String) -> Result<ImageResponse> {
        let request = ImageRequest::new(post, run.state.platform, run.state.topic.clone())?
            .with_size(self.image_size)
            .with_style(self.image_style)
            .with_quality(self.image_quality.clone());
        guarded(&run.options.cancel, self.image.generate(&request)).await
    }
}

/// A workflow in flight: its state plus the caller's options.
struct Run<'a> {
    state: WorkflowState,
    options: &'a RunOptions,
}

impl Run<'_> {
    fn emit(&self, event: WorkflowEvent) {
        if let Some(events) = &self.options.events {
            // A dropped receiver only means nobody is listening.
            let _ = events.send(event);
        }
    }

    fn enter(&mut self, to: WorkflowStage, stage: Stage) -> std::result::Result<(), StageError> {
        self.state.advance(to).map_err(|e| StageError::new(stage, e))?;
        self.emit(WorkflowEvent::StageEntered { run_id: self.state.run_id, stage: to });
        Ok(())
    }
}

/// Awaits `call` unless `cancel` fires first.
async fn guarded<T>(cancel: &CancellationToken, call: impl Future<Output = Result<T>>) -> Result<T> {
    if cancel.is_cancelled() {
        return Err(AgentError::Cancelled);
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(AgentError::Cancelled),
        result = call => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use WorkflowStage::*;
        let path = [Init, Researching, Researched, GeneratingContent, ContentReady, GeneratingImage, Complete];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(ContentReady.can_transition_to(Complete));
    }

    #[test]
    fn test_invalid_transitions() {
        use WorkflowStage::*;
        assert!(!Init.can_transition_to(GeneratingContent));
        assert!(!Researching.can_transition_to(GeneratingImage));
        assert!(!Complete.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Init));
        assert!(!Researched.can_transition_to(Researched));
        for stage in [Init, Researching, Researched, GeneratingContent, ContentReady, GeneratingImage] {
            assert!(stage.can_transition_to(Failed));
        }
    }

    #[test]
    fn test_state_rejects_out_of_order_advance() {
        let mut state = WorkflowState::new("topic", Platform::Twitter, Tone::Casual, 3);
        let err = state.advance(WorkflowStage::Complete).unwrap_err();
        assert!(matches!(
            err,
            AgentError::InvalidTransition { from: WorkflowStage::Init, to: WorkflowStage::Complete }
        ));
        assert_eq!(err.kind(), "internal");

        state.advance(WorkflowStage::Researching).unwrap();
        state.advance(WorkflowStage::Failed).unwrap();
        assert!(state.finished_at().is_some());
    }

    #[test]
    fn test_stage_serialization() {
        assert_eq!(
            serde_json::to_string(&WorkflowStage::GeneratingContent).unwrap(),
            "\"GENERATING_CONTENT\""
        );
        assert_eq!(WorkflowStage::ContentReady.to_string(), "CONTENT_READY");
    }

    #[tokio::test]
    async fn test_guarded_respects_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = guarded(&cancel, async { Ok(1) }).await;
        assert!(matches!(result, Err(AgentError::Cancelled)));

        let live = CancellationToken::new();
        assert_eq!(guarded(&live, async { Ok(2) }).await.unwrap(), 2);
    }
}
