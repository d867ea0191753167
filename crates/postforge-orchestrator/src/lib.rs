//! Research → content → image pipeline for Postforge.
//!
//! The [`Orchestrator`] runs three agents in sequence, threading a
//! [`WorkflowState`] between them. Every model call goes through a shared
//! [`RetryPolicy`]; failures are classified into the [`AgentError`] taxonomy
//! and reported per stage.

pub mod agents;
pub mod config;
pub mod error;
pub mod models;
mod prompts;
pub mod retry;
pub mod storage;
pub mod workflow;

pub use agents::{ContentAgent, ImageAgent, PROMPT_TARGET, ResearchAgent};
pub use config::{ConfigLayer, PipelineConfig, RetryConfig};
pub use error::{AgentError, Result, Stage, StageError};
pub use models::{
    ContentRequest, ContentResponse, Fact, ImageRequest, ImageResponse, ImageSource, ImageStyle,
    Platform, ResearchRequest, ResearchResponse, Tone,
};
pub use retry::{Attempted, RetryFailure, RetryPolicy};
pub use storage::{FsImageStore, ImageStore};
pub use workflow::{
    Orchestrator, RunOptions, WorkflowEvent, WorkflowRequest, WorkflowResult, WorkflowStage,
    WorkflowState, WorkflowStatus,
};
