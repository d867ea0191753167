//! The three pipeline agents.
//!
//! Agents hold only immutable configuration (a shared model handle and a
//! retry policy), so one instance can serve concurrent workflows.

pub mod content;
pub mod image;
pub mod research;

pub use content::ContentAgent;
pub use image::ImageAgent;
pub use research::ResearchAgent;

/// Tracing target for prompt records.
pub const PROMPT_TARGET: &str = "prompts";
