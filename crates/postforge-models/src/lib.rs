//! Model implementations for Postforge.
//!
//! This crate provides concrete implementations of the `Model` and
//! `ImageModel` traits.
//!
//! # Supported Providers
//!
//! - **Mock**: Testing and development (echoing or scripted)
//! - **OpenAI**: Chat completions and image generations (API key required)

pub mod factory;
pub mod mock;
pub mod openai;
pub mod openai_image;

pub use factory::{ModelConfig, ModelFactory, ModelType};
pub use mock::{MockImageModel, MockModel};
pub use openai::{OPENAI_BASE_URL, OpenAIModel};
pub use openai_image::OpenAIImageModel;
