//! Educational Hook & Quiz Generator Library
//!
//! This library provides tools to:
//! - Generate short lesson "hooks" and multiple-choice quizzes for a topic
//! - Ground generation in a precomputed GraphRAG export and a vector store
//! - Fall back to deterministic templates when external services fail
//! - Parse free-text requests into a (topic, style) intent
//! - Persist generated artifacts in Qdrant or an in-process store

pub mod config;
pub mod embeddings;
pub mod error;
pub mod generator;
pub mod graphrag;
pub mod intent;
pub mod llm;
pub mod metrics;
pub mod model;
pub mod prompts;
pub mod server;
pub mod store;
pub mod templates;

// Re-export common types
pub use config::Config;
pub use error::{Error, Result};
pub use generator::{GenerationOutcome, Orchestrator, QuizOutcome};
pub use graphrag::GraphIndex;
pub use intent::Intent;
pub use llm::{LlmBackend, LlmClient};
pub use model::{canonical_topic, Hook, HookStyle, QuizItem};
pub use prompts::{load_prompt, Prompt};
pub use store::StoreBackend;
