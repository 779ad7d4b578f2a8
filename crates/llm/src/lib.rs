//! LLM integration for the cold-call agent
//!
//! Features:
//! - OpenAI-compatible chat completions backend (OpenAI, Groq, vLLM, ...)
//! - Prompt assembly from persona, prospect context and per-state profile
//! - Trigger classifier and utterance generator backed by the LLM
//! - Per-turn knowledge retrieval injected into generation prompts

pub mod adapter;
pub mod backend;
pub mod prompt;

pub use adapter::{LlmTriggerClassifier, LlmUtteranceGenerator};
pub use backend::{FinishReason, GenerationResult, LlmBackend, LlmConfig, OpenAIBackend};
pub use prompt::{Message, PromptBuilder, PromptMode, Role};

use cold_call_core::CollaboratorError;
use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for CollaboratorError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::InvalidResponse(msg) => CollaboratorError::InvalidOutput(msg),
            other => CollaboratorError::Unavailable(other.to_string()),
        }
    }
}
