use async_trait::async_trait;
use thiserror::Error;

use crate::context::CallContext;
use crate::conversation::Utterance;
use crate::state::CallState;
use crate::trigger::Trigger;

/// Failure of an external classification or generation capability
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("invalid output: {0}")]
    InvalidOutput(String),

    #[error("empty output")]
    EmptyOutput,
}

/// Maps the prospect's latest reply to at most one trigger.
///
/// Unexpected content is `Ok(None)`; errors are reserved for the capability
/// itself being unavailable.
#[async_trait]
pub trait TriggerClassifier: Send + Sync {
    async fn classify(
        &self,
        state: CallState,
        history: &[Utterance],
        latest_message: &str,
    ) -> Result<Option<Trigger>, CollaboratorError>;

    fn name(&self) -> &str;
}

/// Produces the agent's next spoken line for a state
#[async_trait]
pub trait UtteranceGenerator: Send + Sync {
    async fn generate(
        &self,
        state: CallState,
        context: &CallContext,
        history: &[Utterance],
    ) -> Result<String, CollaboratorError>;

    fn name(&self) -> &str;
}
