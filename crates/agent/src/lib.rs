//! Call state machine for the cold-call agent
//!
//! Features:
//! - Pure transition engine over the call graph
//! - Per-call session record with transcript and transition log
//! - In-memory session store with per-key locking and expiry
//! - Call orchestrator driving classifier, engine and generator per turn
//! - Rule-based classifier and template generator for offline operation

pub mod orchestrator;
pub mod rules;
pub mod session;
pub mod store;
pub mod summary;
pub mod templates;
pub mod transition;

pub use orchestrator::{CallOrchestrator, CallPolicy};
pub use rules::RuleBasedClassifier;
pub use session::{Session, TransitionRecord};
pub use store::{SessionLease, SessionStore};
pub use summary::{CallOutcome, CallSummary};
pub use templates::TemplateGenerator;
pub use transition::{Counters, Effect, InvariantViolation, Transition};

use cold_call_core::{CollaboratorError, ContextError};
use thiserror::Error;

/// Call errors
#[derive(Error, Debug)]
pub enum CallError {
    #[error("Session already exists: {0}")]
    DuplicateSession(String),

    #[error("Session not found: {0}")]
    UnknownSession(String),

    #[error("Call is already over: {0}")]
    CallAlreadyOver(String),

    #[error("Session is busy with another request: {0}")]
    Busy(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Session capacity reached ({0} live sessions)")]
    CapacityExceeded(usize),

    #[error("{collaborator} unavailable: {source}")]
    ServiceUnavailable {
        collaborator: &'static str,
        #[source]
        source: CollaboratorError,
    },
}

impl From<ContextError> for CallError {
    fn from(err: ContextError) -> Self {
        CallError::InvalidRequest(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CallError>;
