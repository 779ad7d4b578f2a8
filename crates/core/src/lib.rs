//! Core types for the cold-call agent
//!
//! This crate provides the vocabulary shared by every other crate:
//! - Call states with their graph edges and per-state profile
//! - Triggers and their priority
//! - Prospect context, seller persona and transcript entries
//! - Knowledge categories consulted per state
//! - Collaborator traits for trigger classification and utterance generation

pub mod context;
pub mod conversation;
pub mod knowledge;
pub mod state;
pub mod traits;
pub mod trigger;

pub use context::{CallContext, ContextError, Persona};
pub use conversation::{Speaker, TurnResult, Utterance};
pub use knowledge::KnowledgeCategory;
pub use state::{CallState, StateProfile};
pub use traits::{CollaboratorError, TriggerClassifier, UtteranceGenerator};
pub use trigger::{Trigger, UnknownTrigger};
