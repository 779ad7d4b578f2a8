//! Collaborator seams the call engine depends on
//!
//! Both capabilities are open-ended and may be slow or fail; the engine only
//! ever sees an enumerated trigger or a finished line of text.

mod collaborators;

pub use collaborators::{CollaboratorError, TriggerClassifier, UtteranceGenerator};
