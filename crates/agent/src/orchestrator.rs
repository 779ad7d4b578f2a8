//! Call orchestrator
//!
//! Drives one prospect turn end to end: classify, advance the state machine,
//! generate the reply. Every turn works on a draft copy of the session that
//! is committed only when the whole turn succeeds, so a collaborator failure
//! leaves the stored call exactly as it was.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cold_call_config::Settings;
use cold_call_core::{
    CallContext, CallState, CollaboratorError, Trigger, TriggerClassifier, TurnResult,
    UtteranceGenerator,
};

use crate::session::Session;
use crate::store::SessionStore;
use crate::summary::CallSummary;
use crate::transition::{self, Transition};
use crate::{CallError, Result};

/// Spoken when the engine cannot place a turn; never exposes the cause
const GRACEFUL_EXIT_LINE: &str =
    "I'm sorry, I think I've taken enough of your time today. Thanks so much for chatting, and have a great rest of your day.";

/// Turn budget and collaborator call policy
#[derive(Debug, Clone)]
pub struct CallPolicy {
    /// Prospect turns allowed before a non-advancing reply forces WRAP_UP
    pub max_agent_turns: u32,
    pub collaborator_timeout: Duration,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for CallPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            max_agent_turns: settings.call.max_agent_turns,
            collaborator_timeout: settings.collaborators.timeout(),
            max_retries: settings.collaborators.max_retries,
            retry_backoff: settings.collaborators.retry_backoff(),
        }
    }
}

/// Runs calls against a session store with pluggable collaborators
pub struct CallOrchestrator {
    store: Arc<SessionStore>,
    classifier: Arc<dyn TriggerClassifier>,
    generator: Arc<dyn UtteranceGenerator>,
    policy: CallPolicy,
}

impl CallOrchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        classifier: Arc<dyn TriggerClassifier>,
        generator: Arc<dyn UtteranceGenerator>,
        policy: CallPolicy,
    ) -> Self {
        Self {
            store,
            classifier,
            generator,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn policy(&self) -> &CallPolicy {
        &self.policy
    }

    /// Open a call: create the session and speak the opening line
    pub async fn start(&self, session_id: &str, context: CallContext) -> Result<TurnResult> {
        if session_id.trim().is_empty() {
            return Err(CallError::InvalidRequest(
                "session_id must not be empty".to_string(),
            ));
        }
        context.validate()?;

        if self.store.is_live(session_id) {
            return Err(CallError::DuplicateSession(session_id.to_string()));
        }

        let mut session = Session::new(session_id, context);
        let opening = self.generate(&session, session.state).await?;
        session.record_agent(opening.clone());

        self.store.insert(session)?;

        tracing::info!(
            session_id = %session_id,
            generator = self.generator.name(),
            "Call started"
        );

        Ok(TurnResult::new(CallState::Greeting, opening))
    }

    /// Process one prospect message and return the agent's reply
    pub async fn turn(&self, session_id: &str, prospect_message: &str) -> Result<TurnResult> {
        let lease = self.store.acquire(session_id)?;
        if lease.session().is_call_over() {
            return Err(CallError::CallAlreadyOver(session_id.to_string()));
        }
        if prospect_message.trim().is_empty() {
            return Err(CallError::InvalidRequest(
                "prospect_message must not be empty".to_string(),
            ));
        }

        let mut draft = lease.session().clone();
        let from = draft.state;

        let classified = self
            .classify(&draft, prospect_message)
            .await?
            .filter(|trigger| {
                if trigger.is_synthetic() {
                    tracing::warn!(
                        session_id = %session_id,
                        state = %from,
                        "Classifier returned engine-only trigger, ignoring"
                    );
                    return false;
                }
                true
            });

        draft.record_prospect(prospect_message);

        let counters = draft.counters();
        let trigger = if draft.turn_count > self.policy.max_agent_turns
            && !transition::is_advancing(from, classified, &counters)
        {
            tracing::info!(
                session_id = %session_id,
                state = %from,
                turn = draft.turn_count,
                "Turn budget exhausted, forcing wrap-up"
            );
            Some(Trigger::Timeout)
        } else {
            classified
        };

        let reply = self.advance(session_id, &mut draft, trigger).await?;

        draft.record_agent(reply.clone());
        let result = TurnResult::new(draft.state, reply);
        lease.commit(draft);

        Ok(result)
    }

    /// Summary of a call, live or ended
    pub async fn summary(&self, session_id: &str) -> Result<CallSummary> {
        let session = self.store.snapshot(session_id).await?;
        Ok(CallSummary::from_session(&session))
    }

    /// Drop a call explicitly
    pub fn end(&self, session_id: &str) -> Result<()> {
        self.store.remove(session_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.store.count()
    }

    pub fn evict_expired(&self) -> usize {
        self.store.evict_expired()
    }

    /// Resolve the trigger against the draft, apply it and produce the reply
    ///
    /// On an invariant violation the draft is wrapped up and the graceful exit
    /// line is returned; the generator is not consulted.
    async fn advance(
        &self,
        session_id: &str,
        draft: &mut Session,
        trigger: Option<Trigger>,
    ) -> Result<String> {
        let from = draft.state;
        match transition::resolve(from, trigger, &draft.counters()) {
            Ok(step) => {
                draft.apply(&step);
                self.log_transition(session_id, &step);
                self.generate(draft, draft.state).await
            }
            Err(violation) => {
                tracing::error!(
                    session_id = %session_id,
                    state = %from,
                    error = %violation,
                    "Invariant violation, ending call gracefully"
                );
                draft.force_wrap_up();
                Ok(GRACEFUL_EXIT_LINE.to_string())
            }
        }
    }

    fn log_transition(&self, session_id: &str, step: &Transition) {
        let trigger = step.trigger.map(|t| t.as_str()).unwrap_or("NONE");
        if step.changes_state() {
            tracing::info!(
                session_id = %session_id,
                from = %step.from,
                to = %step.to,
                trigger,
                "State transition"
            );
        } else {
            tracing::debug!(session_id = %session_id, state = %step.from, trigger, "Stayed in state");
        }
    }

    async fn classify(&self, session: &Session, message: &str) -> Result<Option<Trigger>> {
        let classifier = &self.classifier;
        self.with_retry(classifier.name(), || {
            classifier.classify(session.state, &session.history, message)
        })
        .await
        .map_err(|source| CallError::ServiceUnavailable {
            collaborator: "classifier",
            source,
        })
    }

    async fn generate(&self, session: &Session, state: CallState) -> Result<String> {
        let generator = &self.generator;
        self.with_retry(generator.name(), || async move {
            let line = generator
                .generate(state, &session.context, &session.history)
                .await?;
            let line = line.trim();
            if line.is_empty() {
                return Err(CollaboratorError::EmptyOutput);
            }
            Ok(line.to_string())
        })
        .await
        .map_err(|source| CallError::ServiceUnavailable {
            collaborator: "generator",
            source,
        })
    }

    /// Run a collaborator call under the timeout, retrying with a doubling backoff
    async fn with_retry<T, F, Fut>(
        &self,
        name: &str,
        mut call: F,
    ) -> std::result::Result<T, CollaboratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, CollaboratorError>>,
    {
        let timeout = self.policy.collaborator_timeout;
        let mut backoff = self.policy.retry_backoff;
        let mut attempt = 0;

        loop {
            let outcome = match tokio::time::timeout(timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(CollaboratorError::Timeout {
                    after_ms: timeout.as_millis() as u64,
                }),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.policy.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        collaborator = name,
                        attempt,
                        error = %e,
                        "Collaborator call failed, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    tracing::error!(collaborator = name, error = %e, "Collaborator call failed");
                    return Err(e);
                }
            }
        }
    }
}
