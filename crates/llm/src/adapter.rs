//! Adapters implementing the core collaborator traits
//!
//! Bridges an [`LlmBackend`] to [`TriggerClassifier`] and
//! [`UtteranceGenerator`]. Transport failures surface as
//! [`CollaboratorError`]; content the model gets wrong is absorbed here.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use cold_call_core::{
    CallContext, CallState, CollaboratorError, Persona, Trigger, TriggerClassifier, Utterance,
    UtteranceGenerator,
};
use cold_call_knowledge::KnowledgeBase;

use crate::backend::{FinishReason, LlmBackend};
use crate::prompt::{PromptBuilder, PromptMode};

/// Raw classifier reply
#[derive(Debug, Deserialize)]
struct ClassifierReply {
    trigger: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Raw generator reply, when the model wraps its answer in JSON anyway
#[derive(Debug, Deserialize)]
struct GeneratorReply {
    response: String,
}

/// Slice from the first `{` to the last `}`, tolerating code fences and prose
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Trigger classifier backed by a chat model
pub struct LlmTriggerClassifier {
    backend: Arc<dyn LlmBackend>,
    persona: Persona,
}

impl LlmTriggerClassifier {
    pub fn new(backend: Arc<dyn LlmBackend>, persona: Persona) -> Self {
        Self { backend, persona }
    }

    /// Interpret model output for a state. Anything unusable is `None`.
    fn interpret(state: CallState, text: &str) -> Option<Trigger> {
        let Some(json) = extract_json(text) else {
            tracing::debug!(state = %state, "Classifier output has no JSON object");
            return None;
        };

        let reply: ClassifierReply = match serde_json::from_str(json) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::debug!(state = %state, error = %e, "Classifier output is not valid JSON");
                return None;
            }
        };

        let raw = reply.trigger?;
        if raw.trim().eq_ignore_ascii_case("none") || raw.trim().is_empty() {
            return None;
        }

        match raw.parse::<Trigger>() {
            Ok(trigger) if state.accepts(trigger) => {
                tracing::debug!(
                    state = %state,
                    trigger = %trigger.as_str(),
                    reasoning = reply.reasoning.as_deref().unwrap_or(""),
                    "Classified prospect reply"
                );
                Some(trigger)
            }
            Ok(trigger) => {
                tracing::debug!(
                    state = %state,
                    trigger = %trigger.as_str(),
                    "Classifier returned a trigger not valid in this state"
                );
                None
            }
            Err(e) => {
                tracing::debug!(state = %state, error = %e, "Classifier returned unknown trigger");
                None
            }
        }
    }
}

#[async_trait]
impl TriggerClassifier for LlmTriggerClassifier {
    async fn classify(
        &self,
        state: CallState,
        history: &[Utterance],
        latest_message: &str,
    ) -> Result<Option<Trigger>, CollaboratorError> {
        if state.is_terminal() {
            return Ok(None);
        }

        let messages = PromptBuilder::new(self.persona.clone())
            .system_prompt(state, None, PromptMode::Classify)
            .with_history(history)
            .user_message(latest_message)
            .build();

        let result = self.backend.generate(&messages).await?;
        Ok(Self::interpret(state, &result.text))
    }

    fn name(&self) -> &str {
        "llm_classifier"
    }
}

/// Cut a reply that ran out of tokens back to its last full sentence
fn trim_to_sentence(text: &str) -> &str {
    match text.rfind(['.', '?', '!']) {
        Some(end) => &text[..=end],
        None => text,
    }
}

/// Utterance generator backed by a chat model
pub struct LlmUtteranceGenerator {
    backend: Arc<dyn LlmBackend>,
    persona: Persona,
    knowledge: Option<Arc<KnowledgeBase>>,
    top_k: usize,
}

impl LlmUtteranceGenerator {
    pub fn new(backend: Arc<dyn LlmBackend>, persona: Persona) -> Self {
        Self {
            backend,
            persona,
            knowledge: None,
            top_k: 3,
        }
    }

    /// Retrieve up to `top_k` entries per turn from the state's categories
    pub fn with_knowledge(mut self, knowledge: Arc<KnowledgeBase>, top_k: usize) -> Self {
        self.knowledge = Some(knowledge);
        self.top_k = top_k;
        self
    }

    /// Knowledge for the prospect's last line, if any applies to this state
    fn knowledge_for(&self, state: CallState, history: &[Utterance]) -> Option<String> {
        let knowledge = self.knowledge.as_ref()?;
        let categories = state.profile().knowledge_categories;
        if categories.is_empty() {
            return None;
        }

        let query = history
            .iter()
            .rev()
            .find(|u| !u.is_agent())
            .map(|u| u.message.as_str())
            .unwrap_or("");
        let entries = knowledge.retrieve(query, categories, self.top_k);
        tracing::debug!(
            state = %state,
            retrieved = entries.len(),
            "Retrieved knowledge for generation"
        );
        Some(KnowledgeBase::format_for_prompt(&entries))
    }

    /// Reduce model output to the spoken line
    fn clean(text: &str) -> String {
        let text = text.trim();

        let spoken = extract_json(text)
            .and_then(|json| serde_json::from_str::<GeneratorReply>(json).ok())
            .map(|reply| reply.response)
            .unwrap_or_else(|| text.to_string());

        spoken
            .trim()
            .trim_matches(|c| c == '"' || c == '\u{201c}' || c == '\u{201d}')
            .trim()
            .to_string()
    }
}

#[async_trait]
impl UtteranceGenerator for LlmUtteranceGenerator {
    async fn generate(
        &self,
        state: CallState,
        context: &CallContext,
        history: &[Utterance],
    ) -> Result<String, CollaboratorError> {
        let mut builder = PromptBuilder::new(self.persona.clone())
            .system_prompt(state, Some(context), PromptMode::Generate);
        if let Some(knowledge) = self.knowledge_for(state, history) {
            builder = builder.with_knowledge(&knowledge);
        }
        builder = builder.with_history(history);

        if history.is_empty() {
            builder = builder.user_message("[The prospect picks up the phone.]");
        }

        let result = self.backend.generate(&builder.build()).await?;
        let mut line = Self::clean(&result.text);
        if result.finish_reason == FinishReason::Length {
            tracing::warn!(
                state = %state,
                tokens = result.tokens,
                "Reply hit the token limit, trimming to the last full sentence"
            );
            line = trim_to_sentence(&line).to_string();
        }
        if line.is_empty() {
            return Err(CollaboratorError::EmptyOutput);
        }
        Ok(line)
    }

    fn name(&self) -> &str {
        "llm_generator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::GenerationResult;
    use crate::prompt::{Message, Role};
    use crate::LlmError;
    use parking_lot::Mutex;

    /// Backend replaying a fixed answer and recording the prompts it saw
    struct FakeBackend {
        reply: Result<String, String>,
        finish_reason: FinishReason,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl FakeBackend {
        fn answering(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                finish_reason: FinishReason::Stop,
                seen: Mutex::new(Vec::new()),
            })
        }

        /// Answer cut off at the token limit
        fn truncated(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                finish_reason: FinishReason::Length,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing(msg: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(msg.to_string()),
                finish_reason: FinishReason::Stop,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmBackend for FakeBackend {
        async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
            self.seen.lock().push(messages.to_vec());
            match &self.reply {
                Ok(text) => Ok(GenerationResult {
                    text: text.clone(),
                    tokens: 1,
                    total_time_ms: 1,
                    finish_reason: self.finish_reason,
                }),
                Err(msg) => Err(LlmError::Api(msg.clone())),
            }
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn model_name(&self) -> &str {
            "fake"
        }
    }

    #[tokio::test]
    async fn test_classifier_parses_fenced_json() {
        let backend = FakeBackend::answering(
            "```json\n{\"trigger\": \"BUYING_SIGNAL\", \"reasoning\": \"asked how it works\"}\n```",
        );
        let classifier = LlmTriggerClassifier::new(backend.clone(), Persona::default());

        let trigger = classifier
            .classify(CallState::Pitch, &[], "How does that work?")
            .await
            .unwrap();
        assert_eq!(trigger, Some(Trigger::BuyingSignal));

        let seen = backend.seen.lock();
        let last = seen[0].last().unwrap();
        assert_eq!(last.role, Role::User);
        assert_eq!(last.content, "How does that work?");
    }

    #[tokio::test]
    async fn test_classifier_drops_unusable_triggers() {
        for reply in [
            r#"{"trigger": "NONE"}"#,
            r#"{"trigger": "EMAIL_PROVIDED"}"#,
            r#"{"trigger": "TIMEOUT"}"#,
            r#"{"trigger": "MAYBE_LATER"}"#,
            "I think they are interested",
        ] {
            let classifier =
                LlmTriggerClassifier::new(FakeBackend::answering(reply), Persona::default());
            let trigger = classifier
                .classify(CallState::Pitch, &[], "hmm")
                .await
                .unwrap();
            assert_eq!(trigger, None, "reply {reply:?}");
        }
    }

    #[tokio::test]
    async fn test_classifier_surfaces_backend_failure() {
        let classifier =
            LlmTriggerClassifier::new(FakeBackend::failing("HTTP 503"), Persona::default());
        let err = classifier
            .classify(CallState::Greeting, &[], "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_generator_cleans_output() {
        let generator = LlmUtteranceGenerator::new(
            FakeBackend::answering("  \"Hi James, this is Sarah from SalesPilot.\"  "),
            Persona::default(),
        );
        let line = generator
            .generate(CallState::Greeting, &CallContext::new("James"), &[])
            .await
            .unwrap();
        assert_eq!(line, "Hi James, this is Sarah from SalesPilot.");

        let generator = LlmUtteranceGenerator::new(
            FakeBackend::answering(r#"{"response": "Thanks for your time!"}"#),
            Persona::default(),
        );
        let line = generator
            .generate(CallState::End, &CallContext::new("James"), &[])
            .await
            .unwrap();
        assert_eq!(line, "Thanks for your time!");
    }

    #[tokio::test]
    async fn test_generator_rejects_empty_output() {
        let generator =
            LlmUtteranceGenerator::new(FakeBackend::answering("  \"\" "), Persona::default());
        let err = generator
            .generate(CallState::Rapport, &CallContext::new("James"), &[])
            .await
            .unwrap_err();
        assert_eq!(err, CollaboratorError::EmptyOutput);
    }

    #[tokio::test]
    async fn test_generator_trims_truncated_reply() {
        let generator = LlmUtteranceGenerator::new(
            FakeBackend::truncated("Totally fair. Most teams we talk to said the same, and then they"),
            Persona::default(),
        );
        let line = generator
            .generate(CallState::Objection, &CallContext::new("James"), &[])
            .await
            .unwrap();
        assert_eq!(line, "Totally fair.");

        // Complete replies are left alone
        let generator = LlmUtteranceGenerator::new(
            FakeBackend::answering("Totally fair. Most teams said the same, and then they"),
            Persona::default(),
        );
        let line = generator
            .generate(CallState::Objection, &CallContext::new("James"), &[])
            .await
            .unwrap();
        assert!(line.ends_with("then they"));
    }

    #[tokio::test]
    async fn test_generator_injects_state_knowledge() {
        let backend = FakeBackend::answering("Totally fair, what if we started with a pilot?");
        let generator = LlmUtteranceGenerator::new(backend.clone(), Persona::default())
            .with_knowledge(Arc::new(KnowledgeBase::seed().unwrap()), 2);
        let history = vec![
            Utterance::agent("Could I show you how it works?", CallState::Pitch),
            Utterance::prospect("Honestly it's too expensive for us.", CallState::Pitch),
        ];

        generator
            .generate(CallState::Objection, &CallContext::new("James"), &history)
            .await
            .unwrap();

        let seen = backend.seen.lock();
        let system = &seen[0][0].content;
        assert!(system.contains("## Knowledge to use"));
        assert!(system.contains("[objection_handling/too_expensive]"));
    }

    #[tokio::test]
    async fn test_generator_skips_knowledge_at_end() {
        let backend = FakeBackend::answering("Thanks, James. Have a great day!");
        let generator = LlmUtteranceGenerator::new(backend.clone(), Persona::default())
            .with_knowledge(Arc::new(KnowledgeBase::seed().unwrap()), 3);

        generator
            .generate(CallState::End, &CallContext::new("James"), &[])
            .await
            .unwrap();
        assert!(!backend.seen.lock()[0][0].content.contains("Knowledge to use"));
    }

    #[test]
    fn test_extract_json() {
        assert_eq!(extract_json("x {\"a\":1} y"), Some("{\"a\":1}"));
        assert_eq!(extract_json("no braces"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }
}
