//! Application state

use std::sync::Arc;

use parking_lot::RwLock;

use cold_call_agent::{
    CallOrchestrator, CallPolicy, RuleBasedClassifier, SessionStore, TemplateGenerator,
};
use cold_call_config::{CollaboratorMode, KnowledgeConfig, PersonaConfig, Settings};
use cold_call_core::{Persona, TriggerClassifier, UtteranceGenerator};
use cold_call_knowledge::KnowledgeBase;
use cold_call_llm::{
    LlmBackend, LlmConfig, LlmTriggerClassifier, LlmUtteranceGenerator, OpenAIBackend,
};

use crate::ServerError;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Settings>>,
    pub calls: Arc<CallOrchestrator>,
    /// Model behind the collaborators in `llm` mode, checked by `/ready`
    pub backend: Option<Arc<dyn LlmBackend>>,
}

impl AppState {
    /// Build state with the collaborators selected by `collaborators.mode`
    pub fn new(settings: Settings) -> Result<Self, ServerError> {
        let persona = persona_from(&settings.persona);

        match settings.collaborators.mode {
            CollaboratorMode::Rules => Ok(Self::with_collaborators(
                settings,
                Arc::new(RuleBasedClassifier::new()),
                Arc::new(TemplateGenerator::new(persona)),
            )),
            CollaboratorMode::Llm => {
                let backend = OpenAIBackend::new(LlmConfig::from(&settings.llm))
                    .map_err(|e| ServerError::Internal(format!("LLM backend: {}", e)))?;
                let backend: Arc<dyn LlmBackend> = Arc::new(backend);
                tracing::info!(
                    model = %settings.llm.model,
                    endpoint = %settings.llm.endpoint,
                    "Using LLM collaborators"
                );

                let mut generator = LlmUtteranceGenerator::new(backend.clone(), persona.clone());
                if let Some(knowledge) = load_knowledge(&settings.knowledge)? {
                    generator = generator.with_knowledge(knowledge, settings.knowledge.top_k);
                }

                let mut state = Self::with_collaborators(
                    settings,
                    Arc::new(LlmTriggerClassifier::new(backend.clone(), persona)),
                    Arc::new(generator),
                );
                state.backend = Some(backend);
                Ok(state)
            }
        }
    }

    /// Build state around explicit collaborators
    pub fn with_collaborators(
        settings: Settings,
        classifier: Arc<dyn TriggerClassifier>,
        generator: Arc<dyn UtteranceGenerator>,
    ) -> Self {
        let store = Arc::new(SessionStore::from_config(&settings.call));
        let policy = CallPolicy::from(&settings);
        let calls = Arc::new(CallOrchestrator::new(store, classifier, generator, policy));

        Self {
            config: Arc::new(RwLock::new(settings)),
            calls,
            backend: None,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        self.calls.store()
    }

    /// Whether the collaborators can serve turns
    pub async fn collaborators_ready(&self) -> bool {
        match &self.backend {
            Some(backend) => backend.is_available().await,
            None => true,
        }
    }
}

/// Configured knowledge file, the built-in seed, or nothing when disabled
fn load_knowledge(config: &KnowledgeConfig) -> Result<Option<Arc<KnowledgeBase>>, ServerError> {
    if !config.enabled {
        return Ok(None);
    }

    let base = match &config.path {
        Some(path) => KnowledgeBase::load(path),
        None => KnowledgeBase::seed(),
    }
    .map_err(|e| ServerError::Internal(format!("Knowledge base: {}", e)))?;

    tracing::info!(entries = base.len(), top_k = config.top_k, "Knowledge retrieval enabled");
    Ok(Some(Arc::new(base)))
}

fn persona_from(config: &PersonaConfig) -> Persona {
    Persona::new(
        config.agent_name.as_str(),
        config.company_name.as_str(),
        config.product_name.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llm_settings() -> Settings {
        let mut settings = Settings::default();
        settings.collaborators.mode = CollaboratorMode::Llm;
        settings.llm.endpoint = "http://127.0.0.1:9/v1".to_string();
        settings
    }

    #[test]
    fn test_rules_mode_builds() {
        let state = AppState::new(Settings::default()).unwrap();
        assert_eq!(state.calls.active_sessions(), 0);
        assert_eq!(state.calls.policy().max_agent_turns, 12);
        assert!(state.backend.is_none());
    }

    #[test]
    fn test_llm_mode_requires_key_for_remote_endpoint() {
        let mut settings = Settings::default();
        settings.collaborators.mode = CollaboratorMode::Llm;
        settings.llm.api_key = None;
        assert!(matches!(
            AppState::new(settings),
            Err(ServerError::Internal(_))
        ));
    }

    #[test]
    fn test_llm_mode_keeps_backend() {
        let state = AppState::new(llm_settings()).unwrap();
        assert!(state.backend.is_some());
    }

    #[test]
    fn test_missing_knowledge_file_fails_startup() {
        let mut settings = llm_settings();
        settings.knowledge.path = Some("/nonexistent/knowledge.json".to_string());
        assert!(matches!(
            AppState::new(settings),
            Err(ServerError::Internal(_))
        ));

        let mut settings = llm_settings();
        settings.knowledge.enabled = false;
        settings.knowledge.path = Some("/nonexistent/knowledge.json".to_string());
        assert!(AppState::new(settings).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_not_ready() {
        let state = AppState::new(llm_settings()).unwrap();
        assert!(!state.collaborators_ready().await);
        assert!(AppState::new(Settings::default())
            .unwrap()
            .collaborators_ready()
            .await);
    }
}
