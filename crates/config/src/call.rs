//! Call engine, collaborator and persona settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Turn budget and session lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    /// Prospect turns allowed before a non-advancing reply forces WRAP_UP
    #[serde(default = "default_max_agent_turns")]
    pub max_agent_turns: u32,

    /// Idle sessions are evicted after this many seconds without activity
    #[serde(default = "default_idle_expiry")]
    pub idle_expiry_seconds: u64,

    /// Ended sessions stay readable for this many seconds
    #[serde(default = "default_ended_retention")]
    pub ended_retention_seconds: u64,

    /// Maximum number of live sessions held in memory
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// How often the background sweeper runs
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

fn default_max_agent_turns() -> u32 {
    12
}
fn default_idle_expiry() -> u64 {
    1800
}
fn default_ended_retention() -> u64 {
    300
}
fn default_max_sessions() -> usize {
    1000
}
fn default_cleanup_interval() -> u64 {
    60
}

impl CallConfig {
    pub fn idle_expiry(&self) -> Duration {
        Duration::from_secs(self.idle_expiry_seconds)
    }

    pub fn ended_retention(&self) -> Duration {
        Duration::from_secs(self.ended_retention_seconds)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            max_agent_turns: default_max_agent_turns(),
            idle_expiry_seconds: default_idle_expiry(),
            ended_retention_seconds: default_ended_retention(),
            max_sessions: default_max_sessions(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

/// Which implementation backs the classifier and generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorMode {
    /// Deterministic phrase rules and spoken templates
    #[default]
    Rules,
    /// OpenAI-compatible chat completions
    Llm,
}

/// Timeout and retry policy applied around every collaborator call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorConfig {
    #[serde(default)]
    pub mode: CollaboratorMode,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_collaborator_timeout")]
    pub timeout_ms: u64,

    /// Retries after the first failed attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_collaborator_timeout() -> u64 {
    6000
}
fn default_max_retries() -> u32 {
    1
}
fn default_retry_backoff() -> u64 {
    250
}

impl CollaboratorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Longest one collaborator call can take with every attempt timing out
    pub fn worst_case_call(&self) -> Duration {
        let attempts = self.max_retries.saturating_add(1);
        // Backoff doubles: b + 2b + 4b + ...
        let backoff_units = 2u32.saturating_pow(self.max_retries) - 1;
        self.timeout()
            .saturating_mul(attempts)
            .saturating_add(self.retry_backoff().saturating_mul(backoff_units))
    }

    /// Longest one prospect turn can take: a classification then a generation
    pub fn worst_case_turn(&self) -> Duration {
        self.worst_case_call() * 2
    }
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            mode: CollaboratorMode::default(),
            timeout_ms: default_collaborator_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

/// OpenAI-compatible endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Should be set via COLD_CALL__LLM__API_KEY
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,

    #[serde(default = "default_llm_top_p")]
    pub top_p: f32,

    /// HTTP request timeout in milliseconds
    #[serde(default = "default_llm_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_llm_endpoint() -> String {
    "https://api.groq.com/openai/v1".to_string()
}
fn default_llm_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_llm_max_tokens() -> usize {
    256
}
fn default_llm_temperature() -> f32 {
    0.7
}
fn default_llm_top_p() -> f32 {
    0.9
}
fn default_llm_request_timeout() -> u64 {
    10_000
}

impl LlmSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: None,
            max_tokens: default_llm_max_tokens(),
            temperature: default_llm_temperature(),
            top_p: default_llm_top_p(),
            request_timeout_ms: default_llm_request_timeout(),
        }
    }
}

/// Sales knowledge consulted by the LLM generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_knowledge_enabled")]
    pub enabled: bool,

    /// JSON or YAML knowledge file; the built-in seed is used when unset
    #[serde(default)]
    pub path: Option<String>,

    /// Scored entries retrieved per turn
    #[serde(default = "default_knowledge_top_k")]
    pub top_k: usize,
}

fn default_knowledge_enabled() -> bool {
    true
}
fn default_knowledge_top_k() -> usize {
    3
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            enabled: default_knowledge_enabled(),
            path: None,
            top_k: default_knowledge_top_k(),
        }
    }
}

/// Seller identity used in every call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    #[serde(default = "default_company_name")]
    pub company_name: String,

    #[serde(default = "default_product_name")]
    pub product_name: String,
}

fn default_agent_name() -> String {
    "Sarah".to_string()
}
fn default_company_name() -> String {
    "SalesPilot".to_string()
}
fn default_product_name() -> String {
    "SalesPilot AI".to_string()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            agent_name: default_agent_name(),
            company_name: default_company_name(),
            product_name: default_product_name(),
        }
    }
}
