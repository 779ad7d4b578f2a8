//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{
    CallConfig, CollaboratorConfig, CollaboratorMode, ConfigError, KnowledgeConfig, LlmSettings,
    PersonaConfig,
};

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Relaxed validation, warnings only
    #[default]
    Development,
    Staging,
    /// All validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Turn budget and session lifetime
    #[serde(default)]
    pub call: CallConfig,

    /// Classifier/generator selection, timeouts and retries
    #[serde(default)]
    pub collaborators: CollaboratorConfig,

    /// OpenAI-compatible backend used in `llm` mode
    #[serde(default)]
    pub llm: LlmSettings,

    /// Seller identity
    #[serde(default)]
    pub persona: PersonaConfig,

    /// Knowledge retrieval for the LLM generator
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_call()?;
        self.validate_collaborators()?;
        self.validate_turn_deadline()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        let server = &self.server;

        if server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if server.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        if self.environment.is_production() && server.auth.enabled && server.auth.api_key.is_none()
        {
            return Err(ConfigError::InvalidValue {
                field: "server.auth.api_key".to_string(),
                message: "API key must be set when auth is enabled in production".to_string(),
            });
        }

        if self.environment.is_production() && server.cors_enabled && server.cors_origins.is_empty()
        {
            tracing::warn!(
                "CORS is enabled in production but no origins are configured. \
                 This may block legitimate requests."
            );
        }

        Ok(())
    }

    fn validate_call(&self) -> Result<(), ConfigError> {
        let call = &self.call;

        if call.max_agent_turns == 0 {
            return Err(ConfigError::InvalidValue {
                field: "call.max_agent_turns".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if call.idle_expiry_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "call.idle_expiry_seconds".to_string(),
                message: "Must be at least 1 second".to_string(),
            });
        }

        if call.max_sessions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "call.max_sessions".to_string(),
                message: "Must be at least 1".to_string(),
            });
        }

        if call.cleanup_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "call.cleanup_interval_seconds".to_string(),
                message: "Must be at least 1 second".to_string(),
            });
        }

        Ok(())
    }

    fn validate_collaborators(&self) -> Result<(), ConfigError> {
        let collaborators = &self.collaborators;

        if collaborators.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "collaborators.timeout_ms".to_string(),
                message: "Timeout must be at least 1ms".to_string(),
            });
        }

        if collaborators.max_retries > 3 {
            return Err(ConfigError::InvalidValue {
                field: "collaborators.max_retries".to_string(),
                message: format!("At most 3 retries allowed, got {}", collaborators.max_retries),
            });
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "llm.temperature".to_string(),
                message: format!("Must be between 0.0 and 2.0, got {}", self.llm.temperature),
            });
        }

        if !(0.0..=1.0).contains(&self.llm.top_p) {
            return Err(ConfigError::InvalidValue {
                field: "llm.top_p".to_string(),
                message: format!("Must be between 0.0 and 1.0, got {}", self.llm.top_p),
            });
        }

        if collaborators.mode == CollaboratorMode::Llm {
            if self.llm.endpoint.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "llm.endpoint".to_string(),
                    message: "Endpoint is required in llm mode".to_string(),
                });
            }

            let has_key = self.llm.api_key.as_deref().is_some_and(|k| !k.is_empty());
            if !has_key && self.environment.is_production() {
                return Err(ConfigError::InvalidValue {
                    field: "llm.api_key".to_string(),
                    message: "API key must be set in llm mode in production".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl Settings {
    /// A turn must finish inside the HTTP request timeout, retries included
    fn validate_turn_deadline(&self) -> Result<(), ConfigError> {
        let worst = self.collaborators.worst_case_turn();
        let request_timeout = std::time::Duration::from_secs(self.server.timeout_seconds);

        if worst >= request_timeout {
            return Err(ConfigError::InvalidValue {
                field: "server.timeout_seconds".to_string(),
                message: format!(
                    "{}s is not enough for a turn whose collaborators may take {}ms \
                     (timeout_ms x attempts + backoff, for classifier and generator)",
                    self.server.timeout_seconds,
                    worst.as_millis()
                ),
            });
        }

        if self.knowledge.enabled && self.knowledge.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "knowledge.top_k".to_string(),
                message: "Must be at least 1 when knowledge is enabled".to_string(),
            });
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default)]
    pub auth: AuthConfig,
}

/// API key authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Disabled by default for development
    #[serde(default)]
    pub enabled: bool,

    /// Should be set via COLD_CALL__SERVER__AUTH__API_KEY
    #[serde(default)]
    pub api_key: Option<String>,

    /// Paths that bypass authentication
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

fn default_public_paths() -> Vec<String> {
    vec![
        "/health".to_string(),
        "/ready".to_string(),
        "/metrics".to_string(),
    ]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            public_paths: default_public_paths(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_seconds: default_timeout(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
            auth: AuthConfig::default(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from `config/` and the environment
///
/// Priority: env vars > config/{env} > config/default > defaults
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from an explicit configuration directory
pub fn load_settings_from(config_dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::from(config_dir.join("default")).required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(File::from(config_dir.join(env_name)).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("COLD_CALL")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
