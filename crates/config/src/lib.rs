//! Configuration management for the cold-call agent
//!
//! Supports loading configuration from:
//! - YAML/TOML files (`config/default`, then `config/{env}`)
//! - Environment variables (`COLD_CALL__` prefix, `__` between sections)
//!
//! e.g. `COLD_CALL__CALL__MAX_AGENT_TURNS=8` or
//! `COLD_CALL__COLLABORATORS__MODE=llm`.

pub mod call;
pub mod settings;

pub use call::{
    CallConfig, CollaboratorConfig, CollaboratorMode, KnowledgeConfig, LlmSettings, PersonaConfig,
};
pub use settings::{
    load_settings, load_settings_from, AuthConfig, ObservabilityConfig, RuntimeEnvironment,
    ServerConfig, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
