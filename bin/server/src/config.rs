//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables.
//!
//! See [`AgentConfig`] for the agent runtime settings (`AGENT__*`) and
//! [`SessionConfig`] for session lifecycle settings (`SESSION__*`).

use serde::Deserialize;
use switchboard_ai::AgentConfig;
use switchboard_router::SessionConfig;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Agent runtime configuration.
    #[serde(default)]
    pub agent: AgentConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(
            config::Environment::default()
                .separator("__")
                .try_parsing(true),
        )
    }

    fn from_source(source: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }
}
