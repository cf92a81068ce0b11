//! Runtime error types.

use skein_framework::LifecycleError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while attaching or running the agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Boot service resolution failed.
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// `agent.enabled` is false.
    #[error("Agent is disabled by configuration")]
    Disabled,

    /// Listening for the shutdown signal failed.
    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
