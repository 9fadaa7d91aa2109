//! Error taxonomy for agent creation, routing and dispatch.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure reported by (or on behalf of) the external chat provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("provider call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("provider returned an empty response")]
    EmptyResponse,

    #[error("provider request failed{}: {message}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Request {
        code: Option<String>,
        message: String,
        retryable: bool,
    },
}

impl ProviderError {
    pub fn request(message: impl Into<String>, retryable: bool) -> Self {
        Self::Request {
            code: None,
            message: message.into(),
            retryable,
        }
    }

    pub fn retryable(&self) -> bool {
        match self {
            ProviderError::Timeout(_) => true,
            ProviderError::EmptyResponse => false,
            ProviderError::Request { retryable, .. } => *retryable,
        }
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("agent '{name}' is already registered with a different profile")]
    DuplicateName { name: String },

    /// Durable state exists but cannot be parsed. Never downgraded to an empty registry.
    #[error("agent registry at {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An entry is filed under a key that differs from the record's own name.
    #[error("agent registry at {} is corrupt: entry '{key}' holds agent '{name}'", .path.display())]
    KeyMismatch {
        path: PathBuf,
        key: String,
        name: String,
    },

    #[error("agent registry I/O failed at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize agent registry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One agent's failure while answering a query.
#[derive(Debug, Clone)]
pub struct AgentFailure {
    pub agent: String,
    pub error: ProviderError,
}

impl fmt::Display for AgentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.agent, self.error)
    }
}

/// Every matched agent failed for a single query.
#[derive(Debug, Clone, Error)]
#[error("all {} matched agents failed: {}", .failures.len(), render_failures(.failures))]
pub struct AllAgentsFailed {
    pub failures: Vec<AgentFailure>,
}

fn render_failures(failures: &[AgentFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to create agent '{name}': {source}")]
    AgentCreation {
        name: String,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    AllAgentsFailed(#[from] AllAgentsFailed),

    #[error("coordinator has not been started")]
    NotReady,
}
