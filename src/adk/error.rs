// SPDX-License-Identifier: MIT

//! Typed error handling for tailor-rs
//!
//! Library APIs return `Result<_, TailorError>`. Failures that happen *inside*
//! a pipeline stage never surface here: stages record them in the state's
//! error accumulator instead (see `tailor::workflow::types::StageError`).

use thiserror::Error;

/// Top-level error type for tailor-rs
#[derive(Debug, Error)]
pub enum TailorError {
    /// API errors from external services (Anthropic, ...)
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Configuration errors (missing env vars, invalid config)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Graph topology or routing errors
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Model/provider errors
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// The interactive collaborator could not produce a selection
    #[error("Selection error: {0}")]
    Selection(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Max iterations/steps reached
    #[error("Max {kind} reached: {limit}")]
    MaxIterations { kind: String, limit: u32 },

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Graph construction and routing errors
///
/// All of these are raised by `StateGraph::compile`, so a misconfigured
/// topology fails before any stage runs.
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    /// No entry stage was set
    #[error("Graph '{0}' has no entry stage")]
    MissingEntry(String),

    /// A stage name was referenced but never added
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    /// The same stage was added twice
    #[error("Stage added twice: {0}")]
    DuplicateStage(String),

    /// A stage has no outgoing edge (not even a terminal one)
    #[error("Stage '{0}' has no outgoing edge")]
    MissingEdge(String),

    /// A stage was given more than one outgoing edge
    #[error("Stage '{0}' has more than one outgoing edge")]
    DuplicateEdge(String),

    /// A router can produce a route that has no successor
    #[error("Router on '{stage}' can return '{route}' but no successor is mapped")]
    UnmappedRoute { stage: String, route: String },

    /// A successor is mapped for a route the router never produces
    #[error("Route '{route}' on '{stage}' is not produced by its router")]
    UnknownRoute { stage: String, route: String },

    /// No terminal stage
    #[error("Graph '{0}' has no terminal stage")]
    NoTerminal(String),

    /// More than one terminal stage
    #[error("Graph has more than one terminal stage: {0:?}")]
    MultipleTerminals(Vec<String>),

    /// A stage cannot be reached from the entry
    #[error("Stage '{0}' is unreachable from the entry stage")]
    Unreachable(String),

    /// Circular dependency detected in the graph
    #[error("Circular dependency detected: {0:?}")]
    CircularDependency(Vec<String>),
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// API key not configured
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    /// Model not supported
    #[error("Model not supported: {0}")]
    UnsupportedModel(String),

    /// Invalid response from model
    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),
}

impl TailorError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a selection error
    pub fn selection(message: impl Into<String>) -> Self {
        Self::Selection(message.into())
    }

    /// Create from a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<&str> for TailorError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for TailorError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_wraps_into_tailor_error() {
        let err: TailorError = GraphError::UnknownStage("missing".to_string()).into();
        assert_eq!(err.to_string(), "Graph error: Unknown stage: missing");
    }

    #[test]
    fn test_api_error_display() {
        let err = TailorError::api("anthropic", "overloaded");
        assert_eq!(err.to_string(), "API error from anthropic: overloaded");
    }

    #[test]
    fn test_from_str() {
        let err: TailorError = "boom".into();
        assert!(matches!(err, TailorError::Other(ref m) if m == "boom"));
    }
}
