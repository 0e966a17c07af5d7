//! Error handling for scopeflow
//!
//! This module defines the crate-wide error type and a Result alias used
//! by the graph, the session loader and the engine thread.

use crate::graph::id::NodeId;
use thiserror::Error;

/// Main error type for scopeflow operations
#[derive(Error, Debug)]
pub enum ScopeFlowError {
    /// A proposed input binding was rejected by the node's validation predicate
    #[error("Node {node:?} rejected stream {stream} on input {input}")]
    InvalidWiring {
        node: NodeId,
        input: usize,
        stream: String,
    },

    /// Input index past the node's fixed input list
    #[error("Input index {index} out of range (node has {count} inputs)")]
    InputOutOfRange { index: usize, count: usize },

    /// Input looked up by a name the node does not declare
    #[error("Unknown input: {0}")]
    UnknownInput(String),

    /// Node id does not refer to a live node
    #[error("Unknown node: {0:?}")]
    UnknownNode(NodeId),

    /// Stream index past the node's output list
    #[error("Node {node:?} has no stream {stream}")]
    UnknownStream { node: NodeId, stream: usize },

    /// Parameter name the node does not declare
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// Value of the wrong type for a parameter
    #[error("Parameter '{name}' expects {expected}, got '{value}'")]
    ParameterType {
        name: String,
        value: String,
        expected: &'static str,
    },

    /// Binding would make the graph cyclic
    #[error("Cycle detected in flow graph")]
    CycleDetected,

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ScopeFlowError>,
    },
}

impl ScopeFlowError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ScopeFlowError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True for errors produced by a rejected binding
    pub fn is_invalid_wiring(&self) -> bool {
        match self {
            ScopeFlowError::InvalidWiring { .. } => true,
            ScopeFlowError::WithContext { source, .. } => source.is_invalid_wiring(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ScopeFlowError {
    fn from(err: serde_json::Error) -> Self {
        ScopeFlowError::Serialization(err.to_string())
    }
}

/// Result type alias for scopeflow operations
pub type Result<T> = std::result::Result<T, ScopeFlowError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
