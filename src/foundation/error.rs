/// Crate-wide result alias.
pub type CompositorResult<T> = Result<T, CompositorError>;

/// Errors surfaced by graph construction and execution.
///
/// Broken user graphs are not errors: conversion substitutes neutral operations and records a
/// diagnostic instead. Cancellation is not an error either; see `ExecutionOutcome::Cancelled`.
#[derive(thiserror::Error, Debug)]
pub enum CompositorError {
    /// Invalid configuration or API misuse.
    #[error("validation error: {0}")]
    Validation(String),

    /// Structural problem the engine cannot repair (for example a cycle).
    #[error("graph error: {0}")]
    Graph(String),

    /// Allocation of a buffer or kernel table failed.
    #[error("resource error: {0}")]
    Resource(String),

    /// Invariant broken while a run was in flight.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CompositorError {
    /// Build a [`CompositorError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`CompositorError::Graph`].
    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }

    /// Build a [`CompositorError::Resource`].
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Build a [`CompositorError::Evaluation`].
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// Build a [`CompositorError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for CompositorError {
    fn from(err: serde_json::Error) -> Self {
        Self::serde(err.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
