// SPDX-FileCopyrightText: 2026 Trestle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Trestle signing engine.

use thiserror::Error;

/// The primary error type used across all Trestle crates.
#[derive(Debug, Error)]
pub enum TrestleError {
    /// Missing or invalid configuration, e.g. an unprovisioned signing secret.
    ///
    /// Fatal for the operation: raised before any mutation and never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// An envelope, request, document, or artifact does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The operation is not allowed in the current lifecycle state.
    #[error("{0}")]
    StateViolation(String),

    /// The authorization gate rejected the actor.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The outbound notification capability failed.
    #[error("notification error: {message}")]
    Notification {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TrestleError {
    /// Shorthand for a [`TrestleError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for a [`TrestleError::StateViolation`].
    pub fn state(message: impl Into<String>) -> Self {
        Self::StateViolation(message.into())
    }

    /// Whether the caller may retry the failed operation.
    ///
    /// Only storage and notification failures are transient. Lookups, state
    /// violations, authorization, and configuration failures are surfaced as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Notification { .. })
    }
}

impl From<serde_json::Error> for TrestleError {
    fn from(e: serde_json::Error) -> Self {
        TrestleError::Internal(format!("json encoding failed: {e}"))
    }
}
