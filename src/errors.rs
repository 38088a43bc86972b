// Copyright (c) 2025 - Cowboy AI, Inc.

//! Error types for inventory construction

use thiserror::Error;

use crate::expr::ExpressionError;

/// Errors that can occur while resolving an inventory
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Remote fetch failure; no partial inventory is emitted
    #[error("Transport error: {0}")]
    Transport(String),

    /// A record is missing its required identity field
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Unknown or conflicting configuration keys, detected before any fetch
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Two normalized records produced the same host key
    #[error("Duplicate host identifier: {0}")]
    DuplicateHost(String),

    /// Static group declarations introduce a parent/child cycle
    #[error("Group graph cycle involving '{0}'")]
    GraphCycle(String),

    /// A compose/keyed-group/groups expression failed to parse
    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for inventory operations
pub type InventoryResult<T> = Result<T, InventoryError>;

impl From<serde_json::Error> for InventoryError {
    fn from(err: serde_json::Error) -> Self {
        InventoryError::Serialization(err.to_string())
    }
}
