//! Typed error hierarchy for swimlane.
//!
//! Three top-level enums cover the three layers:
//! - `StoreError`: SQL proxy failures (remote service, SQLite, row decoding)
//! - `BoardError`: board/lane/card operations, mapped to HTTP statuses by the API
//! - `ClientError`: failures seen by the client store when calling the API

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the persistence proxy.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database service answered but refused the query.
    #[error("{message}")]
    Rejected { message: String },

    #[error("Database request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Malformed row: {0}")]
    Decode(String),

    #[error("Database task failed: {0}")]
    Task(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

/// The kind of entity an operation was addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Board,
    Lane,
    Card,
    /// The lane a card is being moved into.
    TargetLane,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Entity::Board => "Board",
            Entity::Lane => "Swim lane",
            Entity::Card => "Card",
            Entity::TargetLane => "Target swim lane",
        })
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors from board, lane and card operations.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    #[error("{entity} not found")]
    NotFound { entity: Entity },

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl BoardError {
    pub fn not_found(entity: Entity) -> Self {
        BoardError::NotFound { entity }
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        BoardError::Validation(vec![FieldError::new(field, message)])
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors surfaced by the API client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Missing(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
