//! Error types for casegate-state

use thiserror::Error;

/// Errors that can occur in the persistence layer.
///
/// Storage failures are always surfaced to the caller as a typed error.
/// Backends must never coerce a failed read into an empty result — a
/// transient outage has to stay distinguishable from "no rows".
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection error
    #[error("database connection failed: {0}")]
    Connection(String),

    /// Backend query or write error
    #[error("storage backend failure: {0}")]
    Backend(String),

    /// Serialization error
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Schema setup error
    #[error("schema setup failed: {0}")]
    SchemaSetup(String),

    /// Referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind ("artifact", "revision", "release", ...)
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// The (object_type, object_id, step, approver_id) tuple already has a
    /// recorded decision. Raised by the atomic check-and-insert, never by a
    /// read-then-write in application code.
    #[error("decision already recorded for {object_type}/{object_id} step {step} by {approver_id}")]
    DuplicateDecision {
        object_type: String,
        object_id: String,
        step: u32,
        approver_id: String,
    },

    /// Sequence allocation lost the race too many times in a row.
    #[error("sequence allocation conflict for artifact {artifact_id}")]
    SequenceConflict { artifact_id: String },

    /// Compare-and-swap status update found a different current status.
    #[error("revision {revision_id} is no longer in status {expected}")]
    StaleStatus {
        revision_id: String,
        expected: String,
    },
}

impl From<surrealdb::Error> for StorageError {
    fn from(err: surrealdb::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
