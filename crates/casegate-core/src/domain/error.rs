//! Domain-level error taxonomy for Casegate.

use casegate_state::{RevisionStatus, StorageError};

/// Casegate domain errors.
///
/// Storage failures propagate as `Storage`; they are never coerced into
/// empty results. The two structured variants `InvalidTransition` and
/// `AlreadyDecided` carry enough context for callers to build a precise
/// response without re-reading state.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("revision {revision_id} cannot move from {from} to {attempted}")]
    InvalidTransition {
        revision_id: String,
        from: RevisionStatus,
        attempted: RevisionStatus,
    },

    #[error("decision already recorded for {object_type}/{object_id} step {step} by {approver_id}")]
    AlreadyDecided {
        object_type: String,
        object_id: String,
        step: u32,
        approver_id: String,
    },

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            StorageError::DuplicateDecision {
                object_type,
                object_id,
                step,
                approver_id,
            } => CoreError::AlreadyDecided {
                object_type,
                object_id,
                step,
                approver_id,
            },
            other => CoreError::Storage(other),
        }
    }
}

impl CoreError {
    /// Shorthand for a validation failure on a named field.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field,
            message: message.into(),
        }
    }
}

/// Result type for Casegate domain operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_display() {
        let err = CoreError::InvalidTransition {
            revision_id: "r-1".to_string(),
            from: RevisionStatus::Approved,
            attempted: RevisionStatus::InReview,
        };
        let msg = err.to_string();
        assert!(msg.contains("APPROVED"));
        assert!(msg.contains("IN_REVIEW"));
    }

    #[test]
    fn test_duplicate_decision_maps_to_already_decided() {
        let storage = StorageError::DuplicateDecision {
            object_type: "RELEASE".to_string(),
            object_id: "rel-1".to_string(),
            step: 1,
            approver_id: "alice".to_string(),
        };
        let err = CoreError::from(storage);
        assert!(matches!(err, CoreError::AlreadyDecided { step: 1, .. }));
    }

    #[test]
    fn test_not_found_maps_across_layers() {
        let storage = StorageError::NotFound {
            entity: "revision",
            id: "r-9".to_string(),
        };
        let err = CoreError::from(storage);
        assert!(matches!(err, CoreError::NotFound { entity: "revision", .. }));
    }
}
