//! HTTP error mapping for the daemon.
//!
//! Every handler returns `Result<_, ApiError>`; the mapping from domain
//! error to status code lives here and nowhere else:
//!
//! | Domain error        | Status |
//! |---------------------|--------|
//! | Validation          | 400    |
//! | NotFound            | 404    |
//! | AlreadyDecided      | 409    |
//! | InvalidTransition   | 422    |
//! | Storage             | 500    |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use casegate_core::CoreError;

/// Wrapper so `CoreError` can cross the axum response boundary.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    /// A 400 for request-shape problems caught in the handler itself.
    pub fn bad_request(field: &'static str, message: impl Into<String>) -> Self {
        ApiError(CoreError::validation(field, message))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, details) = match &self.0 {
            CoreError::Validation { field, .. } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION",
                Some(json!({ "field": field })),
            ),
            CoreError::NotFound { entity, id } => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                Some(json!({ "entity": entity, "id": id })),
            ),
            CoreError::AlreadyDecided {
                object_type,
                object_id,
                step,
                approver_id,
            } => (
                StatusCode::CONFLICT,
                "ALREADY_DECIDED",
                Some(json!({
                    "objectType": object_type,
                    "objectId": object_id,
                    "step": step,
                    "approverId": approver_id,
                })),
            ),
            CoreError::InvalidTransition {
                revision_id,
                from,
                attempted,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_TRANSITION",
                Some(json!({
                    "revisionId": revision_id,
                    "from": from,
                    "attempted": attempted,
                })),
            ),
            CoreError::Storage(inner) => {
                error!(event = "http.storage_error", error = %inner);
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE", None)
            }
        };

        let mut body = json!({
            "error": kind,
            "message": self.0.to_string(),
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casegate_state::RevisionStatus;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                CoreError::validation("title", "empty"),
                StatusCode::BAD_REQUEST,
            ),
            (
                CoreError::NotFound {
                    entity: "release",
                    id: "x".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                CoreError::AlreadyDecided {
                    object_type: "RELEASE".to_string(),
                    object_id: "x".to_string(),
                    step: 1,
                    approver_id: "a".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (
                CoreError::InvalidTransition {
                    revision_id: "r".to_string(),
                    from: RevisionStatus::Approved,
                    attempted: RevisionStatus::InReview,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (err, expected) in cases {
            let response = ApiError(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
