//! Revision lifecycle - the status machine for test-case and scenario
//! revisions.
//!
//! Revisions are append-only content snapshots: editing always creates a new
//! revision with the next sequence number, and only the `status` field of an
//! existing revision ever changes. The legal status moves are:
//!
//! ```text
//! DRAFT -> IN_REVIEW          (submit for review)
//! IN_REVIEW -> APPROVED       (review step satisfied)
//! IN_REVIEW -> DEPRECATED     (rejected)
//! DEPRECATED -> DRAFT         (explicit re-open)
//! ```
//!
//! Everything else fails with `CoreError::InvalidTransition`. Re-opening
//! moves the same revision back to DRAFT; its content and sequence number
//! are untouched.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::error::{CoreError, Result};
use crate::domain::{
    Artifact, ArtifactKind, NewRevision, Revision, RevisionStatus,
};
use crate::obs;
use casegate_state::RevisionStore;

/// Returns whether `from -> to` is a legal status move.
pub fn transition_allowed(from: RevisionStatus, to: RevisionStatus) -> bool {
    use RevisionStatus::*;
    matches!(
        (from, to),
        (Draft, InReview) | (InReview, Approved) | (InReview, Deprecated) | (Deprecated, Draft)
    )
}

/// Request to create a new artifact with its initial revision.
#[derive(Debug, Clone)]
pub struct CreateArtifact {
    pub project_id: String,
    pub kind: ArtifactKind,
    pub title: String,
    pub content: String,
    pub reason: Option<String>,
    pub created_by: String,
}

/// Service owning artifact creation and revision status moves.
pub struct RevisionLifecycle {
    revisions: Arc<dyn RevisionStore>,
}

impl RevisionLifecycle {
    pub fn new(revisions: Arc<dyn RevisionStore>) -> Self {
        Self { revisions }
    }

    /// Create an artifact and its initial revision (sequence 1, DRAFT).
    ///
    /// The initial revision needs no change reason; there is no previous
    /// version to explain a change against.
    pub async fn create_artifact(&self, req: CreateArtifact) -> Result<(Artifact, Revision)> {
        if req.title.trim().is_empty() {
            return Err(CoreError::validation("title", "must not be empty"));
        }
        if req.created_by.trim().is_empty() {
            return Err(CoreError::validation("created_by", "must not be empty"));
        }

        let artifact = self
            .revisions
            .insert_artifact(Artifact {
                artifact_id: Uuid::new_v4(),
                project_id: req.project_id,
                kind: req.kind,
                created_by: req.created_by.clone(),
                created_at: Utc::now(),
            })
            .await?;

        let revision = self
            .revisions
            .append_revision(
                &artifact.artifact_id,
                NewRevision {
                    title: req.title,
                    content: req.content,
                    reason: req.reason,
                    created_by: req.created_by,
                },
            )
            .await?;

        obs::emit_revision_created(
            &revision.revision_id.to_string(),
            &artifact.artifact_id.to_string(),
            revision.sequence_number,
        );
        Ok((artifact, revision))
    }

    /// Append a new revision to an existing artifact.
    ///
    /// Unlike the initial revision, a change reason is mandatory here.
    /// The sequence number is allocated atomically by the store.
    pub async fn create_revision(
        &self,
        artifact_id: &Uuid,
        title: String,
        content: String,
        reason: String,
        created_by: String,
    ) -> Result<Revision> {
        if title.trim().is_empty() {
            return Err(CoreError::validation("title", "must not be empty"));
        }
        if reason.trim().is_empty() {
            return Err(CoreError::validation(
                "reason",
                "a change reason is required for new revisions",
            ));
        }

        let revision = self
            .revisions
            .append_revision(
                artifact_id,
                NewRevision {
                    title,
                    content,
                    reason: Some(reason),
                    created_by,
                },
            )
            .await?;

        obs::emit_revision_created(
            &revision.revision_id.to_string(),
            &artifact_id.to_string(),
            revision.sequence_number,
        );
        Ok(revision)
    }

    /// Move a revision to a new status, validated against the transition
    /// table.
    pub async fn transition_status(
        &self,
        revision_id: &Uuid,
        new_status: RevisionStatus,
        actor: &str,
    ) -> Result<Revision> {
        if actor.trim().is_empty() {
            return Err(CoreError::validation("actor", "must not be empty"));
        }
        let current = self.revisions.get_revision(revision_id).await?;

        if !transition_allowed(current.status, new_status) {
            return Err(CoreError::InvalidTransition {
                revision_id: revision_id.to_string(),
                from: current.status,
                attempted: new_status,
            });
        }

        let updated = self
            .revisions
            .update_revision_status(revision_id, current.status, new_status)
            .await
            .map_err(|e| match e {
                // A concurrent writer changed the status between our read
                // and the CAS; report it as a transition failure.
                casegate_state::StorageError::StaleStatus { .. } => CoreError::InvalidTransition {
                    revision_id: revision_id.to_string(),
                    from: current.status,
                    attempted: new_status,
                },
                other => other.into(),
            })?;

        obs::emit_revision_transitioned(
            &revision_id.to_string(),
            current.status.as_str(),
            new_status.as_str(),
            actor,
        );
        Ok(updated)
    }

    /// Submit a DRAFT revision for review.
    pub async fn submit_for_review(
        &self,
        revision_id: &Uuid,
        submitted_by: &str,
    ) -> Result<Revision> {
        self.transition_status(revision_id, RevisionStatus::InReview, submitted_by)
            .await
    }

    /// Re-open a DEPRECATED revision back to DRAFT.
    pub async fn reopen(&self, revision_id: &Uuid, actor: &str) -> Result<Revision> {
        self.transition_status(revision_id, RevisionStatus::Draft, actor)
            .await
    }

    /// Fetch a single revision.
    pub async fn get_revision(&self, revision_id: &Uuid) -> Result<Revision> {
        Ok(self.revisions.get_revision(revision_id).await?)
    }

    /// Fetch an artifact.
    pub async fn get_artifact(&self, artifact_id: &Uuid) -> Result<Artifact> {
        Ok(self.revisions.get_artifact(artifact_id).await?)
    }

    /// Full revision history of an artifact, ascending sequence order.
    pub async fn history(&self, artifact_id: &Uuid) -> Result<Vec<Revision>> {
        // Surface a 404 for unknown artifacts instead of an empty list.
        self.revisions.get_artifact(artifact_id).await?;
        Ok(self.revisions.revisions_for(artifact_id).await?)
    }

    /// Finish a review by moving IN_REVIEW to a terminal review outcome.
    ///
    /// Tolerates losing the race to another reviewer reaching the same
    /// outcome; any other concurrent move is an `InvalidTransition`.
    pub(crate) async fn complete_review(
        &self,
        revision_id: &Uuid,
        outcome: RevisionStatus,
        actor: &str,
    ) -> Result<Revision> {
        match self
            .revisions
            .update_revision_status(revision_id, RevisionStatus::InReview, outcome)
            .await
        {
            Ok(revision) => {
                obs::emit_revision_transitioned(
                    &revision_id.to_string(),
                    RevisionStatus::InReview.as_str(),
                    outcome.as_str(),
                    actor,
                );
                Ok(revision)
            }
            Err(casegate_state::StorageError::StaleStatus { .. }) => {
                let current = self.revisions.get_revision(revision_id).await?;
                if current.status == outcome {
                    Ok(current)
                } else {
                    Err(CoreError::InvalidTransition {
                        revision_id: revision_id.to_string(),
                        from: current.status,
                        attempted: outcome,
                    })
                }
            }
            Err(other) => Err(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casegate_state::fakes::MemoryRevisionStore;

    fn lifecycle() -> RevisionLifecycle {
        RevisionLifecycle::new(Arc::new(MemoryRevisionStore::new()))
    }

    fn create_req() -> CreateArtifact {
        CreateArtifact {
            project_id: "proj-1".to_string(),
            kind: ArtifactKind::TestCase,
            title: "Login works".to_string(),
            content: "1. open page\n2. sign in".to_string(),
            reason: None,
            created_by: "alice".to_string(),
        }
    }

    #[test]
    fn test_transition_table_closure() {
        use RevisionStatus::*;
        let all = [Draft, InReview, Approved, Deprecated];
        let allowed: Vec<(RevisionStatus, RevisionStatus)> = all
            .iter()
            .flat_map(|&f| all.iter().map(move |&t| (f, t)))
            .filter(|&(f, t)| transition_allowed(f, t))
            .collect();
        assert_eq!(
            allowed,
            vec![
                (Draft, InReview),
                (InReview, Approved),
                (InReview, Deprecated),
                (Deprecated, Draft),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_artifact_initial_revision() {
        let svc = lifecycle();
        let (artifact, revision) = svc.create_artifact(create_req()).await.unwrap();
        assert_eq!(revision.artifact_id, artifact.artifact_id);
        assert_eq!(revision.sequence_number, 1);
        assert_eq!(revision.status, RevisionStatus::Draft);
        assert_eq!(revision.reason, None);
    }

    #[tokio::test]
    async fn test_create_revision_requires_reason() {
        let svc = lifecycle();
        let (artifact, _) = svc.create_artifact(create_req()).await.unwrap();

        let err = svc
            .create_revision(
                &artifact.artifact_id,
                "Login works".to_string(),
                "updated steps".to_string(),
                "  ".to_string(),
                "alice".to_string(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "reason", .. }));
    }

    #[tokio::test]
    async fn test_approved_revision_cannot_return_to_review() {
        let svc = lifecycle();
        let (_, revision) = svc.create_artifact(create_req()).await.unwrap();
        svc.submit_for_review(&revision.revision_id, "alice")
            .await
            .unwrap();
        svc.transition_status(&revision.revision_id, RevisionStatus::Approved, "bob")
            .await
            .unwrap();

        let err = svc
            .submit_for_review(&revision.revision_id, "alice")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: RevisionStatus::Approved,
                attempted: RevisionStatus::InReview,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_reopen_only_from_deprecated() {
        let svc = lifecycle();
        let (_, revision) = svc.create_artifact(create_req()).await.unwrap();

        let err = svc.reopen(&revision.revision_id, "alice").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));

        svc.submit_for_review(&revision.revision_id, "alice")
            .await
            .unwrap();
        svc.transition_status(&revision.revision_id, RevisionStatus::Deprecated, "bob")
            .await
            .unwrap();
        let reopened = svc.reopen(&revision.revision_id, "alice").await.unwrap();
        assert_eq!(reopened.status, RevisionStatus::Draft);
        assert_eq!(reopened.content, revision.content);
    }

    #[tokio::test]
    async fn test_submit_requires_an_actor() {
        let svc = lifecycle();
        let (_, revision) = svc.create_artifact(create_req()).await.unwrap();
        let err = svc
            .submit_for_review(&revision.revision_id, " ")
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "actor", .. }));
    }

    #[tokio::test]
    async fn test_history_for_unknown_artifact_is_not_found() {
        let svc = lifecycle();
        let err = svc.history(&Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "artifact", .. }));
    }
}
