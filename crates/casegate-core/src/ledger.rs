//! Approval ledger - the append-only record of review decisions.
//!
//! Every decision is one immutable row keyed by
//! `(object_type, object_id, step, approver_id)`; recording a second verdict
//! under the same key fails with `AlreadyDecided` instead of overwriting.
//! Changing one's mind happens at a different step or a new revision, on the
//! record.
//!
//! Step satisfaction is reject-wins: a single rejection on a step blocks it
//! no matter how many approvals accumulate.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::error::{CoreError, Result};
use crate::domain::{ApprovalDecision, DecisionKind, ObjectType, RevisionStatus};
use crate::lifecycle::RevisionLifecycle;
use crate::obs;
use crate::policy::ApprovalPolicy;
use casegate_state::DecisionStore;

/// Request to record one decision.
#[derive(Debug, Clone)]
pub struct RecordDecision {
    pub object_type: ObjectType,
    pub object_id: String,
    pub step: u32,
    pub approver_id: String,
    pub decision: DecisionKind,
    pub comment: Option<String>,
    pub evidence_links: Vec<String>,
}

/// Service owning decision recording and step-satisfaction queries.
pub struct ApprovalLedger {
    decisions: Arc<dyn DecisionStore>,
    lifecycle: Arc<RevisionLifecycle>,
    policy: ApprovalPolicy,
}

impl ApprovalLedger {
    pub fn new(
        decisions: Arc<dyn DecisionStore>,
        lifecycle: Arc<RevisionLifecycle>,
        policy: ApprovalPolicy,
    ) -> Self {
        Self {
            decisions,
            lifecycle,
            policy,
        }
    }

    pub fn policy(&self) -> &ApprovalPolicy {
        &self.policy
    }

    /// Record a decision and apply its lifecycle side effect.
    ///
    /// Validation happens before anything is persisted:
    /// - the step must exist in the policy for the object type,
    /// - a rejection must carry a non-empty comment,
    /// - revision-typed objects must currently be IN_REVIEW.
    ///
    /// For CASE_REVISION/SCENARIO_REVISION objects the ledger drives the
    /// lifecycle: a rejection deprecates the revision immediately; an
    /// approval promotes it once every policy step is satisfied. RELEASE and
    /// WAIVER decisions are record-only.
    ///
    /// The decision insert and the status move are two writes, not one
    /// transaction. Once the insert lands the decision is durable and shows
    /// up in [`history`](Self::history) even if the status move then fails:
    /// losing the status race to the same outcome counts as success, while
    /// losing it to a different outcome returns `InvalidTransition` with the
    /// decision already on record. Callers seeing that error should re-read
    /// the revision rather than retry the decision.
    pub async fn record_decision(&self, req: RecordDecision) -> Result<ApprovalDecision> {
        if req.approver_id.trim().is_empty() {
            return Err(CoreError::validation("approver_id", "must not be empty"));
        }
        if self
            .policy
            .required_approvals(req.object_type, req.step)
            .is_none()
        {
            return Err(CoreError::validation(
                "step",
                format!(
                    "step {} does not exist for {} (policy has {} steps)",
                    req.step,
                    req.object_type,
                    self.policy.step_count(req.object_type)
                ),
            ));
        }
        if req.decision == DecisionKind::Rejected
            && req.comment.as_deref().map_or(true, |c| c.trim().is_empty())
        {
            return Err(CoreError::validation(
                "comment",
                "a rejection must explain itself",
            ));
        }

        let revision_id = if req.object_type.is_revision() {
            let id = Uuid::parse_str(&req.object_id).map_err(|_| {
                CoreError::validation("object_id", "must be a revision UUID")
            })?;
            let revision = self.lifecycle.get_revision(&id).await?;
            if revision.status != RevisionStatus::InReview {
                // Decisions are only accepted against revisions under review.
                return Err(CoreError::InvalidTransition {
                    revision_id: req.object_id.clone(),
                    from: revision.status,
                    attempted: match req.decision {
                        DecisionKind::Approved => RevisionStatus::Approved,
                        DecisionKind::Rejected => RevisionStatus::Deprecated,
                    },
                });
            }
            Some(id)
        } else {
            None
        };

        let decision = self
            .decisions
            .insert_decision(ApprovalDecision {
                decision_id: Uuid::new_v4(),
                object_type: req.object_type,
                object_id: req.object_id.clone(),
                step: req.step,
                approver_id: req.approver_id,
                decision: req.decision,
                comment: req.comment,
                evidence_links: req.evidence_links,
                decided_at: Utc::now(),
            })
            .await?;

        obs::emit_decision_recorded(
            decision.object_type.as_str(),
            &decision.object_id,
            decision.step,
            &decision.approver_id,
            decision.decision.as_str(),
        );

        if let Some(revision_id) = revision_id {
            match decision.decision {
                DecisionKind::Rejected => {
                    self.lifecycle
                        .complete_review(
                            &revision_id,
                            RevisionStatus::Deprecated,
                            &decision.approver_id,
                        )
                        .await?;
                }
                DecisionKind::Approved => {
                    if self
                        .all_steps_satisfied(decision.object_type, &decision.object_id)
                        .await?
                    {
                        self.lifecycle
                            .complete_review(
                                &revision_id,
                                RevisionStatus::Approved,
                                &decision.approver_id,
                            )
                            .await?;
                    }
                }
            }
        }

        Ok(decision)
    }

    /// Whether one step is satisfied: no rejection recorded, and at least
    /// `required_approvals` approvals.
    pub async fn is_step_satisfied(
        &self,
        object_type: ObjectType,
        object_id: &str,
        step: u32,
        required_approvals: u32,
    ) -> Result<bool> {
        let decisions = self
            .decisions
            .decisions_for_step(object_type, object_id, step)
            .await?;

        if decisions
            .iter()
            .any(|d| d.decision == DecisionKind::Rejected)
        {
            return Ok(false);
        }

        let approvals = decisions
            .iter()
            .filter(|d| d.decision == DecisionKind::Approved)
            .count() as u32;
        Ok(approvals >= required_approvals)
    }

    /// Whether every policy step for the object is satisfied.
    pub async fn all_steps_satisfied(
        &self,
        object_type: ObjectType,
        object_id: &str,
    ) -> Result<bool> {
        for step in 1..=self.policy.step_count(object_type) {
            let required = self
                .policy
                .required_approvals(object_type, step)
                .unwrap_or(1);
            if !self
                .is_step_satisfied(object_type, object_id, step, required)
                .await?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Full decision history for an object, newest first.
    pub async fn history(
        &self,
        object_type: ObjectType,
        object_id: &str,
    ) -> Result<Vec<ApprovalDecision>> {
        Ok(self.decisions.decisions_for(object_type, object_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::domain::ArtifactKind;
    use crate::lifecycle::CreateArtifact;
    use casegate_state::fakes::{MemoryDecisionStore, MemoryRevisionStore};
    use casegate_state::{
        Artifact, NewRevision, Revision, RevisionStore, StorageResult,
    };

    fn ledger_with_policy(policy: ApprovalPolicy) -> (ApprovalLedger, Arc<RevisionLifecycle>) {
        let lifecycle = Arc::new(RevisionLifecycle::new(Arc::new(MemoryRevisionStore::new())));
        let ledger = ApprovalLedger::new(
            Arc::new(MemoryDecisionStore::new()),
            Arc::clone(&lifecycle),
            policy,
        );
        (ledger, lifecycle)
    }

    async fn revision_in_review(lifecycle: &RevisionLifecycle) -> Uuid {
        let (_, revision) = lifecycle
            .create_artifact(CreateArtifact {
                project_id: "proj-1".to_string(),
                kind: ArtifactKind::TestCase,
                title: "Checkout".to_string(),
                content: "steps".to_string(),
                reason: None,
                created_by: "alice".to_string(),
            })
            .await
            .unwrap();
        lifecycle
            .submit_for_review(&revision.revision_id, "alice")
            .await
            .unwrap();
        revision.revision_id
    }

    fn approve(object_id: &str, approver: &str) -> RecordDecision {
        RecordDecision {
            object_type: ObjectType::CaseRevision,
            object_id: object_id.to_string(),
            step: 1,
            approver_id: approver.to_string(),
            decision: DecisionKind::Approved,
            comment: None,
            evidence_links: vec![],
        }
    }

    #[tokio::test]
    async fn test_rejection_requires_comment() {
        let (ledger, lifecycle) = ledger_with_policy(ApprovalPolicy::standard());
        let revision_id = revision_in_review(&lifecycle).await;

        let err = ledger
            .record_decision(RecordDecision {
                decision: DecisionKind::Rejected,
                comment: None,
                ..approve(&revision_id.to_string(), "bob")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "comment", .. }));

        // Nothing persisted, revision still under review.
        let history = ledger
            .history(ObjectType::CaseRevision, &revision_id.to_string())
            .await
            .unwrap();
        assert!(history.is_empty());
        let revision = lifecycle.get_revision(&revision_id).await.unwrap();
        assert_eq!(revision.status, RevisionStatus::InReview);
    }

    #[tokio::test]
    async fn test_approval_promotes_revision() {
        let (ledger, lifecycle) = ledger_with_policy(ApprovalPolicy::standard());
        let revision_id = revision_in_review(&lifecycle).await;

        ledger
            .record_decision(approve(&revision_id.to_string(), "bob"))
            .await
            .unwrap();

        let revision = lifecycle.get_revision(&revision_id).await.unwrap();
        assert_eq!(revision.status, RevisionStatus::Approved);
    }

    #[tokio::test]
    async fn test_rejection_deprecates_revision() {
        let (ledger, lifecycle) = ledger_with_policy(ApprovalPolicy::standard());
        let revision_id = revision_in_review(&lifecycle).await;

        ledger
            .record_decision(RecordDecision {
                decision: DecisionKind::Rejected,
                comment: Some("missing negative cases".to_string()),
                ..approve(&revision_id.to_string(), "bob")
            })
            .await
            .unwrap();

        let revision = lifecycle.get_revision(&revision_id).await.unwrap();
        assert_eq!(revision.status, RevisionStatus::Deprecated);
    }

    #[tokio::test]
    async fn test_second_decision_same_key_is_already_decided() {
        let (ledger, lifecycle) = ledger_with_policy(
            // Two approvals needed so the revision stays IN_REVIEW after one.
            ApprovalPolicy::standard()
                .with_rule(crate::policy::PolicyRule::new(ObjectType::CaseRevision, vec![2])),
        );
        let revision_id = revision_in_review(&lifecycle).await;

        ledger
            .record_decision(approve(&revision_id.to_string(), "bob"))
            .await
            .unwrap();
        let err = ledger
            .record_decision(approve(&revision_id.to_string(), "bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AlreadyDecided { .. }));
    }

    #[tokio::test]
    async fn test_decision_against_draft_revision_rejected() {
        let (ledger, lifecycle) = ledger_with_policy(ApprovalPolicy::standard());
        let (_, revision) = lifecycle
            .create_artifact(CreateArtifact {
                project_id: "proj-1".to_string(),
                kind: ArtifactKind::TestCase,
                title: "Checkout".to_string(),
                content: "steps".to_string(),
                reason: None,
                created_by: "alice".to_string(),
            })
            .await
            .unwrap();

        let err = ledger
            .record_decision(approve(&revision.revision_id.to_string(), "bob"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: RevisionStatus::Draft,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_reject_wins_over_any_approvals() {
        let (ledger, lifecycle) = ledger_with_policy(
            ApprovalPolicy::standard()
                .with_rule(crate::policy::PolicyRule::new(ObjectType::CaseRevision, vec![3])),
        );
        let revision_id = revision_in_review(&lifecycle).await;
        let id = revision_id.to_string();

        ledger.record_decision(approve(&id, "bob")).await.unwrap();
        ledger.record_decision(approve(&id, "carol")).await.unwrap();
        ledger
            .record_decision(RecordDecision {
                decision: DecisionKind::Rejected,
                comment: Some("step 3 is wrong".to_string()),
                ..approve(&id, "dave")
            })
            .await
            .unwrap();

        let satisfied = ledger
            .is_step_satisfied(ObjectType::CaseRevision, &id, 1, 3)
            .await
            .unwrap();
        assert!(!satisfied);
    }

    #[tokio::test]
    async fn test_release_decisions_are_record_only() {
        let (ledger, _) = ledger_with_policy(ApprovalPolicy::standard());
        let release_id = Uuid::new_v4().to_string();

        ledger
            .record_decision(RecordDecision {
                object_type: ObjectType::Release,
                object_id: release_id.clone(),
                step: 1,
                approver_id: "qa-lead".to_string(),
                decision: DecisionKind::Approved,
                comment: None,
                evidence_links: vec!["https://ci.example/run/42".to_string()],
            })
            .await
            .unwrap();

        let history = ledger
            .history(ObjectType::Release, &release_id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].evidence_links.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_step_is_validation_error() {
        let (ledger, lifecycle) = ledger_with_policy(ApprovalPolicy::standard());
        let revision_id = revision_in_review(&lifecycle).await;

        let err = ledger
            .record_decision(RecordDecision {
                step: 7,
                ..approve(&revision_id.to_string(), "bob")
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "step", .. }));
    }

    /// Store double that slips a competing rejection in just before the
    /// first IN_REVIEW status CAS, after the decision row has landed.
    struct RacingRevisionStore {
        inner: MemoryRevisionStore,
        raced: AtomicBool,
    }

    #[async_trait::async_trait]
    impl RevisionStore for RacingRevisionStore {
        async fn insert_artifact(&self, artifact: Artifact) -> StorageResult<Artifact> {
            self.inner.insert_artifact(artifact).await
        }

        async fn get_artifact(&self, artifact_id: &Uuid) -> StorageResult<Artifact> {
            self.inner.get_artifact(artifact_id).await
        }

        async fn append_revision(
            &self,
            artifact_id: &Uuid,
            new: NewRevision,
        ) -> StorageResult<Revision> {
            self.inner.append_revision(artifact_id, new).await
        }

        async fn get_revision(&self, revision_id: &Uuid) -> StorageResult<Revision> {
            self.inner.get_revision(revision_id).await
        }

        async fn revisions_for(&self, artifact_id: &Uuid) -> StorageResult<Vec<Revision>> {
            self.inner.revisions_for(artifact_id).await
        }

        async fn update_revision_status(
            &self,
            revision_id: &Uuid,
            from: RevisionStatus,
            to: RevisionStatus,
        ) -> StorageResult<Revision> {
            if from == RevisionStatus::InReview && !self.raced.swap(true, Ordering::SeqCst) {
                self.inner
                    .update_revision_status(
                        revision_id,
                        RevisionStatus::InReview,
                        RevisionStatus::Deprecated,
                    )
                    .await?;
            }
            self.inner.update_revision_status(revision_id, from, to).await
        }
    }

    // The insert and the status move are separate writes: an approval that
    // loses the status race to a rejection surfaces an error, but the
    // decision itself stays on the record.
    #[tokio::test]
    async fn test_losing_the_status_race_keeps_the_decision_on_record() {
        let store = Arc::new(RacingRevisionStore {
            inner: MemoryRevisionStore::new(),
            raced: AtomicBool::new(false),
        });
        let lifecycle = Arc::new(RevisionLifecycle::new(store));
        let ledger = ApprovalLedger::new(
            Arc::new(MemoryDecisionStore::new()),
            Arc::clone(&lifecycle),
            ApprovalPolicy::standard(),
        );
        let revision_id = revision_in_review(&lifecycle).await;

        let err = ledger
            .record_decision(approve(&revision_id.to_string(), "bob"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: RevisionStatus::Deprecated,
                attempted: RevisionStatus::Approved,
                ..
            }
        ));

        // Durable despite the error; a caller re-reads instead of retrying.
        let history = ledger
            .history(ObjectType::CaseRevision, &revision_id.to_string())
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].decision, DecisionKind::Approved);

        let revision = lifecycle.get_revision(&revision_id).await.unwrap();
        assert_eq!(revision.status, RevisionStatus::Deprecated);
    }
}
