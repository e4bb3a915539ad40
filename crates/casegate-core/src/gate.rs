//! Release gate evaluation.
//!
//! The gate is a pure read-aggregation: nothing is persisted, and every call
//! recomputes from current ledger and baseline state. Waiver expiry is
//! checked against the evaluation instant, so a result can flip from pass to
//! fail between two calls purely because a waiver lapsed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::Result;
use crate::domain::{DecisionKind, ObjectType, RevisionStatus};
use crate::obs;
use crate::policy::ApprovalPolicy;
use casegate_state::{DecisionStore, ReleaseStore, RevisionStore, StorageError, WaiverStore};

/// Criterion name: every baseline item approved or actively waived.
pub const CRITERION_BASELINE_RESOLVED: &str = "baseline_resolved";
/// Criterion name: the release itself carries a satisfied approval step.
pub const CRITERION_RELEASE_APPROVED: &str = "release_approved";

/// One named pass/fail line in a gate evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCriterion {
    pub name: String,
    pub pass: bool,
    pub details: String,
}

/// A baseline item that counts as resolved only through a waiver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaivedItem {
    pub target_type: ObjectType,
    pub target_id: String,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
}

/// The outcome of one gate evaluation. Computed, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateEvaluationResult {
    pub release_id: Uuid,
    pub overall_pass: bool,
    pub criteria: Vec<GateCriterion>,
    pub waived_items: Vec<WaivedItem>,
    pub evaluated_at: DateTime<Utc>,
}

/// Read-only evaluator over the stores; holds no state of its own.
pub struct GateEvaluator {
    revisions: Arc<dyn RevisionStore>,
    decisions: Arc<dyn DecisionStore>,
    releases: Arc<dyn ReleaseStore>,
    waivers: Arc<dyn WaiverStore>,
    policy: ApprovalPolicy,
}

impl GateEvaluator {
    pub fn new(
        revisions: Arc<dyn RevisionStore>,
        decisions: Arc<dyn DecisionStore>,
        releases: Arc<dyn ReleaseStore>,
        waivers: Arc<dyn WaiverStore>,
        policy: ApprovalPolicy,
    ) -> Self {
        Self {
            revisions,
            decisions,
            releases,
            waivers,
            policy,
        }
    }

    /// Evaluate the gate for a release at the current instant.
    pub async fn evaluate(&self, release_id: &Uuid) -> Result<GateEvaluationResult> {
        self.evaluate_at(release_id, Utc::now()).await
    }

    /// Evaluate the gate at an explicit instant (waiver expiry is judged
    /// against `now`).
    pub async fn evaluate_at(
        &self,
        release_id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<GateEvaluationResult> {
        self.releases.get_release(release_id).await?;

        let baseline = self.releases.baseline_for(release_id).await?;
        let active_waivers: Vec<_> = self
            .waivers
            .waivers_for_release(release_id)
            .await?
            .into_iter()
            .filter(|w| w.is_active_at(now))
            .collect();

        let mut waived_items = Vec::new();
        let mut unresolved = Vec::new();
        for item in &baseline {
            if self.item_resolved(item.target_type, &item.target_id).await? {
                continue;
            }
            // waivers_for_release is newest first, so the most recent
            // matching waiver speaks for the item.
            let waiver = active_waivers
                .iter()
                .find(|w| w.target_type == item.target_type && w.target_id == item.target_id);
            match waiver {
                Some(w) => waived_items.push(WaivedItem {
                    target_type: item.target_type,
                    target_id: item.target_id.clone(),
                    reason: w.reason.clone(),
                    expires_at: w.expires_at,
                }),
                None => unresolved.push(item.target_id.clone()),
            }
        }

        let baseline_criterion = GateCriterion {
            name: CRITERION_BASELINE_RESOLVED.to_string(),
            pass: unresolved.is_empty(),
            details: if unresolved.is_empty() {
                format!(
                    "{} baseline items resolved ({} via waiver)",
                    baseline.len(),
                    waived_items.len()
                )
            } else {
                format!(
                    "{} of {} baseline items unresolved: {}",
                    unresolved.len(),
                    baseline.len(),
                    unresolved.join(", ")
                )
            },
        };

        let release_criterion = self.release_approval_criterion(release_id).await?;

        let criteria = vec![baseline_criterion, release_criterion];
        let overall_pass = criteria.iter().all(|c| c.pass);

        obs::emit_gate_evaluated(&release_id.to_string(), overall_pass, waived_items.len());

        Ok(GateEvaluationResult {
            release_id: *release_id,
            overall_pass,
            criteria,
            waived_items,
            evaluated_at: now,
        })
    }

    /// A revision-typed baseline item is resolved when its revision is
    /// APPROVED. Items pointing at a missing revision, or at a non-revision
    /// target, are unresolved (waivable, never an error).
    async fn item_resolved(&self, target_type: ObjectType, target_id: &str) -> Result<bool> {
        if !target_type.is_revision() {
            return Ok(false);
        }
        let Ok(revision_id) = Uuid::parse_str(target_id) else {
            return Ok(false);
        };
        match self.revisions.get_revision(&revision_id).await {
            Ok(revision) => Ok(revision.status == RevisionStatus::Approved),
            Err(StorageError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Reject-wins approval check on the release's final policy step.
    async fn release_approval_criterion(&self, release_id: &Uuid) -> Result<GateCriterion> {
        let step = self.policy.step_count(ObjectType::Release);
        let required = self
            .policy
            .required_approvals(ObjectType::Release, step)
            .unwrap_or(1);

        let decisions = self
            .decisions
            .decisions_for_step(ObjectType::Release, &release_id.to_string(), step)
            .await?;

        let rejected = decisions
            .iter()
            .any(|d| d.decision == DecisionKind::Rejected);
        let approvals = decisions
            .iter()
            .filter(|d| d.decision == DecisionKind::Approved)
            .count() as u32;

        let pass = !rejected && approvals >= required;
        let details = if rejected {
            format!("release rejected at step {step}")
        } else {
            format!("{approvals} of {required} required approvals at step {step}")
        };

        Ok(GateCriterion {
            name: CRITERION_RELEASE_APPROVED.to_string(),
            pass,
            details,
        })
    }
}
