//! Waiver registry - time-bounded, audited gate exemptions.
//!
//! Waivers are append-only. Revocation is modeled as letting a waiver expire
//! or issuing a superseding one; nothing is ever deleted, so the audit trail
//! stays complete.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::error::{CoreError, Result};
use crate::domain::{ObjectType, Waiver};
use crate::obs;
use casegate_state::{ReleaseStore, WaiverStore};

/// Request to issue one waiver.
#[derive(Debug, Clone)]
pub struct IssueWaiver {
    pub release_id: Uuid,
    pub target_type: ObjectType,
    pub target_id: String,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
    pub issuer_id: String,
}

/// Service owning waiver issuance and lookup.
pub struct WaiverRegistry {
    releases: Arc<dyn ReleaseStore>,
    waivers: Arc<dyn WaiverStore>,
}

impl WaiverRegistry {
    pub fn new(releases: Arc<dyn ReleaseStore>, waivers: Arc<dyn WaiverStore>) -> Self {
        Self { releases, waivers }
    }

    /// Issue a waiver, judging `expires_at` against the current instant.
    pub async fn issue(&self, req: IssueWaiver) -> Result<Waiver> {
        self.issue_at(req, Utc::now()).await
    }

    /// Issue a waiver with an explicit notion of "now".
    pub async fn issue_at(&self, req: IssueWaiver, now: DateTime<Utc>) -> Result<Waiver> {
        if req.reason.trim().is_empty() {
            return Err(CoreError::validation("reason", "must not be empty"));
        }
        if req.expires_at <= now {
            return Err(CoreError::validation(
                "expires_at",
                "must lie in the future",
            ));
        }
        if req.issuer_id.trim().is_empty() {
            return Err(CoreError::validation("issuer_id", "must not be empty"));
        }

        self.releases.get_release(&req.release_id).await?;

        let waiver = self
            .waivers
            .insert_waiver(Waiver {
                waiver_id: Uuid::new_v4(),
                release_id: req.release_id,
                target_type: req.target_type,
                target_id: req.target_id,
                reason: req.reason,
                expires_at: req.expires_at,
                issuer_id: req.issuer_id,
                created_at: now,
            })
            .await?;

        obs::emit_waiver_issued(
            &waiver.waiver_id.to_string(),
            &waiver.release_id.to_string(),
            &waiver.target_id,
        );
        Ok(waiver)
    }

    /// Waivers still active at `now`.
    pub async fn active_for(&self, release_id: &Uuid, now: DateTime<Utc>) -> Result<Vec<Waiver>> {
        let all = self.waivers.waivers_for_release(release_id).await?;
        Ok(all.into_iter().filter(|w| w.is_active_at(now)).collect())
    }

    /// Every waiver ever issued for the release, newest first.
    pub async fn history(&self, release_id: &Uuid) -> Result<Vec<Waiver>> {
        Ok(self.waivers.waivers_for_release(release_id).await?)
    }
}
