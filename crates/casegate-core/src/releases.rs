//! Release management - creation, status moves, and baseline freezing.
//!
//! Thin validation layer over the release store. The baseline is the frozen
//! set of artifact-revisions a release is gated on; items can be added while
//! the release is being planned but never removed.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::error::{CoreError, Result};
use crate::domain::{BaselineItem, ObjectType, Release, ReleaseStatus};
use casegate_state::ReleaseStore;

/// Request to create a release.
#[derive(Debug, Clone)]
pub struct CreateRelease {
    pub project_id: String,
    pub name: String,
    pub build_ref: Option<String>,
}

/// One target to freeze into a release baseline.
#[derive(Debug, Clone)]
pub struct BaselineTarget {
    pub target_type: ObjectType,
    pub target_id: String,
}

/// Service owning release records and their baselines.
pub struct ReleaseManager {
    releases: Arc<dyn ReleaseStore>,
}

impl ReleaseManager {
    pub fn new(releases: Arc<dyn ReleaseStore>) -> Self {
        Self { releases }
    }

    /// Create a release in PLANNING.
    pub async fn create(&self, req: CreateRelease) -> Result<Release> {
        if req.name.trim().is_empty() {
            return Err(CoreError::validation("name", "must not be empty"));
        }

        Ok(self
            .releases
            .insert_release(Release {
                release_id: Uuid::new_v4(),
                project_id: req.project_id,
                name: req.name,
                status: ReleaseStatus::Planning,
                build_ref: req.build_ref,
                created_at: Utc::now(),
            })
            .await?)
    }

    /// Fetch a release.
    pub async fn get(&self, release_id: &Uuid) -> Result<Release> {
        Ok(self.releases.get_release(release_id).await?)
    }

    /// Move a release to a new status.
    pub async fn set_status(&self, release_id: &Uuid, status: ReleaseStatus) -> Result<Release> {
        Ok(self
            .releases
            .update_release_status(release_id, status)
            .await?)
    }

    /// Freeze targets into the release baseline.
    pub async fn freeze_baseline(
        &self,
        release_id: &Uuid,
        targets: Vec<BaselineTarget>,
    ) -> Result<Vec<BaselineItem>> {
        if targets.is_empty() {
            return Err(CoreError::validation("targets", "must not be empty"));
        }
        for target in &targets {
            if target.target_id.trim().is_empty() {
                return Err(CoreError::validation("targetId", "must not be empty"));
            }
        }

        let items: Vec<BaselineItem> = targets
            .into_iter()
            .map(|t| BaselineItem {
                release_id: *release_id,
                target_type: t.target_type,
                target_id: t.target_id,
            })
            .collect();
        self.releases
            .add_baseline_items(release_id, items.clone())
            .await?;
        Ok(items)
    }

    /// The frozen baseline, in freeze order.
    pub async fn baseline(&self, release_id: &Uuid) -> Result<Vec<BaselineItem>> {
        Ok(self.releases.baseline_for(release_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casegate_state::fakes::MemoryReleaseStore;

    fn manager() -> ReleaseManager {
        ReleaseManager::new(Arc::new(MemoryReleaseStore::new()))
    }

    fn create_req() -> CreateRelease {
        CreateRelease {
            project_id: "proj-1".to_string(),
            name: "2026.08".to_string(),
            build_ref: Some("build-77".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_starts_in_planning() {
        let svc = manager();
        let release = svc.create(create_req()).await.unwrap();
        assert_eq!(release.status, ReleaseStatus::Planning);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let svc = manager();
        let err = svc
            .create(CreateRelease {
                name: " ".to_string(),
                ..create_req()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "name", .. }));
    }

    #[tokio::test]
    async fn test_freeze_baseline_accumulates() {
        let svc = manager();
        let release = svc.create(create_req()).await.unwrap();

        svc.freeze_baseline(
            &release.release_id,
            vec![BaselineTarget {
                target_type: ObjectType::CaseRevision,
                target_id: Uuid::new_v4().to_string(),
            }],
        )
        .await
        .unwrap();
        svc.freeze_baseline(
            &release.release_id,
            vec![BaselineTarget {
                target_type: ObjectType::ScenarioRevision,
                target_id: Uuid::new_v4().to_string(),
            }],
        )
        .await
        .unwrap();

        let baseline = svc.baseline(&release.release_id).await.unwrap();
        assert_eq!(baseline.len(), 2);
    }

    #[tokio::test]
    async fn test_freeze_empty_targets_rejected() {
        let svc = manager();
        let release = svc.create(create_req()).await.unwrap();
        let err = svc
            .freeze_baseline(&release.release_id, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { field: "targets", .. }));
    }
}
