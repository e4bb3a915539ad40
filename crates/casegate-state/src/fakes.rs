//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryRevisionStore`, `MemoryDecisionStore`, `MemoryReleaseStore`,
//! and `MemoryWaiverStore` that satisfy the trait contracts without any
//! external dependencies. Each fake serializes its atomic operations through
//! a single mutex scope, so the sequence-allocation and duplicate-decision
//! guarantees hold under concurrent callers.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryRevisionStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RevisionState {
    artifacts: HashMap<Uuid, Artifact>,
    revisions: HashMap<Uuid, Revision>,
}

/// In-memory artifact/revision store. Sequence numbers are allocated inside
/// one lock scope, which is the fake's serialization boundary.
#[derive(Debug, Default)]
pub struct MemoryRevisionStore {
    state: Mutex<RevisionState>,
}

impl MemoryRevisionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevisionStore for MemoryRevisionStore {
    async fn insert_artifact(&self, artifact: Artifact) -> StorageResult<Artifact> {
        let mut state = self.state.lock().unwrap();
        state.artifacts.insert(artifact.artifact_id, artifact.clone());
        Ok(artifact)
    }

    async fn get_artifact(&self, artifact_id: &Uuid) -> StorageResult<Artifact> {
        let state = self.state.lock().unwrap();
        state
            .artifacts
            .get(artifact_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                entity: "artifact",
                id: artifact_id.to_string(),
            })
    }

    async fn append_revision(
        &self,
        artifact_id: &Uuid,
        new: NewRevision,
    ) -> StorageResult<Revision> {
        let mut state = self.state.lock().unwrap();
        if !state.artifacts.contains_key(artifact_id) {
            return Err(StorageError::NotFound {
                entity: "artifact",
                id: artifact_id.to_string(),
            });
        }
        // Count-within-lock keeps sequence numbers gapless from 1.
        let next_seq = state
            .revisions
            .values()
            .filter(|r| r.artifact_id == *artifact_id)
            .count() as u32
            + 1;
        let revision = Revision {
            revision_id: Uuid::new_v4(),
            artifact_id: *artifact_id,
            sequence_number: next_seq,
            title: new.title,
            content: new.content,
            status: RevisionStatus::Draft,
            reason: new.reason,
            created_by: new.created_by,
            created_at: Utc::now(),
        };
        state.revisions.insert(revision.revision_id, revision.clone());
        Ok(revision)
    }

    async fn get_revision(&self, revision_id: &Uuid) -> StorageResult<Revision> {
        let state = self.state.lock().unwrap();
        state
            .revisions
            .get(revision_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                entity: "revision",
                id: revision_id.to_string(),
            })
    }

    async fn revisions_for(&self, artifact_id: &Uuid) -> StorageResult<Vec<Revision>> {
        let state = self.state.lock().unwrap();
        let mut revisions: Vec<Revision> = state
            .revisions
            .values()
            .filter(|r| r.artifact_id == *artifact_id)
            .cloned()
            .collect();
        revisions.sort_by_key(|r| r.sequence_number);
        Ok(revisions)
    }

    async fn update_revision_status(
        &self,
        revision_id: &Uuid,
        from: RevisionStatus,
        to: RevisionStatus,
    ) -> StorageResult<Revision> {
        let mut state = self.state.lock().unwrap();
        let revision = state
            .revisions
            .get_mut(revision_id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "revision",
                id: revision_id.to_string(),
            })?;
        if revision.status != from {
            return Err(StorageError::StaleStatus {
                revision_id: revision_id.to_string(),
                expected: from.to_string(),
            });
        }
        revision.status = to;
        Ok(revision.clone())
    }
}

// ---------------------------------------------------------------------------
// MemoryDecisionStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct DecisionState {
    decisions: Vec<ApprovalDecision>,
    // Occupied (object_type, object_id, step, approver_id) tuples.
    keys: HashSet<(ObjectType, String, u32, String)>,
}

/// In-memory decision ledger. Check-and-insert happens inside one lock
/// scope — the fake equivalent of a unique index.
#[derive(Debug, Default)]
pub struct MemoryDecisionStore {
    state: Mutex<DecisionState>,
}

impl MemoryDecisionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DecisionStore for MemoryDecisionStore {
    async fn insert_decision(
        &self,
        decision: ApprovalDecision,
    ) -> StorageResult<ApprovalDecision> {
        let mut state = self.state.lock().unwrap();
        let key = (
            decision.object_type,
            decision.object_id.clone(),
            decision.step,
            decision.approver_id.clone(),
        );
        if !state.keys.insert(key) {
            return Err(StorageError::DuplicateDecision {
                object_type: decision.object_type.to_string(),
                object_id: decision.object_id,
                step: decision.step,
                approver_id: decision.approver_id,
            });
        }
        state.decisions.push(decision.clone());
        Ok(decision)
    }

    async fn decisions_for(
        &self,
        object_type: ObjectType,
        object_id: &str,
    ) -> StorageResult<Vec<ApprovalDecision>> {
        let state = self.state.lock().unwrap();
        let mut decisions: Vec<ApprovalDecision> = state
            .decisions
            .iter()
            .filter(|d| d.object_type == object_type && d.object_id == object_id)
            .cloned()
            .collect();
        decisions.reverse(); // insertion order -> newest first
        Ok(decisions)
    }

    async fn decisions_for_step(
        &self,
        object_type: ObjectType,
        object_id: &str,
        step: u32,
    ) -> StorageResult<Vec<ApprovalDecision>> {
        let decisions = self.decisions_for(object_type, object_id).await?;
        Ok(decisions.into_iter().filter(|d| d.step == step).collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryReleaseStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ReleaseState {
    releases: HashMap<Uuid, Release>,
    baselines: HashMap<Uuid, Vec<BaselineItem>>,
}

/// In-memory release store.
#[derive(Debug, Default)]
pub struct MemoryReleaseStore {
    state: Mutex<ReleaseState>,
}

impl MemoryReleaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReleaseStore for MemoryReleaseStore {
    async fn insert_release(&self, release: Release) -> StorageResult<Release> {
        let mut state = self.state.lock().unwrap();
        state.releases.insert(release.release_id, release.clone());
        Ok(release)
    }

    async fn get_release(&self, release_id: &Uuid) -> StorageResult<Release> {
        let state = self.state.lock().unwrap();
        state
            .releases
            .get(release_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                entity: "release",
                id: release_id.to_string(),
            })
    }

    async fn update_release_status(
        &self,
        release_id: &Uuid,
        status: ReleaseStatus,
    ) -> StorageResult<Release> {
        let mut state = self.state.lock().unwrap();
        let release = state
            .releases
            .get_mut(release_id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "release",
                id: release_id.to_string(),
            })?;
        release.status = status;
        Ok(release.clone())
    }

    async fn add_baseline_items(
        &self,
        release_id: &Uuid,
        items: Vec<BaselineItem>,
    ) -> StorageResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.releases.contains_key(release_id) {
            return Err(StorageError::NotFound {
                entity: "release",
                id: release_id.to_string(),
            });
        }
        state.baselines.entry(*release_id).or_default().extend(items);
        Ok(())
    }

    async fn baseline_for(&self, release_id: &Uuid) -> StorageResult<Vec<BaselineItem>> {
        let state = self.state.lock().unwrap();
        if !state.releases.contains_key(release_id) {
            return Err(StorageError::NotFound {
                entity: "release",
                id: release_id.to_string(),
            });
        }
        Ok(state.baselines.get(release_id).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// MemoryWaiverStore
// ---------------------------------------------------------------------------

/// In-memory waiver store, append-only per release.
#[derive(Debug, Default)]
pub struct MemoryWaiverStore {
    waivers: Mutex<HashMap<Uuid, Vec<Waiver>>>,
}

impl MemoryWaiverStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WaiverStore for MemoryWaiverStore {
    async fn insert_waiver(&self, waiver: Waiver) -> StorageResult<Waiver> {
        let mut waivers = self.waivers.lock().unwrap();
        waivers
            .entry(waiver.release_id)
            .or_default()
            .push(waiver.clone());
        Ok(waiver)
    }

    async fn waivers_for_release(&self, release_id: &Uuid) -> StorageResult<Vec<Waiver>> {
        let waivers = self.waivers.lock().unwrap();
        let mut history = waivers.get(release_id).cloned().unwrap_or_default();
        history.reverse(); // newest first
        Ok(history)
    }
}
