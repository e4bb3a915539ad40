//! SurrealDB-backed implementations of the storage traits
//!
//! Thin wrappers that delegate to `SurrealHandle`; all query logic lives in
//! the handle so the trait impls stay declarative.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::handle::SurrealHandle;
use crate::storage_traits::{
    ApprovalDecision, Artifact, BaselineItem, DecisionStore, NewRevision, ObjectType, Release,
    ReleaseStatus, ReleaseStore, Revision, RevisionStatus, RevisionStore, StorageResult, Waiver,
    WaiverStore,
};

/// SurrealDB-backed artifact/revision store.
#[derive(Clone)]
pub struct SurrealRevisionStore {
    handle: Arc<SurrealHandle>,
}

impl SurrealRevisionStore {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl RevisionStore for SurrealRevisionStore {
    async fn insert_artifact(&self, artifact: Artifact) -> StorageResult<Artifact> {
        self.handle.artifact_insert(&artifact).await
    }

    async fn get_artifact(&self, artifact_id: &Uuid) -> StorageResult<Artifact> {
        self.handle.artifact_get(artifact_id).await
    }

    async fn append_revision(
        &self,
        artifact_id: &Uuid,
        new: NewRevision,
    ) -> StorageResult<Revision> {
        self.handle.revision_append(artifact_id, new).await
    }

    async fn get_revision(&self, revision_id: &Uuid) -> StorageResult<Revision> {
        self.handle.revision_get(revision_id).await
    }

    async fn revisions_for(&self, artifact_id: &Uuid) -> StorageResult<Vec<Revision>> {
        self.handle.revisions_for(artifact_id).await
    }

    async fn update_revision_status(
        &self,
        revision_id: &Uuid,
        from: RevisionStatus,
        to: RevisionStatus,
    ) -> StorageResult<Revision> {
        self.handle
            .revision_update_status(revision_id, from, to)
            .await
    }
}

/// SurrealDB-backed decision ledger.
#[derive(Clone)]
pub struct SurrealDecisionStore {
    handle: Arc<SurrealHandle>,
}

impl SurrealDecisionStore {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl DecisionStore for SurrealDecisionStore {
    async fn insert_decision(
        &self,
        decision: ApprovalDecision,
    ) -> StorageResult<ApprovalDecision> {
        self.handle.decision_insert(&decision).await
    }

    async fn decisions_for(
        &self,
        object_type: ObjectType,
        object_id: &str,
    ) -> StorageResult<Vec<ApprovalDecision>> {
        self.handle.decisions_for(object_type, object_id).await
    }

    async fn decisions_for_step(
        &self,
        object_type: ObjectType,
        object_id: &str,
        step: u32,
    ) -> StorageResult<Vec<ApprovalDecision>> {
        self.handle
            .decisions_for_step(object_type, object_id, step)
            .await
    }
}

/// SurrealDB-backed release store.
#[derive(Clone)]
pub struct SurrealReleaseStore {
    handle: Arc<SurrealHandle>,
}

impl SurrealReleaseStore {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl ReleaseStore for SurrealReleaseStore {
    async fn insert_release(&self, release: Release) -> StorageResult<Release> {
        self.handle.release_insert(&release).await
    }

    async fn get_release(&self, release_id: &Uuid) -> StorageResult<Release> {
        self.handle.release_get(release_id).await
    }

    async fn update_release_status(
        &self,
        release_id: &Uuid,
        status: ReleaseStatus,
    ) -> StorageResult<Release> {
        self.handle.release_update_status(release_id, status).await
    }

    async fn add_baseline_items(
        &self,
        release_id: &Uuid,
        items: Vec<BaselineItem>,
    ) -> StorageResult<()> {
        self.handle.baseline_add(release_id, items).await
    }

    async fn baseline_for(&self, release_id: &Uuid) -> StorageResult<Vec<BaselineItem>> {
        self.handle.baseline_for(release_id).await
    }
}

/// SurrealDB-backed waiver store.
#[derive(Clone)]
pub struct SurrealWaiverStore {
    handle: Arc<SurrealHandle>,
}

impl SurrealWaiverStore {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl WaiverStore for SurrealWaiverStore {
    async fn insert_waiver(&self, waiver: Waiver) -> StorageResult<Waiver> {
        self.handle.waiver_insert(&waiver).await
    }

    async fn waivers_for_release(&self, release_id: &Uuid) -> StorageResult<Vec<Waiver>> {
        self.handle.waivers_for_release(release_id).await
    }
}
