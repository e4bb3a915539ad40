//! Storage trait definitions for Casegate
//!
//! These traits define the core storage abstractions:
//! - `RevisionStore`: append-only artifact/revision persistence
//! - `DecisionStore`: approval decision ledger persistence
//! - `ReleaseStore`: releases and their frozen baselines
//! - `WaiverStore`: time-bounded gate exemptions
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.
//!
//! Two operations carry the serialization boundaries the domain depends on
//! and MUST be atomic inside any backend:
//! - `RevisionStore::append_revision` — per-artifact sequence allocation
//!   (no duplicate or skipped sequence numbers under concurrent writers).
//! - `DecisionStore::insert_decision` — at most one decision per
//!   `(object_type, object_id, step, approver_id)` tuple.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Kind of test artifact that owns a revision history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactKind {
    TestCase,
    Scenario,
}

impl ArtifactKind {
    /// Wire/storage form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TestCase => "TEST_CASE",
            Self::Scenario => "SCENARIO",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stable test artifact identity. Immutable once created except for its
/// revision collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact_id: Uuid,
    pub project_id: String,
    pub kind: ArtifactKind,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of one revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionStatus {
    Draft,
    InReview,
    Approved,
    Deprecated,
}

impl RevisionStatus {
    /// Wire/storage form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::InReview => "IN_REVIEW",
            Self::Approved => "APPROVED",
            Self::Deprecated => "DEPRECATED",
        }
    }
}

impl std::fmt::Display for RevisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable, sequence-numbered snapshot of an artifact.
///
/// # Invariants
///
/// `sequence_number` is strictly increasing per artifact, gapless from 1,
/// assigned by the store at creation time and never reused. `title`,
/// `content`, and `reason` never change after creation; only `status` moves,
/// and only through the lifecycle transition table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub revision_id: Uuid,
    pub artifact_id: Uuid,
    pub sequence_number: u32,
    pub title: String,
    pub content: String,
    pub status: RevisionStatus,
    /// Why this revision exists. Required for every revision after the first.
    pub reason: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Input for appending a revision; the store assigns id, sequence number,
/// initial `Draft` status, and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRevision {
    pub title: String,
    pub content: String,
    pub reason: Option<String>,
    pub created_by: String,
}

/// What kind of object an approval decision targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    CaseRevision,
    ScenarioRevision,
    Release,
    Waiver,
}

impl ObjectType {
    /// Wire/storage form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CaseRevision => "CASE_REVISION",
            Self::ScenarioRevision => "SCENARIO_REVISION",
            Self::Release => "RELEASE",
            Self::Waiver => "WAIVER",
        }
    }

    /// Whether decisions on this object type drive the revision lifecycle.
    pub fn is_revision(self) -> bool {
        matches!(self, Self::CaseRevision | Self::ScenarioRevision)
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The verdict of a single decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionKind {
    Approved,
    Rejected,
}

impl DecisionKind {
    /// Wire/storage form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded approve/reject decision. Created once, never mutated or
/// deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub decision_id: Uuid,
    pub object_type: ObjectType,
    pub object_id: String,
    pub step: u32,
    pub approver_id: String,
    pub decision: DecisionKind,
    pub comment: Option<String>,
    pub evidence_links: Vec<String>,
    pub decided_at: DateTime<Utc>,
}

/// Release lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseStatus {
    Planning,
    Executing,
    GateCheck,
    ApprovedForRelease,
    Released,
}

impl ReleaseStatus {
    /// Wire/storage form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planning => "PLANNING",
            Self::Executing => "EXECUTING",
            Self::GateCheck => "GATE_CHECK",
            Self::ApprovedForRelease => "APPROVED_FOR_RELEASE",
            Self::Released => "RELEASED",
        }
    }
}

impl std::fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A release candidate being driven toward its gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub release_id: Uuid,
    pub project_id: String,
    pub name: String,
    pub status: ReleaseStatus,
    pub build_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One frozen artifact-revision in a release's gating scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineItem {
    pub release_id: Uuid,
    pub target_type: ObjectType,
    pub target_id: String,
}

/// A time-bounded, audited exemption from a gate criterion.
///
/// Valid only while `now < expires_at`. Expired waivers stay stored as part
/// of the audit trail; revocation is modeled as expiry or a superseding
/// waiver, never deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waiver {
    pub waiver_id: Uuid,
    pub release_id: Uuid,
    pub target_type: ObjectType,
    pub target_id: String,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
    pub issuer_id: String,
    pub created_at: DateTime<Utc>,
}

impl Waiver {
    /// Whether this waiver still counts at the given instant.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

// ---------------------------------------------------------------------------
// RevisionStore
// ---------------------------------------------------------------------------

/// Append-only artifact/revision storage.
///
/// Guarantees:
/// - Revisions are immutable once created; only `status` may change, via
///   the compare-and-swap `update_revision_status`.
/// - `append_revision` assigns the next sequence number atomically per
///   artifact (unique constraint or single lock scope, not read-then-write).
#[async_trait]
pub trait RevisionStore: Send + Sync {
    /// Persist a new artifact identity.
    async fn insert_artifact(&self, artifact: Artifact) -> StorageResult<Artifact>;

    /// Fetch an artifact. `StorageError::NotFound` if absent.
    async fn get_artifact(&self, artifact_id: &Uuid) -> StorageResult<Artifact>;

    /// Append a new revision with the next sequence number, status `Draft`.
    async fn append_revision(
        &self,
        artifact_id: &Uuid,
        new: NewRevision,
    ) -> StorageResult<Revision>;

    /// Fetch a revision. `StorageError::NotFound` if absent.
    async fn get_revision(&self, revision_id: &Uuid) -> StorageResult<Revision>;

    /// All revisions of an artifact, ordered by ascending sequence number.
    async fn revisions_for(&self, artifact_id: &Uuid) -> StorageResult<Vec<Revision>>;

    /// Compare-and-swap the status of a revision.
    ///
    /// Fails with `StorageError::StaleStatus` when the current status is not
    /// `from` — the caller re-reads and re-decides rather than overwriting.
    async fn update_revision_status(
        &self,
        revision_id: &Uuid,
        from: RevisionStatus,
        to: RevisionStatus,
    ) -> StorageResult<Revision>;
}

// ---------------------------------------------------------------------------
// DecisionStore
// ---------------------------------------------------------------------------

/// Approval decision ledger storage.
///
/// Guarantees:
/// - `insert_decision` atomically rejects a second decision for the same
///   `(object_type, object_id, step, approver_id)` tuple with
///   `StorageError::DuplicateDecision`.
/// - Decisions are never updated or deleted.
#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// Insert a decision, enforcing the at-most-one-decision constraint.
    async fn insert_decision(
        &self,
        decision: ApprovalDecision,
    ) -> StorageResult<ApprovalDecision>;

    /// All decisions for an object, newest first.
    async fn decisions_for(
        &self,
        object_type: ObjectType,
        object_id: &str,
    ) -> StorageResult<Vec<ApprovalDecision>>;

    /// All decisions for one step of an object, newest first.
    async fn decisions_for_step(
        &self,
        object_type: ObjectType,
        object_id: &str,
        step: u32,
    ) -> StorageResult<Vec<ApprovalDecision>>;
}

// ---------------------------------------------------------------------------
// ReleaseStore
// ---------------------------------------------------------------------------

/// Releases and their frozen baselines.
#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Persist a new release.
    async fn insert_release(&self, release: Release) -> StorageResult<Release>;

    /// Fetch a release. `StorageError::NotFound` if absent.
    async fn get_release(&self, release_id: &Uuid) -> StorageResult<Release>;

    /// Move a release to a new status.
    async fn update_release_status(
        &self,
        release_id: &Uuid,
        status: ReleaseStatus,
    ) -> StorageResult<Release>;

    /// Freeze additional items into a release's baseline.
    async fn add_baseline_items(
        &self,
        release_id: &Uuid,
        items: Vec<BaselineItem>,
    ) -> StorageResult<()>;

    /// The frozen baseline of a release (insertion order).
    async fn baseline_for(&self, release_id: &Uuid) -> StorageResult<Vec<BaselineItem>>;
}

// ---------------------------------------------------------------------------
// WaiverStore
// ---------------------------------------------------------------------------

/// Waiver persistence. Append-only; expiry is evaluated by readers, not by
/// the store.
#[async_trait]
pub trait WaiverStore: Send + Sync {
    /// Persist a new waiver.
    async fn insert_waiver(&self, waiver: Waiver) -> StorageResult<Waiver>;

    /// All waivers ever issued for a release, newest first. Includes
    /// expired waivers — filtering is the reader's job.
    async fn waivers_for_release(&self, release_id: &Uuid) -> StorageResult<Vec<Waiver>>;
}
