//! Trait contract tests for RevisionStore, DecisionStore, ReleaseStore,
//! and WaiverStore.
//!
//! These tests verify the behavioral contracts of the storage traits
//! using in-memory fakes, then re-check the load-bearing ones against
//! the SurrealDB backend. Any conforming implementation must pass these.

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use casegate_state::fakes::{
    MemoryDecisionStore, MemoryReleaseStore, MemoryRevisionStore, MemoryWaiverStore,
};
use casegate_state::storage_traits::*;
use casegate_state::{StorageError, SurrealDecisionStore, SurrealHandle, SurrealRevisionStore};

fn sample_artifact(kind: ArtifactKind) -> Artifact {
    Artifact {
        artifact_id: Uuid::new_v4(),
        project_id: "proj-1".to_string(),
        kind,
        created_by: "alice".to_string(),
        created_at: Utc::now(),
    }
}

fn sample_new_revision(title: &str) -> NewRevision {
    NewRevision {
        title: title.to_string(),
        content: "1. open login page\n2. enter credentials".to_string(),
        reason: None,
        created_by: "alice".to_string(),
    }
}

fn sample_decision(
    object_type: ObjectType,
    object_id: &str,
    step: u32,
    approver: &str,
    decision: DecisionKind,
) -> ApprovalDecision {
    ApprovalDecision {
        decision_id: Uuid::new_v4(),
        object_type,
        object_id: object_id.to_string(),
        step,
        approver_id: approver.to_string(),
        decision,
        comment: match decision {
            DecisionKind::Rejected => Some("missing edge case".to_string()),
            DecisionKind::Approved => None,
        },
        evidence_links: vec![],
        decided_at: Utc::now(),
    }
}

fn sample_release() -> Release {
    Release {
        release_id: Uuid::new_v4(),
        project_id: "proj-1".to_string(),
        name: "2026.08".to_string(),
        status: ReleaseStatus::Planning,
        build_ref: Some("build-421".to_string()),
        created_at: Utc::now(),
    }
}

// ===========================================================================
// RevisionStore contract tests
// ===========================================================================

#[tokio::test]
async fn revision_sequence_is_gapless_from_one() {
    let store = MemoryRevisionStore::new();
    let artifact = store
        .insert_artifact(sample_artifact(ArtifactKind::TestCase))
        .await
        .unwrap();

    for expected in 1u32..=4 {
        let rev = store
            .append_revision(&artifact.artifact_id, sample_new_revision("login"))
            .await
            .unwrap();
        assert_eq!(rev.sequence_number, expected);
        assert_eq!(rev.status, RevisionStatus::Draft);
    }
}

#[tokio::test]
async fn revision_sequences_are_independent_per_artifact() {
    let store = MemoryRevisionStore::new();
    let a = store
        .insert_artifact(sample_artifact(ArtifactKind::TestCase))
        .await
        .unwrap();
    let b = store
        .insert_artifact(sample_artifact(ArtifactKind::Scenario))
        .await
        .unwrap();

    store
        .append_revision(&a.artifact_id, sample_new_revision("a1"))
        .await
        .unwrap();
    store
        .append_revision(&a.artifact_id, sample_new_revision("a2"))
        .await
        .unwrap();
    let b1 = store
        .append_revision(&b.artifact_id, sample_new_revision("b1"))
        .await
        .unwrap();

    assert_eq!(b1.sequence_number, 1);
}

#[tokio::test]
async fn append_revision_unknown_artifact_is_not_found() {
    let store = MemoryRevisionStore::new();
    let err = store
        .append_revision(&Uuid::new_v4(), sample_new_revision("ghost"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { entity: "artifact", .. }));
}

#[tokio::test]
async fn revisions_for_returns_ascending_sequence_order() {
    let store = MemoryRevisionStore::new();
    let artifact = store
        .insert_artifact(sample_artifact(ArtifactKind::Scenario))
        .await
        .unwrap();

    for i in 0..3 {
        store
            .append_revision(&artifact.artifact_id, sample_new_revision(&format!("v{i}")))
            .await
            .unwrap();
    }

    let history = store.revisions_for(&artifact.artifact_id).await.unwrap();
    let seqs: Vec<u32> = history.iter().map(|r| r.sequence_number).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
}

#[tokio::test]
async fn update_status_cas_succeeds_then_rejects_stale() {
    let store = MemoryRevisionStore::new();
    let artifact = store
        .insert_artifact(sample_artifact(ArtifactKind::TestCase))
        .await
        .unwrap();
    let rev = store
        .append_revision(&artifact.artifact_id, sample_new_revision("login"))
        .await
        .unwrap();

    let updated = store
        .update_revision_status(&rev.revision_id, RevisionStatus::Draft, RevisionStatus::InReview)
        .await
        .unwrap();
    assert_eq!(updated.status, RevisionStatus::InReview);

    let err = store
        .update_revision_status(&rev.revision_id, RevisionStatus::Draft, RevisionStatus::InReview)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::StaleStatus { .. }));
}

#[tokio::test]
async fn update_status_preserves_revision_content() {
    let store = MemoryRevisionStore::new();
    let artifact = store
        .insert_artifact(sample_artifact(ArtifactKind::TestCase))
        .await
        .unwrap();
    let rev = store
        .append_revision(&artifact.artifact_id, sample_new_revision("login"))
        .await
        .unwrap();

    let updated = store
        .update_revision_status(&rev.revision_id, RevisionStatus::Draft, RevisionStatus::InReview)
        .await
        .unwrap();

    assert_eq!(updated.title, rev.title);
    assert_eq!(updated.content, rev.content);
    assert_eq!(updated.sequence_number, rev.sequence_number);
}

// ===========================================================================
// DecisionStore contract tests
// ===========================================================================

#[tokio::test]
async fn decision_insert_and_read_back() {
    let store = MemoryDecisionStore::new();
    let id = Uuid::new_v4().to_string();

    store
        .insert_decision(sample_decision(
            ObjectType::CaseRevision,
            &id,
            1,
            "bob",
            DecisionKind::Approved,
        ))
        .await
        .unwrap();

    let history = store.decisions_for(ObjectType::CaseRevision, &id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].approver_id, "bob");
}

#[tokio::test]
async fn duplicate_decision_tuple_is_rejected() {
    let store = MemoryDecisionStore::new();
    let id = Uuid::new_v4().to_string();

    store
        .insert_decision(sample_decision(
            ObjectType::Release,
            &id,
            1,
            "carol",
            DecisionKind::Approved,
        ))
        .await
        .unwrap();

    // Same approver, same step, opposite verdict: must not overwrite.
    let err = store
        .insert_decision(sample_decision(
            ObjectType::Release,
            &id,
            1,
            "carol",
            DecisionKind::Rejected,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateDecision { .. }));

    let history = store.decisions_for(ObjectType::Release, &id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].decision, DecisionKind::Approved);
}

#[tokio::test]
async fn same_approver_different_step_is_allowed() {
    let store = MemoryDecisionStore::new();
    let id = Uuid::new_v4().to_string();

    for step in 1..=2 {
        store
            .insert_decision(sample_decision(
                ObjectType::ScenarioRevision,
                &id,
                step,
                "dave",
                DecisionKind::Approved,
            ))
            .await
            .unwrap();
    }

    let step1 = store
        .decisions_for_step(ObjectType::ScenarioRevision, &id, 1)
        .await
        .unwrap();
    assert_eq!(step1.len(), 1);
}

#[tokio::test]
async fn decision_key_distinguishes_object_type() {
    let store = MemoryDecisionStore::new();
    let id = Uuid::new_v4().to_string();

    store
        .insert_decision(sample_decision(
            ObjectType::CaseRevision,
            &id,
            1,
            "erin",
            DecisionKind::Approved,
        ))
        .await
        .unwrap();
    // Same id string under a different object type is a distinct key.
    store
        .insert_decision(sample_decision(
            ObjectType::ScenarioRevision,
            &id,
            1,
            "erin",
            DecisionKind::Approved,
        ))
        .await
        .unwrap();
}

// ===========================================================================
// ReleaseStore contract tests
// ===========================================================================

#[tokio::test]
async fn release_round_trip_and_status_update() {
    let store = MemoryReleaseStore::new();
    let release = store.insert_release(sample_release()).await.unwrap();

    let fetched = store.get_release(&release.release_id).await.unwrap();
    assert_eq!(fetched.status, ReleaseStatus::Planning);

    let updated = store
        .update_release_status(&release.release_id, ReleaseStatus::GateCheck)
        .await
        .unwrap();
    assert_eq!(updated.status, ReleaseStatus::GateCheck);
}

#[tokio::test]
async fn baseline_items_accumulate_in_order() {
    let store = MemoryReleaseStore::new();
    let release = store.insert_release(sample_release()).await.unwrap();

    let first = BaselineItem {
        release_id: release.release_id,
        target_type: ObjectType::CaseRevision,
        target_id: Uuid::new_v4().to_string(),
    };
    let second = BaselineItem {
        release_id: release.release_id,
        target_type: ObjectType::ScenarioRevision,
        target_id: Uuid::new_v4().to_string(),
    };

    store
        .add_baseline_items(&release.release_id, vec![first.clone()])
        .await
        .unwrap();
    store
        .add_baseline_items(&release.release_id, vec![second.clone()])
        .await
        .unwrap();

    let baseline = store.baseline_for(&release.release_id).await.unwrap();
    assert_eq!(baseline.len(), 2);
    assert_eq!(baseline[0].target_id, first.target_id);
    assert_eq!(baseline[1].target_id, second.target_id);
}

#[tokio::test]
async fn baseline_for_unknown_release_is_not_found() {
    let store = MemoryReleaseStore::new();
    let err = store.baseline_for(&Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { entity: "release", .. }));
}

// ===========================================================================
// WaiverStore contract tests
// ===========================================================================

#[tokio::test]
async fn waiver_history_includes_expired_newest_first() {
    let store = MemoryWaiverStore::new();
    let release_id = Uuid::new_v4();
    let now = Utc::now();

    let expired = Waiver {
        waiver_id: Uuid::new_v4(),
        release_id,
        target_type: ObjectType::CaseRevision,
        target_id: "rev-1".to_string(),
        reason: "flaky environment".to_string(),
        expires_at: now - Duration::hours(1),
        issuer_id: "lead".to_string(),
        created_at: now - Duration::days(2),
    };
    let active = Waiver {
        waiver_id: Uuid::new_v4(),
        release_id,
        target_type: ObjectType::CaseRevision,
        target_id: "rev-1".to_string(),
        reason: "re-issued after fix slipped".to_string(),
        expires_at: now + Duration::days(1),
        issuer_id: "lead".to_string(),
        created_at: now,
    };

    store.insert_waiver(expired.clone()).await.unwrap();
    store.insert_waiver(active.clone()).await.unwrap();

    let history = store.waivers_for_release(&release_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].waiver_id, active.waiver_id);
    assert!(!history[1].is_active_at(now));
    assert!(history[0].is_active_at(now));
}

// ===========================================================================
// SurrealDB backend spot checks
// ===========================================================================

#[tokio::test]
async fn surreal_revision_store_contract() {
    let handle = Arc::new(SurrealHandle::setup_db().await.unwrap());
    let store = SurrealRevisionStore::new(handle);

    let artifact = store
        .insert_artifact(sample_artifact(ArtifactKind::TestCase))
        .await
        .unwrap();
    let rev1 = store
        .append_revision(&artifact.artifact_id, sample_new_revision("login"))
        .await
        .unwrap();
    let rev2 = store
        .append_revision(&artifact.artifact_id, sample_new_revision("login v2"))
        .await
        .unwrap();

    assert_eq!(rev1.sequence_number, 1);
    assert_eq!(rev2.sequence_number, 2);

    let history = store.revisions_for(&artifact.artifact_id).await.unwrap();
    assert_eq!(history.len(), 2);

    let updated = store
        .update_revision_status(&rev1.revision_id, RevisionStatus::Draft, RevisionStatus::InReview)
        .await
        .unwrap();
    assert_eq!(updated.status, RevisionStatus::InReview);
}

#[tokio::test]
async fn surreal_decision_store_contract() {
    let handle = Arc::new(SurrealHandle::setup_db().await.unwrap());
    let store = SurrealDecisionStore::new(handle);
    let id = Uuid::new_v4().to_string();

    store
        .insert_decision(sample_decision(
            ObjectType::Release,
            &id,
            1,
            "alice",
            DecisionKind::Approved,
        ))
        .await
        .unwrap();

    let err = store
        .insert_decision(sample_decision(
            ObjectType::Release,
            &id,
            1,
            "alice",
            DecisionKind::Rejected,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateDecision { .. }));
}
