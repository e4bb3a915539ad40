//! Casegate Core Library
//!
//! Domain model and services for test-artifact revision tracking, the
//! multi-step approval ledger, and release gate evaluation.

pub mod domain;
pub mod gate;
pub mod ledger;
pub mod lifecycle;
pub mod obs;
pub mod policy;
pub mod releases;
pub mod telemetry;
pub mod waivers;

pub use domain::{
    ApprovalDecision, Artifact, ArtifactKind, BaselineItem, CoreError, DecisionKind, NewRevision,
    ObjectType, Release, ReleaseStatus, Result, Revision, RevisionStatus, Waiver,
};

pub use gate::{
    GateCriterion, GateEvaluationResult, GateEvaluator, WaivedItem, CRITERION_BASELINE_RESOLVED,
    CRITERION_RELEASE_APPROVED,
};
pub use ledger::{ApprovalLedger, RecordDecision};
pub use lifecycle::{transition_allowed, CreateArtifact, RevisionLifecycle};
pub use policy::{ApprovalPolicy, PolicyRule};
pub use releases::{BaselineTarget, CreateRelease, ReleaseManager};
pub use waivers::{IssueWaiver, WaiverRegistry};

pub use obs::{
    emit_decision_recorded, emit_gate_evaluated, emit_revision_created,
    emit_revision_transitioned, emit_waiver_issued,
};
pub use telemetry::init_tracing;

/// Casegate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
