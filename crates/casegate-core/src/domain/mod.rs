//! Core domain types for Casegate.
//!
//! The persisted entities live next to the storage traits in
//! `casegate-state`; this module re-exports them so domain code and
//! downstream crates have a single import path.

pub mod error;

pub use casegate_state::{
    ApprovalDecision, Artifact, ArtifactKind, BaselineItem, DecisionKind, NewRevision, ObjectType,
    Release, ReleaseStatus, Revision, RevisionStatus, Waiver,
};
pub use error::{CoreError, Result};
