//! Casegate-State: SurrealDB Backend for Casegate
//!
//! This crate provides the persistence layer for the test-artifact approval
//! system. It handles all I/O with SurrealDB and owns the two serialization
//! boundaries the upper layers rely on: per-artifact revision sequence
//! allocation and the at-most-one-decision guard on the approval ledger.
//!
//! ## Key Components
//!
//! - `SurrealHandle`: Manages connection, schema, and queries
//! - `RevisionStore` / `DecisionStore` / `ReleaseStore` / `WaiverStore`:
//!   the trait seams the domain layer is written against
//! - `fakes`: in-memory implementations for tests

mod error;
pub mod fakes;
mod handle;
pub mod storage_traits;
mod surreal_stores;

pub use error::StorageError;
pub use handle::{DbConfig, SurrealHandle};
pub use storage_traits::{
    ApprovalDecision, Artifact, ArtifactKind, BaselineItem, DecisionKind, DecisionStore,
    NewRevision, ObjectType, Release, ReleaseStatus, ReleaseStore, Revision, RevisionStatus,
    RevisionStore, StorageResult, Waiver, WaiverStore,
};
pub use surreal_stores::{
    SurrealDecisionStore, SurrealReleaseStore, SurrealRevisionStore, SurrealWaiverStore,
};
