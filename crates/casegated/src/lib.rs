//! Casegate HTTP daemon library.
//!
//! Builds the axum router over the domain services. The binary in `main.rs`
//! wires SurrealDB-backed stores in; tests wire the in-memory fakes.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use casegate_core::{
    ApprovalLedger, ApprovalPolicy, GateEvaluator, ReleaseManager, RevisionLifecycle,
    WaiverRegistry,
};
use casegate_state::{DecisionStore, ReleaseStore, RevisionStore, WaiverStore};

/// Shared handler state: one instance of each domain service.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<RevisionLifecycle>,
    pub ledger: Arc<ApprovalLedger>,
    pub releases: Arc<ReleaseManager>,
    pub waivers: Arc<WaiverRegistry>,
    pub gate: Arc<GateEvaluator>,
}

impl AppState {
    /// Wire the services over any conforming set of stores.
    pub fn new(
        revisions: Arc<dyn RevisionStore>,
        decisions: Arc<dyn DecisionStore>,
        releases: Arc<dyn ReleaseStore>,
        waivers: Arc<dyn WaiverStore>,
        policy: ApprovalPolicy,
    ) -> Self {
        let lifecycle = Arc::new(RevisionLifecycle::new(Arc::clone(&revisions)));
        Self {
            ledger: Arc::new(ApprovalLedger::new(
                Arc::clone(&decisions),
                Arc::clone(&lifecycle),
                policy.clone(),
            )),
            releases: Arc::new(ReleaseManager::new(Arc::clone(&releases))),
            waivers: Arc::new(WaiverRegistry::new(
                Arc::clone(&releases),
                Arc::clone(&waivers),
            )),
            gate: Arc::new(GateEvaluator::new(
                revisions, decisions, releases, waivers, policy,
            )),
            lifecycle,
        }
    }
}

/// The full route table.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/test-cases", post(routes::create_test_case))
        .route(
            "/test-cases/{caseId}/revisions",
            post(routes::create_revision).get(routes::revision_history),
        )
        .route(
            "/test-cases/revisions/{revisionId}/submit-for-review",
            post(routes::submit_for_review),
        )
        .route(
            "/test-cases/revisions/{revisionId}/reopen",
            post(routes::reopen_revision),
        )
        .route("/approvals", post(routes::record_decision))
        .route(
            "/approvals/{objectType}/{objectId}",
            get(routes::decision_history),
        )
        .route("/releases", post(routes::create_release))
        .route(
            "/releases/{releaseId}/baseline",
            post(routes::freeze_baseline),
        )
        .route(
            "/releases/{releaseId}/gate-evaluation",
            get(routes::gate_evaluation),
        )
        .route(
            "/releases/{releaseId}/waivers",
            post(routes::issue_waiver).get(routes::waiver_history),
        )
        .with_state(state)
}
