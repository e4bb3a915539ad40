//! Structured observability hooks for Casegate lifecycle events.
//!
//! Events are emitted at `info!` level with a stable `event` field so log
//! pipelines can filter on them. For JSON output, initialize telemetry with
//! `json = true`.

use tracing::info;

/// Emit event: a new revision was appended to an artifact.
pub fn emit_revision_created(revision_id: &str, artifact_id: &str, sequence_number: u32) {
    info!(
        event = "revision.created",
        revision_id = %revision_id,
        artifact_id = %artifact_id,
        sequence_number = sequence_number,
    );
}

/// Emit event: a revision moved to a new lifecycle status.
pub fn emit_revision_transitioned(revision_id: &str, from: &str, to: &str, actor: &str) {
    info!(
        event = "revision.transitioned",
        revision_id = %revision_id,
        from = %from,
        to = %to,
        actor = %actor,
    );
}

/// Emit event: an approval decision was recorded in the ledger.
pub fn emit_decision_recorded(
    object_type: &str,
    object_id: &str,
    step: u32,
    approver_id: &str,
    decision: &str,
) {
    info!(
        event = "decision.recorded",
        object_type = %object_type,
        object_id = %object_id,
        step = step,
        approver_id = %approver_id,
        decision = %decision,
    );
}

/// Emit event: a release gate was evaluated.
pub fn emit_gate_evaluated(release_id: &str, overall_pass: bool, waived_items: usize) {
    info!(
        event = "gate.evaluated",
        release_id = %release_id,
        overall_pass = overall_pass,
        waived_items = waived_items,
    );
}

/// Emit event: a waiver was issued for a release.
pub fn emit_waiver_issued(waiver_id: &str, release_id: &str, target_id: &str) {
    info!(
        event = "waiver.issued",
        waiver_id = %waiver_id,
        release_id = %release_id,
        target_id = %target_id,
    );
}
