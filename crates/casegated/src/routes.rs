//! Route handlers and wire DTOs.
//!
//! Bodies are camelCase JSON; enum values use their SCREAMING_SNAKE_CASE
//! wire form. Handlers stay thin: parse, call the service, map the result.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use casegate_core::{
    ApprovalDecision, Artifact, ArtifactKind, BaselineItem, BaselineTarget, CreateArtifact,
    CreateRelease, DecisionKind, GateEvaluationResult, IssueWaiver, ObjectType, RecordDecision,
    Release, Revision, Waiver,
};

use crate::error::ApiError;
use crate::AppState;

// ---------------------------------------------------------------------------
// Wire DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDto {
    pub artifact_id: Uuid,
    pub project_id: String,
    pub kind: ArtifactKind,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<Artifact> for ArtifactDto {
    fn from(a: Artifact) -> Self {
        Self {
            artifact_id: a.artifact_id,
            project_id: a.project_id,
            kind: a.kind,
            created_by: a.created_by,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionDto {
    pub revision_id: Uuid,
    pub artifact_id: Uuid,
    pub sequence_number: u32,
    pub title: String,
    pub content: String,
    pub status: casegate_core::RevisionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl From<Revision> for RevisionDto {
    fn from(r: Revision) -> Self {
        Self {
            revision_id: r.revision_id,
            artifact_id: r.artifact_id,
            sequence_number: r.sequence_number,
            title: r.title,
            content: r.content,
            status: r.status,
            reason: r.reason,
            created_by: r.created_by,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionDto {
    pub decision_id: Uuid,
    pub object_type: ObjectType,
    pub object_id: String,
    pub step: u32,
    pub approver_id: String,
    pub decision: DecisionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub evidence_links: Vec<String>,
    pub decided_at: DateTime<Utc>,
}

impl From<ApprovalDecision> for DecisionDto {
    fn from(d: ApprovalDecision) -> Self {
        Self {
            decision_id: d.decision_id,
            object_type: d.object_type,
            object_id: d.object_id,
            step: d.step,
            approver_id: d.approver_id,
            decision: d.decision,
            comment: d.comment,
            evidence_links: d.evidence_links,
            decided_at: d.decided_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseDto {
    pub release_id: Uuid,
    pub project_id: String,
    pub name: String,
    pub status: casegate_core::ReleaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Release> for ReleaseDto {
    fn from(r: Release) -> Self {
        Self {
            release_id: r.release_id,
            project_id: r.project_id,
            name: r.name,
            status: r.status,
            build_ref: r.build_ref,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineItemDto {
    pub release_id: Uuid,
    pub target_type: ObjectType,
    pub target_id: String,
}

impl From<BaselineItem> for BaselineItemDto {
    fn from(b: BaselineItem) -> Self {
        Self {
            release_id: b.release_id,
            target_type: b.target_type,
            target_id: b.target_id,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaiverDto {
    pub waiver_id: Uuid,
    pub release_id: Uuid,
    pub target_type: ObjectType,
    pub target_id: String,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
    pub issuer_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<Waiver> for WaiverDto {
    fn from(w: Waiver) -> Self {
        Self {
            waiver_id: w.waiver_id,
            release_id: w.release_id,
            target_type: w.target_type,
            target_id: w.target_id,
            reason: w.reason,
            expires_at: w.expires_at,
            issuer_id: w.issuer_id,
            created_at: w.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateCriterionDto {
    pub name: String,
    pub pass: bool,
    pub details: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaivedItemDto {
    pub target_type: ObjectType,
    pub target_id: String,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateEvaluationDto {
    pub release_id: Uuid,
    pub overall_pass: bool,
    pub criteria: Vec<GateCriterionDto>,
    pub waived_items: Vec<WaivedItemDto>,
    pub evaluated_at: DateTime<Utc>,
}

impl From<GateEvaluationResult> for GateEvaluationDto {
    fn from(g: GateEvaluationResult) -> Self {
        Self {
            release_id: g.release_id,
            overall_pass: g.overall_pass,
            criteria: g
                .criteria
                .into_iter()
                .map(|c| GateCriterionDto {
                    name: c.name,
                    pass: c.pass,
                    details: c.details,
                })
                .collect(),
            waived_items: g
                .waived_items
                .into_iter()
                .map(|w| WaivedItemDto {
                    target_type: w.target_type,
                    target_id: w.target_id,
                    reason: w.reason,
                    expires_at: w.expires_at,
                })
                .collect(),
            evaluated_at: g.evaluated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestCaseRequest {
    pub project_id: String,
    #[serde(default = "default_kind")]
    pub kind: ArtifactKind,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub reason: Option<String>,
    pub created_by: String,
}

fn default_kind() -> ArtifactKind {
    ArtifactKind::TestCase
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRevisionRequest {
    pub title: String,
    pub content: String,
    /// Required; an empty reason is a 400.
    #[serde(default)]
    pub reason: String,
    pub created_by: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitForReviewRequest {
    pub submitted_by: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReopenRequest {
    pub reopened_by: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub object_type: ObjectType,
    pub object_id: String,
    pub step: u32,
    pub approver_id: String,
    pub decision: DecisionKind,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub evidence_links: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReleaseRequest {
    pub project_id: String,
    pub name: String,
    #[serde(default)]
    pub build_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineTargetRequest {
    pub target_type: ObjectType,
    pub target_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreezeBaselineRequest {
    pub targets: Vec<BaselineTargetRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueWaiverRequest {
    pub target_type: ObjectType,
    pub target_id: String,
    pub reason: String,
    pub expires_at: DateTime<Utc>,
    pub issuer_id: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": casegate_core::VERSION }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestCaseResponse {
    pub artifact: ArtifactDto,
    pub revision: RevisionDto,
}

pub async fn create_test_case(
    State(state): State<AppState>,
    Json(req): Json<CreateTestCaseRequest>,
) -> Result<(StatusCode, Json<CreateTestCaseResponse>), ApiError> {
    let (artifact, revision) = state
        .lifecycle
        .create_artifact(CreateArtifact {
            project_id: req.project_id,
            kind: req.kind,
            title: req.title,
            content: req.content,
            reason: req.reason,
            created_by: req.created_by,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateTestCaseResponse {
            artifact: artifact.into(),
            revision: revision.into(),
        }),
    ))
}

pub async fn create_revision(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
    Json(req): Json<NewRevisionRequest>,
) -> Result<(StatusCode, Json<RevisionDto>), ApiError> {
    let revision = state
        .lifecycle
        .create_revision(&case_id, req.title, req.content, req.reason, req.created_by)
        .await?;
    Ok((StatusCode::CREATED, Json(revision.into())))
}

pub async fn revision_history(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
) -> Result<Json<Vec<RevisionDto>>, ApiError> {
    let history = state.lifecycle.history(&case_id).await?;
    Ok(Json(history.into_iter().map(RevisionDto::from).collect()))
}

pub async fn submit_for_review(
    State(state): State<AppState>,
    Path(revision_id): Path<Uuid>,
    Json(req): Json<SubmitForReviewRequest>,
) -> Result<Json<RevisionDto>, ApiError> {
    let revision = state
        .lifecycle
        .submit_for_review(&revision_id, &req.submitted_by)
        .await?;
    Ok(Json(revision.into()))
}

pub async fn reopen_revision(
    State(state): State<AppState>,
    Path(revision_id): Path<Uuid>,
    Json(req): Json<ReopenRequest>,
) -> Result<Json<RevisionDto>, ApiError> {
    let revision = state
        .lifecycle
        .reopen(&revision_id, &req.reopened_by)
        .await?;
    Ok(Json(revision.into()))
}

pub async fn record_decision(
    State(state): State<AppState>,
    Json(req): Json<ApprovalRequest>,
) -> Result<(StatusCode, Json<DecisionDto>), ApiError> {
    let decision = state
        .ledger
        .record_decision(RecordDecision {
            object_type: req.object_type,
            object_id: req.object_id,
            step: req.step,
            approver_id: req.approver_id,
            decision: req.decision,
            comment: req.comment,
            evidence_links: req.evidence_links,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(decision.into())))
}

pub async fn decision_history(
    State(state): State<AppState>,
    Path((object_type, object_id)): Path<(String, String)>,
) -> Result<Json<Vec<DecisionDto>>, ApiError> {
    let object_type = parse_object_type(&object_type)?;
    let history = state.ledger.history(object_type, &object_id).await?;
    Ok(Json(history.into_iter().map(DecisionDto::from).collect()))
}

pub async fn create_release(
    State(state): State<AppState>,
    Json(req): Json<CreateReleaseRequest>,
) -> Result<(StatusCode, Json<ReleaseDto>), ApiError> {
    let release = state
        .releases
        .create(CreateRelease {
            project_id: req.project_id,
            name: req.name,
            build_ref: req.build_ref,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(release.into())))
}

pub async fn freeze_baseline(
    State(state): State<AppState>,
    Path(release_id): Path<Uuid>,
    Json(req): Json<FreezeBaselineRequest>,
) -> Result<(StatusCode, Json<Vec<BaselineItemDto>>), ApiError> {
    let items = state
        .releases
        .freeze_baseline(
            &release_id,
            req.targets
                .into_iter()
                .map(|t| BaselineTarget {
                    target_type: t.target_type,
                    target_id: t.target_id,
                })
                .collect(),
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(items.into_iter().map(BaselineItemDto::from).collect()),
    ))
}

pub async fn gate_evaluation(
    State(state): State<AppState>,
    Path(release_id): Path<Uuid>,
) -> Result<Json<GateEvaluationDto>, ApiError> {
    let result = state.gate.evaluate(&release_id).await?;
    Ok(Json(result.into()))
}

pub async fn issue_waiver(
    State(state): State<AppState>,
    Path(release_id): Path<Uuid>,
    Json(req): Json<IssueWaiverRequest>,
) -> Result<(StatusCode, Json<WaiverDto>), ApiError> {
    let waiver = state
        .waivers
        .issue(IssueWaiver {
            release_id,
            target_type: req.target_type,
            target_id: req.target_id,
            reason: req.reason,
            expires_at: req.expires_at,
            issuer_id: req.issuer_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(waiver.into())))
}

pub async fn waiver_history(
    State(state): State<AppState>,
    Path(release_id): Path<Uuid>,
) -> Result<Json<Vec<WaiverDto>>, ApiError> {
    let history = state.waivers.history(&release_id).await?;
    Ok(Json(history.into_iter().map(WaiverDto::from).collect()))
}

fn parse_object_type(raw: &str) -> Result<ObjectType, ApiError> {
    match raw {
        "CASE_REVISION" => Ok(ObjectType::CaseRevision),
        "SCENARIO_REVISION" => Ok(ObjectType::ScenarioRevision),
        "RELEASE" => Ok(ObjectType::Release),
        "WAIVER" => Ok(ObjectType::Waiver),
        other => Err(ApiError::bad_request(
            "objectType",
            format!("unknown object type: {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_type() {
        assert_eq!(
            parse_object_type("CASE_REVISION").unwrap(),
            ObjectType::CaseRevision
        );
        assert!(parse_object_type("case_revision").is_err());
    }

    #[test]
    fn test_request_body_is_camel_case() {
        let req: ApprovalRequest = serde_json::from_value(json!({
            "objectType": "RELEASE",
            "objectId": "rel-1",
            "step": 1,
            "approverId": "alice",
            "decision": "APPROVED"
        }))
        .unwrap();
        assert_eq!(req.object_type, ObjectType::Release);
        assert!(req.evidence_links.is_empty());
    }

    #[test]
    fn test_revision_dto_serializes_camel_case() {
        let dto = RevisionDto {
            revision_id: Uuid::new_v4(),
            artifact_id: Uuid::new_v4(),
            sequence_number: 3,
            title: "t".to_string(),
            content: "c".to_string(),
            status: casegate_core::RevisionStatus::InReview,
            reason: None,
            created_by: "alice".to_string(),
            created_at: Utc::now(),
        };
        let value = serde_json::to_value(&dto).unwrap();
        assert_eq!(value["sequenceNumber"], 3);
        assert_eq!(value["status"], "IN_REVIEW");
        assert!(value.get("reason").is_none());
    }
}
