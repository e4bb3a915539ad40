//! Casegate CLI
//!
//! The `casegate` command drives the revision/approval/gate workflow from
//! the terminal, against the same store the daemon uses (remote SurrealDB
//! when `CASEGATE_DB_*` is set, in-memory otherwise — the latter is only
//! useful for trying things out, since state vanishes on exit).
//!
//! ## Commands
//!
//! - `case`: create artifacts, append revisions, submit, re-open, history
//! - `approve` / `reject`: record ledger decisions
//! - `release`: create releases and freeze baselines
//! - `waive`: issue gate waivers
//! - `gate`: evaluate a release gate

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::Level;
use uuid::Uuid;

use casegate_core::{
    init_tracing, ApprovalLedger, ApprovalPolicy, ArtifactKind, BaselineTarget, CreateArtifact,
    CreateRelease, DecisionKind, GateEvaluator, IssueWaiver, ObjectType, RecordDecision,
    ReleaseManager, RevisionLifecycle, WaiverRegistry,
};
use casegate_state::{
    DecisionStore, ReleaseStore, RevisionStore, SurrealDecisionStore, SurrealHandle,
    SurrealReleaseStore, SurrealRevisionStore, SurrealWaiverStore, WaiverStore,
};

#[derive(Parser)]
#[command(name = "casegate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Test-artifact revision tracking, approvals, and release gates", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test case and scenario operations
    Case {
        #[command(subcommand)]
        action: CaseAction,
    },

    /// Record an approval in the ledger
    Approve {
        /// Object type (CASE_REVISION, SCENARIO_REVISION, RELEASE, WAIVER)
        #[arg(long, default_value = "CASE_REVISION")]
        object_type: String,

        /// Object id (revision or release UUID)
        object_id: String,

        /// Review step (1-based)
        #[arg(long, default_value = "1")]
        step: u32,

        /// Approver identity
        #[arg(long)]
        approver: String,

        /// Optional comment
        #[arg(long)]
        comment: Option<String>,

        /// Evidence links (repeatable)
        #[arg(long = "evidence")]
        evidence_links: Vec<String>,
    },

    /// Record a rejection in the ledger (comment is mandatory)
    Reject {
        /// Object type (CASE_REVISION, SCENARIO_REVISION, RELEASE, WAIVER)
        #[arg(long, default_value = "CASE_REVISION")]
        object_type: String,

        /// Object id (revision or release UUID)
        object_id: String,

        /// Review step (1-based)
        #[arg(long, default_value = "1")]
        step: u32,

        /// Approver identity
        #[arg(long)]
        approver: String,

        /// Why the object is rejected
        #[arg(long)]
        comment: String,
    },

    /// Release operations
    Release {
        #[command(subcommand)]
        action: ReleaseAction,
    },

    /// Issue a gate waiver for a release
    Waive {
        /// Release UUID
        release: Uuid,

        /// Target revision UUID
        target: String,

        /// Target type
        #[arg(long, default_value = "CASE_REVISION")]
        target_type: String,

        /// Why the item is waived
        #[arg(long)]
        reason: String,

        /// Hours until the waiver expires
        #[arg(long, default_value = "24")]
        expires_in_hours: i64,

        /// Issuer identity
        #[arg(long)]
        issuer: String,
    },

    /// Evaluate the release gate
    Gate {
        /// Release UUID
        release: Uuid,

        /// Evaluate at an explicit RFC 3339 instant instead of now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand)]
enum CaseAction {
    /// Create a new test case with its initial revision
    Create {
        /// Project the artifact belongs to
        #[arg(long)]
        project: String,

        /// Artifact kind (TEST_CASE or SCENARIO)
        #[arg(long, default_value = "TEST_CASE")]
        kind: String,

        /// Revision title
        #[arg(long)]
        title: String,

        /// Revision content (steps)
        #[arg(long)]
        content: String,

        /// Author identity
        #[arg(long)]
        author: String,
    },

    /// Append a new revision to an existing case
    Revise {
        /// Artifact UUID
        case: Uuid,

        /// Revision title
        #[arg(long)]
        title: String,

        /// Revision content (steps)
        #[arg(long)]
        content: String,

        /// Why this revision exists (mandatory)
        #[arg(long)]
        reason: String,

        /// Author identity
        #[arg(long)]
        author: String,
    },

    /// Submit a draft revision for review
    Submit {
        /// Revision UUID
        revision: Uuid,

        /// Who is submitting
        #[arg(long)]
        by: String,
    },

    /// Re-open a deprecated revision back to draft
    Reopen {
        /// Revision UUID
        revision: Uuid,

        /// Who is re-opening
        #[arg(long)]
        by: String,
    },

    /// Show the revision history of a case
    History {
        /// Artifact UUID
        case: Uuid,
    },
}

#[derive(Subcommand)]
enum ReleaseAction {
    /// Create a release in PLANNING
    Create {
        /// Project the release belongs to
        #[arg(long)]
        project: String,

        /// Release name
        #[arg(long)]
        name: String,

        /// Build reference
        #[arg(long)]
        build_ref: Option<String>,
    },

    /// Freeze a revision into the release baseline
    Baseline {
        /// Release UUID
        release: Uuid,

        /// Target revision UUID
        target: String,

        /// Target type
        #[arg(long, default_value = "CASE_REVISION")]
        target_type: String,
    },

    /// Show all waivers ever issued for a release
    Waivers {
        /// Release UUID
        release: Uuid,
    },
}

struct Services {
    lifecycle: Arc<RevisionLifecycle>,
    ledger: ApprovalLedger,
    releases: ReleaseManager,
    waivers: WaiverRegistry,
    gate: GateEvaluator,
}

async fn connect() -> Result<Services> {
    let handle = Arc::new(
        SurrealHandle::setup_from_env()
            .await
            .context("failed to connect to storage")?,
    );

    let revisions: Arc<dyn RevisionStore> =
        Arc::new(SurrealRevisionStore::new(Arc::clone(&handle)));
    let decisions: Arc<dyn DecisionStore> =
        Arc::new(SurrealDecisionStore::new(Arc::clone(&handle)));
    let release_store: Arc<dyn ReleaseStore> =
        Arc::new(SurrealReleaseStore::new(Arc::clone(&handle)));
    let waiver_store: Arc<dyn WaiverStore> = Arc::new(SurrealWaiverStore::new(handle));
    let policy = ApprovalPolicy::standard();

    let lifecycle = Arc::new(RevisionLifecycle::new(Arc::clone(&revisions)));
    Ok(Services {
        ledger: ApprovalLedger::new(
            Arc::clone(&decisions),
            Arc::clone(&lifecycle),
            policy.clone(),
        ),
        releases: ReleaseManager::new(Arc::clone(&release_store)),
        waivers: WaiverRegistry::new(Arc::clone(&release_store), Arc::clone(&waiver_store)),
        gate: GateEvaluator::new(revisions, decisions, release_store, waiver_store, policy),
        lifecycle,
    })
}

fn parse_object_type(raw: &str) -> Result<ObjectType> {
    match raw {
        "CASE_REVISION" => Ok(ObjectType::CaseRevision),
        "SCENARIO_REVISION" => Ok(ObjectType::ScenarioRevision),
        "RELEASE" => Ok(ObjectType::Release),
        "WAIVER" => Ok(ObjectType::Waiver),
        other => anyhow::bail!("unknown object type: {other}"),
    }
}

fn parse_kind(raw: &str) -> Result<ArtifactKind> {
    match raw {
        "TEST_CASE" => Ok(ArtifactKind::TestCase),
        "SCENARIO" => Ok(ArtifactKind::Scenario),
        other => anyhow::bail!("unknown artifact kind: {other}"),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    init_tracing(cli.json, level);

    let services = connect().await?;

    match cli.command {
        Commands::Case { action } => match action {
            CaseAction::Create {
                project,
                kind,
                title,
                content,
                author,
            } => {
                let (artifact, revision) = services
                    .lifecycle
                    .create_artifact(CreateArtifact {
                        project_id: project,
                        kind: parse_kind(&kind)?,
                        title,
                        content,
                        reason: None,
                        created_by: author,
                    })
                    .await?;
                print_json(&serde_json::json!({
                    "artifact": artifact,
                    "revision": revision,
                }))?;
            }
            CaseAction::Revise {
                case,
                title,
                content,
                reason,
                author,
            } => {
                let revision = services
                    .lifecycle
                    .create_revision(&case, title, content, reason, author)
                    .await?;
                print_json(&revision)?;
            }
            CaseAction::Submit { revision, by } => {
                let revision = services.lifecycle.submit_for_review(&revision, &by).await?;
                print_json(&revision)?;
            }
            CaseAction::Reopen { revision, by } => {
                let revision = services.lifecycle.reopen(&revision, &by).await?;
                print_json(&revision)?;
            }
            CaseAction::History { case } => {
                let history = services.lifecycle.history(&case).await?;
                print_json(&history)?;
            }
        },

        Commands::Approve {
            object_type,
            object_id,
            step,
            approver,
            comment,
            evidence_links,
        } => {
            let decision = services
                .ledger
                .record_decision(RecordDecision {
                    object_type: parse_object_type(&object_type)?,
                    object_id,
                    step,
                    approver_id: approver,
                    decision: DecisionKind::Approved,
                    comment,
                    evidence_links,
                })
                .await?;
            print_json(&decision)?;
        }

        Commands::Reject {
            object_type,
            object_id,
            step,
            approver,
            comment,
        } => {
            let decision = services
                .ledger
                .record_decision(RecordDecision {
                    object_type: parse_object_type(&object_type)?,
                    object_id,
                    step,
                    approver_id: approver,
                    decision: DecisionKind::Rejected,
                    comment: Some(comment),
                    evidence_links: vec![],
                })
                .await?;
            print_json(&decision)?;
        }

        Commands::Release { action } => match action {
            ReleaseAction::Create {
                project,
                name,
                build_ref,
            } => {
                let release = services
                    .releases
                    .create(CreateRelease {
                        project_id: project,
                        name,
                        build_ref,
                    })
                    .await?;
                print_json(&release)?;
            }
            ReleaseAction::Baseline {
                release,
                target,
                target_type,
            } => {
                let items = services
                    .releases
                    .freeze_baseline(
                        &release,
                        vec![BaselineTarget {
                            target_type: parse_object_type(&target_type)?,
                            target_id: target,
                        }],
                    )
                    .await?;
                print_json(&items)?;
            }
            ReleaseAction::Waivers { release } => {
                let history = services.waivers.history(&release).await?;
                print_json(&history)?;
            }
        },

        Commands::Waive {
            release,
            target,
            target_type,
            reason,
            expires_in_hours,
            issuer,
        } => {
            let waiver = services
                .waivers
                .issue(IssueWaiver {
                    release_id: release,
                    target_type: parse_object_type(&target_type)?,
                    target_id: target,
                    reason,
                    expires_at: Utc::now() + Duration::hours(expires_in_hours),
                    issuer_id: issuer,
                })
                .await?;
            print_json(&waiver)?;
        }

        Commands::Gate { release, at } => {
            let result = match at {
                Some(instant) => services.gate.evaluate_at(&release, instant).await?,
                None => services.gate.evaluate(&release).await?,
            };
            print_json(&result)?;
            if !result.overall_pass {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_case_create() {
        let cli = Cli::try_parse_from([
            "casegate", "case", "create", "--project", "proj-1", "--title", "Login",
            "--content", "steps", "--author", "alice",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Case {
                action: CaseAction::Create { .. }
            }
        ));
    }

    #[test]
    fn test_cli_rejects_unknown_object_type() {
        assert!(parse_object_type("NOT_A_TYPE").is_err());
        assert!(parse_kind("NOT_A_KIND").is_err());
    }
}
