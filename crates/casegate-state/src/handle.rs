//! SurrealDB Handle - Connection and Operations
//!
//! Manages the connection and provides the backing operations for the four
//! storage traits: artifacts/revisions, decisions, releases/baselines, and
//! waivers.
//!
//! The two serialization boundaries live here:
//! - `idx_revision_seq` (UNIQUE on artifact_id + sequence_number) backs
//!   sequence allocation; `revision_append` retries on a lost race.
//! - `idx_decision_key` (UNIQUE on the decision tuple) backs the
//!   at-most-one-decision guard; a violation surfaces as
//!   `StorageError::DuplicateDecision`, never as a silent overwrite.
//!
//! Supports both local (in-memory) and cloud (WebSocket) connections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::sql::Datetime as SurrealDatetime;
use surrealdb::Surreal;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::StorageError;
use crate::storage_traits::{
    ApprovalDecision, Artifact, ArtifactKind, BaselineItem, DecisionKind, NewRevision, ObjectType,
    Release, ReleaseStatus, Revision, RevisionStatus, StorageResult, Waiver,
};

/// How many times `revision_append` retries a lost sequence-allocation race
/// before giving up with `SequenceConflict`.
const SEQUENCE_RETRIES: usize = 3;

/// Configuration for a SurrealDB cloud/remote connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    /// Database username
    pub username: String,
    /// Database password
    pub password: String,
    /// Namespace (default: "casegate")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl DbConfig {
    /// Create a new configuration for a database user.
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: "casegate".to_string(),
            database: "main".to_string(),
            is_root: false,
        }
    }

    /// Set custom namespace.
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database.
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Set whether this is a root user.
    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables.
    ///
    /// Reads:
    /// - CASEGATE_DB_ENDPOINT (required)
    /// - CASEGATE_DB_USERNAME (required)
    /// - CASEGATE_DB_PASSWORD (required)
    /// - CASEGATE_DB_NAMESPACE (optional, default: "casegate")
    /// - CASEGATE_DB_DATABASE (optional, default: "main")
    /// - CASEGATE_DB_ROOT (optional, default: "false")
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("CASEGATE_DB_ENDPOINT").map_err(|_| "CASEGATE_DB_ENDPOINT not set")?;
        let username =
            std::env::var("CASEGATE_DB_USERNAME").map_err(|_| "CASEGATE_DB_USERNAME not set")?;
        let password =
            std::env::var("CASEGATE_DB_PASSWORD").map_err(|_| "CASEGATE_DB_PASSWORD not set")?;
        let namespace =
            std::env::var("CASEGATE_DB_NAMESPACE").unwrap_or_else(|_| "casegate".to_string());
        let database =
            std::env::var("CASEGATE_DB_DATABASE").unwrap_or_else(|_| "main".to_string());
        let is_root = std::env::var("CASEGATE_DB_ROOT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// SurrealDB connection handle for Casegate
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

// ---------------------------------------------------------------------------
// Database record mirrors
//
// Ids are stored as strings and timestamps as SurrealDB datetimes; the
// converters parse back into Uuid / chrono types and surface bad rows as
// Serialization errors instead of panicking.
// ---------------------------------------------------------------------------

fn parse_uuid(field: &str, value: &str) -> StorageResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| StorageError::Serialization(format!("bad {field} uuid {value}: {e}")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbArtifact {
    artifact_id: String,
    project_id: String,
    kind: ArtifactKind,
    created_by: String,
    created_at: SurrealDatetime,
}

impl DbArtifact {
    fn from_artifact(a: &Artifact) -> Self {
        Self {
            artifact_id: a.artifact_id.to_string(),
            project_id: a.project_id.clone(),
            kind: a.kind,
            created_by: a.created_by.clone(),
            created_at: SurrealDatetime::from(a.created_at),
        }
    }

    fn into_artifact(self) -> StorageResult<Artifact> {
        Ok(Artifact {
            artifact_id: parse_uuid("artifact_id", &self.artifact_id)?,
            project_id: self.project_id,
            kind: self.kind,
            created_by: self.created_by,
            created_at: DateTime::<Utc>::from(self.created_at),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbRevision {
    revision_id: String,
    artifact_id: String,
    sequence_number: u32,
    title: String,
    content: String,
    status: RevisionStatus,
    reason: Option<String>,
    created_by: String,
    created_at: SurrealDatetime,
}

impl DbRevision {
    fn from_revision(r: &Revision) -> Self {
        Self {
            revision_id: r.revision_id.to_string(),
            artifact_id: r.artifact_id.to_string(),
            sequence_number: r.sequence_number,
            title: r.title.clone(),
            content: r.content.clone(),
            status: r.status,
            reason: r.reason.clone(),
            created_by: r.created_by.clone(),
            created_at: SurrealDatetime::from(r.created_at),
        }
    }

    fn into_revision(self) -> StorageResult<Revision> {
        Ok(Revision {
            revision_id: parse_uuid("revision_id", &self.revision_id)?,
            artifact_id: parse_uuid("artifact_id", &self.artifact_id)?,
            sequence_number: self.sequence_number,
            title: self.title,
            content: self.content,
            status: self.status,
            reason: self.reason,
            created_by: self.created_by,
            created_at: DateTime::<Utc>::from(self.created_at),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbDecision {
    decision_id: String,
    object_type: ObjectType,
    object_id: String,
    step: u32,
    approver_id: String,
    decision: DecisionKind,
    comment: Option<String>,
    evidence_links: Vec<String>,
    decided_at: SurrealDatetime,
}

impl DbDecision {
    fn from_decision(d: &ApprovalDecision) -> Self {
        Self {
            decision_id: d.decision_id.to_string(),
            object_type: d.object_type,
            object_id: d.object_id.clone(),
            step: d.step,
            approver_id: d.approver_id.clone(),
            decision: d.decision,
            comment: d.comment.clone(),
            evidence_links: d.evidence_links.clone(),
            decided_at: SurrealDatetime::from(d.decided_at),
        }
    }

    fn into_decision(self) -> StorageResult<ApprovalDecision> {
        Ok(ApprovalDecision {
            decision_id: parse_uuid("decision_id", &self.decision_id)?,
            object_type: self.object_type,
            object_id: self.object_id,
            step: self.step,
            approver_id: self.approver_id,
            decision: self.decision,
            comment: self.comment,
            evidence_links: self.evidence_links,
            decided_at: DateTime::<Utc>::from(self.decided_at),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbRelease {
    release_id: String,
    project_id: String,
    name: String,
    status: ReleaseStatus,
    build_ref: Option<String>,
    created_at: SurrealDatetime,
}

impl DbRelease {
    fn from_release(r: &Release) -> Self {
        Self {
            release_id: r.release_id.to_string(),
            project_id: r.project_id.clone(),
            name: r.name.clone(),
            status: r.status,
            build_ref: r.build_ref.clone(),
            created_at: SurrealDatetime::from(r.created_at),
        }
    }

    fn into_release(self) -> StorageResult<Release> {
        Ok(Release {
            release_id: parse_uuid("release_id", &self.release_id)?,
            project_id: self.project_id,
            name: self.name,
            status: self.status,
            build_ref: self.build_ref,
            created_at: DateTime::<Utc>::from(self.created_at),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbBaselineItem {
    release_id: String,
    target_type: ObjectType,
    target_id: String,
    position: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DbWaiver {
    waiver_id: String,
    release_id: String,
    target_type: ObjectType,
    target_id: String,
    reason: String,
    expires_at: SurrealDatetime,
    issuer_id: String,
    created_at: SurrealDatetime,
}

impl DbWaiver {
    fn from_waiver(w: &Waiver) -> Self {
        Self {
            waiver_id: w.waiver_id.to_string(),
            release_id: w.release_id.to_string(),
            target_type: w.target_type,
            target_id: w.target_id.clone(),
            reason: w.reason.clone(),
            expires_at: SurrealDatetime::from(w.expires_at),
            issuer_id: w.issuer_id.clone(),
            created_at: SurrealDatetime::from(w.created_at),
        }
    }

    fn into_waiver(self) -> StorageResult<Waiver> {
        Ok(Waiver {
            waiver_id: parse_uuid("waiver_id", &self.waiver_id)?,
            release_id: parse_uuid("release_id", &self.release_id)?,
            target_type: self.target_type,
            target_id: self.target_id,
            reason: self.reason,
            expires_at: DateTime::<Utc>::from(self.expires_at),
            issuer_id: self.issuer_id,
            created_at: DateTime::<Utc>::from(self.created_at),
        })
    }
}

impl SurrealHandle {
    /// Connect to SurrealDB in-memory and set up schema.
    #[instrument(skip_all)]
    pub async fn setup_db() -> StorageResult<Self> {
        info!("Connecting to SurrealDB (in-memory)");

        let db = surrealdb::engine::any::connect("mem://")
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        db.use_ns("casegate")
            .use_db("main")
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;

        info!("SurrealDB connected and schema initialized");
        Ok(handle)
    }

    /// Connect to a remote SurrealDB instance.
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
    pub async fn setup_remote(config: DbConfig) -> StorageResult<Self> {
        info!("Connecting to SurrealDB (root={})", config.is_root);

        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                StorageError::Connection(format!(
                    "failed to connect to {}: {}",
                    config.endpoint, e
                ))
            })?;

        if config.is_root {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StorageError::Connection(format!("root authentication failed: {e}")))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| {
                StorageError::Connection(format!("database authentication failed: {e}"))
            })?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StorageError::Connection(format!("failed to select namespace/database: {e}"))
            })?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;

        info!("SurrealDB remote connected and schema initialized");
        Ok(handle)
    }

    /// Connect using environment variables.
    ///
    /// If CASEGATE_DB_ENDPOINT is set, connects to that remote.
    /// Otherwise, falls back to in-memory.
    #[instrument(skip_all)]
    pub async fn setup_from_env() -> StorageResult<Self> {
        if let Ok(config) = DbConfig::from_env() {
            info!("Remote config found, connecting to SurrealDB remote");
            return Self::setup_remote(config).await;
        }

        info!("No remote config found, using in-memory database");
        Self::setup_db().await
    }

    /// Initialize the database schema.
    async fn init_schema(&self) -> StorageResult<()> {
        debug!("Initializing Casegate schema");

        let schema = r#"
            -- Artifacts table (test case / scenario identities)
            DEFINE TABLE artifacts SCHEMAFULL;
            DEFINE FIELD artifact_id ON artifacts TYPE string;
            DEFINE FIELD project_id ON artifacts TYPE string;
            DEFINE FIELD kind ON artifacts TYPE string;
            DEFINE FIELD created_by ON artifacts TYPE string;
            DEFINE FIELD created_at ON artifacts TYPE datetime;
            DEFINE INDEX idx_artifact_id ON artifacts FIELDS artifact_id UNIQUE;

            -- Revisions table (append-only snapshots)
            DEFINE TABLE revisions SCHEMAFULL;
            DEFINE FIELD revision_id ON revisions TYPE string;
            DEFINE FIELD artifact_id ON revisions TYPE string;
            DEFINE FIELD sequence_number ON revisions TYPE int;
            DEFINE FIELD title ON revisions TYPE string;
            DEFINE FIELD content ON revisions TYPE string;
            DEFINE FIELD status ON revisions TYPE string;
            DEFINE FIELD reason ON revisions TYPE option<string>;
            DEFINE FIELD created_by ON revisions TYPE string;
            DEFINE FIELD created_at ON revisions TYPE datetime;
            DEFINE INDEX idx_revision_id ON revisions FIELDS revision_id UNIQUE;
            DEFINE INDEX idx_revision_seq ON revisions FIELDS artifact_id, sequence_number UNIQUE;

            -- Decisions table (approval ledger, append-only)
            DEFINE TABLE decisions SCHEMAFULL;
            DEFINE FIELD decision_id ON decisions TYPE string;
            DEFINE FIELD object_type ON decisions TYPE string;
            DEFINE FIELD object_id ON decisions TYPE string;
            DEFINE FIELD step ON decisions TYPE int;
            DEFINE FIELD approver_id ON decisions TYPE string;
            DEFINE FIELD decision ON decisions TYPE string;
            DEFINE FIELD comment ON decisions TYPE option<string>;
            DEFINE FIELD evidence_links ON decisions TYPE array<string>;
            DEFINE FIELD decided_at ON decisions TYPE datetime;
            DEFINE INDEX idx_decision_id ON decisions FIELDS decision_id UNIQUE;
            DEFINE INDEX idx_decision_key ON decisions FIELDS object_type, object_id, step, approver_id UNIQUE;

            -- Releases table
            DEFINE TABLE releases SCHEMAFULL;
            DEFINE FIELD release_id ON releases TYPE string;
            DEFINE FIELD project_id ON releases TYPE string;
            DEFINE FIELD name ON releases TYPE string;
            DEFINE FIELD status ON releases TYPE string;
            DEFINE FIELD build_ref ON releases TYPE option<string>;
            DEFINE FIELD created_at ON releases TYPE datetime;
            DEFINE INDEX idx_release_id ON releases FIELDS release_id UNIQUE;

            -- Baseline items table (frozen gating scope per release)
            DEFINE TABLE baseline_items SCHEMAFULL;
            DEFINE FIELD release_id ON baseline_items TYPE string;
            DEFINE FIELD target_type ON baseline_items TYPE string;
            DEFINE FIELD target_id ON baseline_items TYPE string;
            DEFINE FIELD position ON baseline_items TYPE int;
            DEFINE INDEX idx_baseline_release ON baseline_items FIELDS release_id;
            DEFINE INDEX idx_baseline_target ON baseline_items FIELDS release_id, target_type, target_id UNIQUE;

            -- Waivers table (append-only, expiry evaluated by readers)
            DEFINE TABLE waivers SCHEMAFULL;
            DEFINE FIELD waiver_id ON waivers TYPE string;
            DEFINE FIELD release_id ON waivers TYPE string;
            DEFINE FIELD target_type ON waivers TYPE string;
            DEFINE FIELD target_id ON waivers TYPE string;
            DEFINE FIELD reason ON waivers TYPE string;
            DEFINE FIELD expires_at ON waivers TYPE datetime;
            DEFINE FIELD issuer_id ON waivers TYPE string;
            DEFINE FIELD created_at ON waivers TYPE datetime;
            DEFINE INDEX idx_waiver_id ON waivers FIELDS waiver_id UNIQUE;
            DEFINE INDEX idx_waiver_release ON waivers FIELDS release_id;
        "#;

        self.db
            .query(schema)
            .await
            .map_err(|e| StorageError::SchemaSetup(e.to_string()))?;

        debug!("Schema initialized successfully");
        Ok(())
    }

    // ========== Artifact / Revision Operations ==========

    /// Insert a new artifact record.
    #[instrument(skip(self, artifact), fields(artifact_id = %artifact.artifact_id))]
    pub async fn artifact_insert(&self, artifact: &Artifact) -> StorageResult<Artifact> {
        debug!("Inserting artifact");

        let record = DbArtifact::from_artifact(artifact);
        let created: Option<DbArtifact> = self.db.create("artifacts").content(record).await?;

        created
            .ok_or_else(|| StorageError::Backend("failed to create artifact record".to_string()))?
            .into_artifact()
    }

    /// Get an artifact by id.
    #[instrument(skip(self))]
    pub async fn artifact_get(&self, artifact_id: &Uuid) -> StorageResult<Artifact> {
        let id_owned = artifact_id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM artifacts WHERE artifact_id = $id")
            .bind(("id", id_owned))
            .await?;

        let artifacts: Vec<DbArtifact> = result.take(0)?;
        artifacts
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::NotFound {
                entity: "artifact",
                id: artifact_id.to_string(),
            })?
            .into_artifact()
    }

    /// Append a revision with the next sequence number for the artifact.
    ///
    /// Allocation is read-max-then-insert guarded by the
    /// `idx_revision_seq` unique index; a lost race retries with a fresh
    /// read, so concurrent writers still end up gapless.
    #[instrument(skip(self, new), fields(artifact_id = %artifact_id))]
    pub async fn revision_append(
        &self,
        artifact_id: &Uuid,
        new: NewRevision,
    ) -> StorageResult<Revision> {
        // Existence check up front so the caller gets NotFound, not a
        // mysterious sequence conflict.
        self.artifact_get(artifact_id).await?;

        for _ in 0..SEQUENCE_RETRIES {
            let next_seq = self.next_sequence_number(artifact_id).await?;
            let revision = Revision {
                revision_id: Uuid::new_v4(),
                artifact_id: *artifact_id,
                sequence_number: next_seq,
                title: new.title.clone(),
                content: new.content.clone(),
                status: RevisionStatus::Draft,
                reason: new.reason.clone(),
                created_by: new.created_by.clone(),
                created_at: Utc::now(),
            };
            let record = DbRevision::from_revision(&revision);

            match self
                .db
                .create::<Option<DbRevision>>("revisions")
                .content(record)
                .await
            {
                Ok(Some(created)) => return created.into_revision(),
                Ok(None) => {
                    return Err(StorageError::Backend(
                        "failed to create revision record".to_string(),
                    ))
                }
                // A concurrent writer claimed this sequence number first.
                Err(e) if e.to_string().contains("idx_revision_seq") => {
                    debug!("sequence {} taken, retrying", next_seq);
                    continue;
                }
                Err(e) => return Err(StorageError::Backend(e.to_string())),
            }
        }

        Err(StorageError::SequenceConflict {
            artifact_id: artifact_id.to_string(),
        })
    }

    /// Highest allocated sequence number plus one (1 when none exist).
    async fn next_sequence_number(&self, artifact_id: &Uuid) -> StorageResult<u32> {
        let id_owned = artifact_id.to_string();

        let mut result = self
            .db
            .query("SELECT math::max(sequence_number) AS seq FROM revisions WHERE artifact_id = $id GROUP ALL")
            .bind(("id", id_owned))
            .await?;

        #[derive(Deserialize)]
        struct MaxSeq {
            seq: Option<u32>,
        }

        let rows: Vec<MaxSeq> = result.take(0)?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|r| r.seq)
            .unwrap_or(0)
            + 1)
    }

    /// Get a revision by id.
    #[instrument(skip(self))]
    pub async fn revision_get(&self, revision_id: &Uuid) -> StorageResult<Revision> {
        let id_owned = revision_id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM revisions WHERE revision_id = $id")
            .bind(("id", id_owned))
            .await?;

        let revisions: Vec<DbRevision> = result.take(0)?;
        revisions
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::NotFound {
                entity: "revision",
                id: revision_id.to_string(),
            })?
            .into_revision()
    }

    /// All revisions for an artifact, ascending sequence order.
    #[instrument(skip(self))]
    pub async fn revisions_for(&self, artifact_id: &Uuid) -> StorageResult<Vec<Revision>> {
        let id_owned = artifact_id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM revisions WHERE artifact_id = $id ORDER BY sequence_number ASC")
            .bind(("id", id_owned))
            .await?;

        let revisions: Vec<DbRevision> = result.take(0)?;
        revisions.into_iter().map(DbRevision::into_revision).collect()
    }

    /// Compare-and-swap a revision's status.
    #[instrument(skip(self), fields(revision_id = %revision_id, from = %from, to = %to))]
    pub async fn revision_update_status(
        &self,
        revision_id: &Uuid,
        from: RevisionStatus,
        to: RevisionStatus,
    ) -> StorageResult<Revision> {
        let id_owned = revision_id.to_string();

        let mut result = self
            .db
            .query("UPDATE revisions SET status = $to WHERE revision_id = $id AND status = $from RETURN AFTER")
            .bind(("id", id_owned))
            .bind(("from", from.as_str()))
            .bind(("to", to.as_str()))
            .await?;

        let updated: Vec<DbRevision> = result.take(0)?;
        match updated.into_iter().next() {
            Some(revision) => revision.into_revision(),
            None => {
                // Distinguish "gone" from "someone moved it first".
                self.revision_get(revision_id).await?;
                Err(StorageError::StaleStatus {
                    revision_id: revision_id.to_string(),
                    expected: from.to_string(),
                })
            }
        }
    }

    // ========== Decision Operations ==========

    /// Insert a decision, enforcing the unique decision-tuple index.
    #[instrument(
        skip(self, decision),
        fields(object_type = %decision.object_type, object_id = %decision.object_id, step = decision.step)
    )]
    pub async fn decision_insert(
        &self,
        decision: &ApprovalDecision,
    ) -> StorageResult<ApprovalDecision> {
        debug!("Inserting decision");

        let record = DbDecision::from_decision(decision);

        match self
            .db
            .create::<Option<DbDecision>>("decisions")
            .content(record)
            .await
        {
            Ok(Some(created)) => created.into_decision(),
            Ok(None) => Err(StorageError::Backend(
                "failed to create decision record".to_string(),
            )),
            Err(e) if e.to_string().contains("idx_decision_key") => {
                Err(StorageError::DuplicateDecision {
                    object_type: decision.object_type.to_string(),
                    object_id: decision.object_id.clone(),
                    step: decision.step,
                    approver_id: decision.approver_id.clone(),
                })
            }
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    /// All decisions for an object, newest first.
    #[instrument(skip(self))]
    pub async fn decisions_for(
        &self,
        object_type: ObjectType,
        object_id: &str,
    ) -> StorageResult<Vec<ApprovalDecision>> {
        let id_owned = object_id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM decisions WHERE object_type = $object_type AND object_id = $object_id ORDER BY decided_at DESC")
            .bind(("object_type", object_type.as_str()))
            .bind(("object_id", id_owned))
            .await?;

        let decisions: Vec<DbDecision> = result.take(0)?;
        decisions.into_iter().map(DbDecision::into_decision).collect()
    }

    /// All decisions for one step of an object, newest first.
    #[instrument(skip(self))]
    pub async fn decisions_for_step(
        &self,
        object_type: ObjectType,
        object_id: &str,
        step: u32,
    ) -> StorageResult<Vec<ApprovalDecision>> {
        let id_owned = object_id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM decisions WHERE object_type = $object_type AND object_id = $object_id AND step = $step ORDER BY decided_at DESC")
            .bind(("object_type", object_type.as_str()))
            .bind(("object_id", id_owned))
            .bind(("step", step))
            .await?;

        let decisions: Vec<DbDecision> = result.take(0)?;
        decisions.into_iter().map(DbDecision::into_decision).collect()
    }

    // ========== Release / Baseline Operations ==========

    /// Insert a release record.
    #[instrument(skip(self, release), fields(release_id = %release.release_id, name = %release.name))]
    pub async fn release_insert(&self, release: &Release) -> StorageResult<Release> {
        debug!("Inserting release");

        let record = DbRelease::from_release(release);
        let created: Option<DbRelease> = self.db.create("releases").content(record).await?;

        created
            .ok_or_else(|| StorageError::Backend("failed to create release record".to_string()))?
            .into_release()
    }

    /// Get a release by id.
    #[instrument(skip(self))]
    pub async fn release_get(&self, release_id: &Uuid) -> StorageResult<Release> {
        let id_owned = release_id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM releases WHERE release_id = $id")
            .bind(("id", id_owned))
            .await?;

        let releases: Vec<DbRelease> = result.take(0)?;
        releases
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::NotFound {
                entity: "release",
                id: release_id.to_string(),
            })?
            .into_release()
    }

    /// Set a release's status.
    #[instrument(skip(self), fields(release_id = %release_id, status = %status))]
    pub async fn release_update_status(
        &self,
        release_id: &Uuid,
        status: ReleaseStatus,
    ) -> StorageResult<Release> {
        let id_owned = release_id.to_string();

        let mut result = self
            .db
            .query("UPDATE releases SET status = $status WHERE release_id = $id RETURN AFTER")
            .bind(("id", id_owned))
            .bind(("status", status.as_str()))
            .await?;

        let updated: Vec<DbRelease> = result.take(0)?;
        updated
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::NotFound {
                entity: "release",
                id: release_id.to_string(),
            })?
            .into_release()
    }

    /// Append items to a release's frozen baseline.
    #[instrument(skip(self, items), fields(release_id = %release_id, count = items.len()))]
    pub async fn baseline_add(
        &self,
        release_id: &Uuid,
        items: Vec<BaselineItem>,
    ) -> StorageResult<()> {
        self.release_get(release_id).await?;

        let offset = self.baseline_for(release_id).await?.len() as u32;
        for (i, item) in items.into_iter().enumerate() {
            let record = DbBaselineItem {
                release_id: item.release_id.to_string(),
                target_type: item.target_type,
                target_id: item.target_id,
                position: offset + i as u32,
            };
            let _created: Option<DbBaselineItem> =
                self.db.create("baseline_items").content(record).await?;
        }
        Ok(())
    }

    /// The frozen baseline of a release, in freeze order.
    #[instrument(skip(self))]
    pub async fn baseline_for(&self, release_id: &Uuid) -> StorageResult<Vec<BaselineItem>> {
        self.release_get(release_id).await?;

        let id_owned = release_id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM baseline_items WHERE release_id = $id ORDER BY position ASC")
            .bind(("id", id_owned))
            .await?;

        let items: Vec<DbBaselineItem> = result.take(0)?;
        items
            .into_iter()
            .map(|item| {
                Ok(BaselineItem {
                    release_id: parse_uuid("release_id", &item.release_id)?,
                    target_type: item.target_type,
                    target_id: item.target_id,
                })
            })
            .collect()
    }

    // ========== Waiver Operations ==========

    /// Insert a waiver record.
    #[instrument(skip(self, waiver), fields(waiver_id = %waiver.waiver_id, release_id = %waiver.release_id))]
    pub async fn waiver_insert(&self, waiver: &Waiver) -> StorageResult<Waiver> {
        debug!("Inserting waiver");

        let record = DbWaiver::from_waiver(waiver);
        let created: Option<DbWaiver> = self.db.create("waivers").content(record).await?;

        created
            .ok_or_else(|| StorageError::Backend("failed to create waiver record".to_string()))?
            .into_waiver()
    }

    /// All waivers ever issued for a release, newest first.
    #[instrument(skip(self))]
    pub async fn waivers_for_release(&self, release_id: &Uuid) -> StorageResult<Vec<Waiver>> {
        let id_owned = release_id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM waivers WHERE release_id = $id ORDER BY created_at DESC")
            .bind(("id", id_owned))
            .await?;

        let waivers: Vec<DbWaiver> = result.take(0)?;
        waivers.into_iter().map(DbWaiver::into_waiver).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_artifact() -> Artifact {
        Artifact {
            artifact_id: Uuid::new_v4(),
            project_id: "proj-1".to_string(),
            kind: ArtifactKind::TestCase,
            created_by: "alice".to_string(),
            created_at: Utc::now(),
        }
    }

    fn sample_new_revision(reason: Option<&str>) -> NewRevision {
        NewRevision {
            title: "Login flow".to_string(),
            content: "1. open page\n2. sign in".to_string(),
            reason: reason.map(str::to_string),
            created_by: "alice".to_string(),
        }
    }

    #[tokio::test]
    async fn connection_and_schema_creation() {
        let handle = SurrealHandle::setup_db().await;
        assert!(handle.is_ok(), "failed to connect: {:?}", handle.err());
    }

    #[tokio::test]
    async fn revision_sequence_starts_at_one() {
        let handle = SurrealHandle::setup_db().await.unwrap();
        let artifact = handle.artifact_insert(&sample_artifact()).await.unwrap();

        let rev1 = handle
            .revision_append(&artifact.artifact_id, sample_new_revision(None))
            .await
            .unwrap();
        let rev2 = handle
            .revision_append(&artifact.artifact_id, sample_new_revision(Some("typo fix")))
            .await
            .unwrap();

        assert_eq!(rev1.sequence_number, 1);
        assert_eq!(rev2.sequence_number, 2);
        assert_eq!(rev1.status, RevisionStatus::Draft);
    }

    #[tokio::test]
    async fn revision_append_unknown_artifact_is_not_found() {
        let handle = SurrealHandle::setup_db().await.unwrap();
        let err = handle
            .revision_append(&Uuid::new_v4(), sample_new_revision(None))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { entity: "artifact", .. }));
    }

    #[tokio::test]
    async fn status_cas_rejects_stale_writer() {
        let handle = SurrealHandle::setup_db().await.unwrap();
        let artifact = handle.artifact_insert(&sample_artifact()).await.unwrap();
        let rev = handle
            .revision_append(&artifact.artifact_id, sample_new_revision(None))
            .await
            .unwrap();

        handle
            .revision_update_status(&rev.revision_id, RevisionStatus::Draft, RevisionStatus::InReview)
            .await
            .unwrap();

        let err = handle
            .revision_update_status(&rev.revision_id, RevisionStatus::Draft, RevisionStatus::InReview)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::StaleStatus { .. }));
    }

    #[tokio::test]
    async fn duplicate_decision_fails_on_unique_index() {
        let handle = SurrealHandle::setup_db().await.unwrap();

        let decision = ApprovalDecision {
            decision_id: Uuid::new_v4(),
            object_type: ObjectType::Release,
            object_id: Uuid::new_v4().to_string(),
            step: 1,
            approver_id: "alice".to_string(),
            decision: DecisionKind::Approved,
            comment: None,
            evidence_links: vec![],
            decided_at: Utc::now(),
        };
        handle.decision_insert(&decision).await.unwrap();

        let second = ApprovalDecision {
            decision_id: Uuid::new_v4(),
            decision: DecisionKind::Rejected,
            comment: Some("changed my mind".to_string()),
            ..decision
        };
        let err = handle.decision_insert(&second).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateDecision { .. }));
    }
}
