//! Casegate daemon entry point.
//!
//! Connects to SurrealDB (remote when `CASEGATE_DB_*` is set, in-memory
//! otherwise) and serves the HTTP API.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};

use casegate_core::{init_tracing, ApprovalPolicy};
use casegate_state::{
    SurrealDecisionStore, SurrealHandle, SurrealReleaseStore, SurrealRevisionStore,
    SurrealWaiverStore,
};
use casegated::{app, AppState};

#[derive(Parser, Debug)]
#[command(name = "casegated", version, about = "Casegate HTTP daemon")]
struct Args {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "CASEGATED_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Emit newline-delimited JSON log lines.
    #[arg(long, env = "CASEGATED_LOG_JSON")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs, Level::INFO);

    let handle = Arc::new(SurrealHandle::setup_from_env().await?);
    let state = AppState::new(
        Arc::new(SurrealRevisionStore::new(Arc::clone(&handle))),
        Arc::new(SurrealDecisionStore::new(Arc::clone(&handle))),
        Arc::new(SurrealReleaseStore::new(Arc::clone(&handle))),
        Arc::new(SurrealWaiverStore::new(handle)),
        ApprovalPolicy::standard(),
    );

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(event = "daemon.started", bind = %args.bind);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
