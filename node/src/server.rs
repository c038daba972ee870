// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::config::NodeConfig;
use crate::db;
use crate::errors::{NodeError, Result};
use crate::progress::{self, Progress};
use crate::telemetry;
use axum::{extract::State, routing::get, Json, Router};
use parking_lot::Mutex;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::sync::Arc;

/// Read-side connection for the status endpoints.
#[derive(Clone)]
pub struct StatusState {
    conn: Arc<Mutex<Connection>>,
}

impl StatusState {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn open(cfg: &NodeConfig) -> Result<Self> {
        let conn = db::open(&cfg.db_path, cfg.busy_timeout)?;
        progress::ensure_schema(&conn)?;
        Ok(Self::new(conn))
    }
}

pub fn build_router(state: StatusState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .route("/progress", get(progress_handler))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn metrics_handler() -> String {
    telemetry::get_metrics()
}

async fn progress_handler(State(state): State<StatusState>) -> std::result::Result<Json<Vec<Progress>>, NodeError> {
    let rows = tokio::task::spawn_blocking(move || progress::list(&state.conn.lock()))
        .await
        .map_err(|_| NodeError::Internal)??;
    Ok(Json(rows))
}
