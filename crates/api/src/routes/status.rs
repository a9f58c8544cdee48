//! Health and decision routes

use std::sync::Arc;

use axum::{extract::State, Json};
use dms::PipelinePhase;
use monitor::MonitorSnapshot;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `degraded` when the classifier failed to load
    pub status: &'static str,
    pub timestamp: i64,
    pub version: String,
    pub uptime_seconds: u64,
    pub phase: PipelinePhase,
    pub source: Option<String>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.monitor.snapshot();
    let status = if snapshot.phase == PipelinePhase::Failed {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status,
        timestamp: chrono::Utc::now().timestamp(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        phase: snapshot.phase,
        source: snapshot.source,
    })
}

/// Current monitor snapshot
pub async fn decision(State(state): State<Arc<AppState>>) -> Json<MonitorSnapshot> {
    Json(state.monitor.snapshot())
}
