//! Media source selection

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use camera_capture::MediaSource;
use serde::Serialize;
use tracing::info;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SwitchResponse {
    pub status: &'static str,
    pub kind: &'static str,
}

/// Queue a source switch; the monitor applies it between frames
pub async fn switch_source(
    State(state): State<Arc<AppState>>,
    Json(source): Json<MediaSource>,
) -> ApiResult<(StatusCode, Json<SwitchResponse>)> {
    let kind = source.kind();
    info!("Source switch requested: {}", kind);
    state.monitor.switch_source(source).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SwitchResponse {
            status: "switching",
            kind,
        }),
    ))
}
