//! Alert tone, overlay snapshot and metrics exposition

use std::io::Cursor;
use std::sync::Arc;

use alerting::DEFAULT_SAMPLE_RATE;
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use image::ImageFormat;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub async fn alert_tone(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "audio/wav")],
        state.tone.to_wav(DEFAULT_SAMPLE_RATE),
    )
}

/// Last frame with the decision overlay, as PNG
pub async fn snapshot_png(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let snapshot = state.monitor.snapshot();
    let frame = snapshot
        .frame
        .ok_or_else(|| ApiError::not_found("no frame captured yet"))?;

    let image = dms::overlay::render(&frame, snapshot.decision.as_ref(), snapshot.face.as_ref())
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

/// Prometheus text exposition
pub async fn metrics(State(state): State<Arc<AppState>>) -> ApiResult<String> {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .ok_or_else(|| ApiError::not_found("metrics recorder not installed"))
}
