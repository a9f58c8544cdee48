//! Published monitor state

use std::sync::Arc;

use camera_capture::VideoFrame;
use chrono::{DateTime, Utc};
use dms::{DecisionResult, FaceBox, PipelinePhase, StatusLabel};
use serde::Serialize;

/// Point-in-time view of the monitor, published after every loop step
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub phase: PipelinePhase,
    /// Label text for display: behavior name, loading or error status
    pub status: String,
    pub confidence: f32,
    pub alerting: bool,
    pub decision: Option<DecisionResult>,
    pub face: Option<FaceBox>,
    /// Description of the active source
    pub source: Option<String>,
    /// Why the last source could not be opened or read
    pub source_error: Option<String>,
    pub load_error: Option<String>,
    pub frames_processed: u64,
    pub frames_classified: u64,
    pub history_len: usize,
    pub updated_at: DateTime<Utc>,
    /// Most recent frame, for overlay rendering
    #[serde(skip)]
    pub frame: Option<Arc<VideoFrame>>,
}

impl MonitorSnapshot {
    /// State before the classifier load resolves
    pub fn loading() -> Self {
        Self {
            phase: PipelinePhase::Uninitialized,
            status: StatusLabel::Loading.text().to_string(),
            confidence: 0.0,
            alerting: false,
            decision: None,
            face: None,
            source: None,
            source_error: None,
            load_error: None,
            frames_processed: 0,
            frames_classified: 0,
            history_len: 0,
            updated_at: Utc::now(),
            frame: None,
        }
    }
}

impl Default for MonitorSnapshot {
    fn default() -> Self {
        Self::loading()
    }
}
