//! Driver Monitoring System (DMS)
//!
//! Turns sampled video frames into driver behavior decisions:
//! - Behavior classification on every K-th frame
//! - Moving-average smoothing over recent class scores
//! - Arg-max labeling and confidence-threshold alerting
//! - Face detection for the overlay box

pub mod behavior;
pub mod config;
pub mod decision;
pub mod detector;
pub mod overlay;
pub mod pipeline;
pub mod smoothing;

pub use behavior::BehaviorClass;
pub use config::{FaceDetectorConfig, FaceModelMode, PipelineConfig};
pub use decision::{argmax, decide, DecisionResult};
pub use detector::{create_face_detector, BlazeFaceDetector, FaceBox, FaceDetector, NoFaceDetector};
pub use pipeline::{DecisionPipeline, PipelinePhase, StatusLabel};
pub use smoothing::PredictionHistory;

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),
}
