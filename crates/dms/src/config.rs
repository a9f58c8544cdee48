//! DMS configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{BehaviorClass, DmsError};

/// Decision pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Alert only when the winning score is strictly above this
    pub confidence_threshold: f32,

    /// Classify every K-th frame
    pub sample_interval: u32,

    /// Average scores over the recent history
    pub smoothing: bool,

    /// Smoothing window size (classified frames)
    pub history_size: usize,

    /// Classes that raise an alert
    pub dangerous_classes: Vec<BehaviorClass>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            sample_interval: 5,
            smoothing: true,
            history_size: 10,
            dangerous_classes: BehaviorClass::default_dangerous(),
        }
    }
}

impl PipelineConfig {
    /// Create strict config (alert sooner, react faster)
    pub fn strict() -> Self {
        Self {
            confidence_threshold: 0.6,
            sample_interval: 2,
            history_size: 5,
            ..Default::default()
        }
    }

    /// Create lenient config (alert later, smooth harder)
    pub fn lenient() -> Self {
        Self {
            confidence_threshold: 0.85,
            sample_interval: 10,
            history_size: 20,
            ..Default::default()
        }
    }

    /// Whether a class raises an alert
    pub fn is_dangerous(&self, class: BehaviorClass) -> bool {
        self.dangerous_classes.contains(&class)
    }

    pub fn validate(&self) -> Result<(), DmsError> {
        if self.sample_interval == 0 {
            return Err(DmsError::Config("sample_interval must be >= 1".into()));
        }
        if self.smoothing && self.history_size == 0 {
            return Err(DmsError::Config("history_size must be >= 1".into()));
        }
        if !self.confidence_threshold.is_finite() {
            return Err(DmsError::Config("confidence_threshold must be finite".into()));
        }
        Ok(())
    }
}

/// Face detection model variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceModelMode {
    /// Short-range model: faster, lower accuracy
    #[default]
    Short,
    /// Full-range model
    Full,
}

impl FaceModelMode {
    /// Square model input size
    pub fn input_size(&self) -> u32 {
        match self {
            FaceModelMode::Short => 128,
            FaceModelMode::Full => 192,
        }
    }
}

/// Face detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceDetectorConfig {
    /// Minimum detection confidence
    pub min_confidence: f32,

    /// Model variant
    pub mode: FaceModelMode,

    /// ONNX model path; detection is disabled when unset
    pub model_path: Option<PathBuf>,
}

impl Default for FaceDetectorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            mode: FaceModelMode::Short,
            model_path: None,
        }
    }
}
