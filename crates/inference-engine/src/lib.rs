//! Behavior Classification Engine
//!
//! Wraps the pretrained driver-behavior image classifier:
//! - frame preprocessing (resize + unit-range normalization)
//! - ONNX inference using tract, loaded off the async runtime
//! - a scripted mock classifier for development and tests
//! - repair of layers-model topology files exported with `batch_shape`

mod classifier;
mod preprocess;
mod tract;
pub mod topology;

pub use classifier::{load_classifier, BehaviorClassifier, ClassifierConfig, MockClassifier};
pub use preprocess::{preprocess, ImageTensor};
pub use tract::TractClassifier;

use thiserror::Error;

/// Number of behavior classes the model scores
pub const NUM_CLASSES: usize = 6;

/// Raw per-class scores for one frame (not necessarily soft-maxed)
pub type ClassProbabilityVector = [f32; NUM_CLASSES];

/// Errors during model loading or inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoad(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },
    #[error("Invalid output shape: expected {expected} scores, got {actual}")]
    InvalidOutputShape { expected: usize, actual: usize },
    #[error("Image processing failed: {0}")]
    ImageProcessing(String),
}
