//! Classifier abstraction and mock implementation

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{ClassProbabilityVector, ImageTensor, InferenceError, TractClassifier};

/// Image classifier scoring the behavior classes for one frame
pub trait BehaviorClassifier: Send {
    /// Input (width, height) the model expects
    fn input_size(&self) -> (u32, u32);

    /// Score one preprocessed frame
    fn predict(&mut self, input: &ImageTensor) -> Result<ClassProbabilityVector, InferenceError>;
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// ONNX model path; the mock classifier is used when unset
    pub model_path: Option<PathBuf>,
    /// Model input width
    pub input_width: u32,
    /// Model input height
    pub input_height: u32,
    /// Scores the mock classifier returns for every frame
    pub mock_scores: ClassProbabilityVector,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            input_width: 224,
            input_height: 224,
            // SafeDriving
            mock_scores: [0.02, 0.02, 0.02, 0.9, 0.02, 0.02],
        }
    }
}

/// Load the configured classifier.
///
/// Model loading runs on the blocking pool; the returned future resolves once
/// the model is ready or has failed to load.
pub async fn load_classifier(
    config: &ClassifierConfig,
) -> Result<Box<dyn BehaviorClassifier>, InferenceError> {
    match &config.model_path {
        Some(path) => {
            let classifier =
                TractClassifier::load(path.clone(), config.input_width, config.input_height)
                    .await?;
            Ok(Box::new(classifier))
        }
        None => {
            warn!("No classifier model path configured. Using mock implementation.");
            Ok(Box::new(
                MockClassifier::constant(config.mock_scores)
                    .with_input_size(config.input_width, config.input_height),
            ))
        }
    }
}

/// Scripted classifier: returns the given vectors in order, cycling
#[derive(Debug, Clone)]
pub struct MockClassifier {
    script: Vec<ClassProbabilityVector>,
    position: usize,
    input_size: (u32, u32),
}

impl MockClassifier {
    /// Create a mock that replays `script` in a loop
    ///
    /// # Panics
    /// Panics if `script` is empty.
    pub fn scripted(script: Vec<ClassProbabilityVector>) -> Self {
        assert!(!script.is_empty(), "Mock script must not be empty");
        info!("Creating mock classifier with {} scripted outputs", script.len());
        Self {
            script,
            position: 0,
            input_size: (224, 224),
        }
    }

    /// Create a mock that always returns `scores`
    pub fn constant(scores: ClassProbabilityVector) -> Self {
        Self::scripted(vec![scores])
    }

    /// Override the reported input size
    pub fn with_input_size(mut self, width: u32, height: u32) -> Self {
        self.input_size = (width, height);
        self
    }
}

impl BehaviorClassifier for MockClassifier {
    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn predict(&mut self, input: &ImageTensor) -> Result<ClassProbabilityVector, InferenceError> {
        if input.dimensions() != self.input_size {
            return Err(InferenceError::InvalidInputShape {
                expected: format!("{:?}", self.input_size),
                actual: format!("{:?}", input.dimensions()),
            });
        }

        let scores = self.script[self.position];
        self.position = (self.position + 1) % self.script.len();
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn tensor(size: usize) -> ImageTensor {
        ImageTensor::from_array(Array4::zeros((1, size, size, 3))).unwrap()
    }

    #[test]
    fn test_scripted_mock_cycles() {
        let mut mock = MockClassifier::scripted(vec![
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
        ]);
        let input = tensor(224);

        assert_eq!(mock.predict(&input).unwrap()[0], 1.0);
        assert_eq!(mock.predict(&input).unwrap()[1], 1.0);
        assert_eq!(mock.predict(&input).unwrap()[0], 1.0);
    }

    #[test]
    fn test_mock_checks_input_size() {
        let mut mock = MockClassifier::constant([0.0; 6]);
        assert!(matches!(
            mock.predict(&tensor(100)),
            Err(InferenceError::InvalidInputShape { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_without_model_path_uses_mock() {
        let config = ClassifierConfig::default();
        let mut classifier = load_classifier(&config).await.unwrap();
        assert_eq!(classifier.input_size(), (224, 224));

        let scores = classifier.predict(&tensor(224)).unwrap();
        assert_eq!(scores, config.mock_scores);
    }

    #[tokio::test]
    async fn test_load_missing_model_fails() {
        let config = ClassifierConfig {
            model_path: Some(PathBuf::from("/nonexistent/behavior.onnx")),
            ..Default::default()
        };
        let result = load_classifier(&config).await;
        assert!(matches!(result, Err(InferenceError::ModelLoad(_))));
    }
}
