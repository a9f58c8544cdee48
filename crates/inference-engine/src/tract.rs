//! ONNX classifier backed by tract

use std::path::{Path, PathBuf};

use tracing::{debug, error, info};
use tract_onnx::prelude::*;

use crate::{BehaviorClassifier, ClassProbabilityVector, ImageTensor, InferenceError, NUM_CLASSES};

type Plan = TypedRunnableModel<TypedModel>;

/// Pretrained behavior classifier (NHWC float input, one score per class)
pub struct TractClassifier {
    model: Plan,
    width: u32,
    height: u32,
}

impl TractClassifier {
    /// Load and optimize the model on the blocking pool
    pub async fn load(path: PathBuf, width: u32, height: u32) -> Result<Self, InferenceError> {
        info!("Loading behavior classifier from {}", path.display());
        let result = tokio::task::spawn_blocking(move || Self::load_blocking(&path, width, height))
            .await
            .map_err(|e| InferenceError::ModelLoad(format!("load task failed: {}", e)))?;

        match &result {
            Ok(_) => info!("Behavior classifier loaded ({}x{} input)", width, height),
            Err(e) => error!("Failed to load behavior classifier: {}", e),
        }
        result
    }

    /// Load synchronously
    pub fn load_blocking(path: &Path, width: u32, height: u32) -> Result<Self, InferenceError> {
        let model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| InferenceError::ModelLoad(format!("{}: {}", path.display(), e)))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, height as usize, width as usize, 3),
                ),
            )
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?
            .into_optimized()
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?
            .into_runnable()
            .map_err(|e| InferenceError::ModelLoad(e.to_string()))?;

        Ok(Self {
            model,
            width,
            height,
        })
    }
}

impl BehaviorClassifier for TractClassifier {
    fn input_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn predict(&mut self, input: &ImageTensor) -> Result<ClassProbabilityVector, InferenceError> {
        if input.dimensions() != (self.width, self.height) {
            return Err(InferenceError::InvalidInputShape {
                expected: format!("[1, {}, {}, 3]", self.height, self.width),
                actual: format!("{:?}", input.shape()),
            });
        }

        let values = input
            .as_slice()
            .ok_or_else(|| InferenceError::Inference("input tensor is not contiguous".into()))?;
        let tensor = Tensor::from_shape(&input.shape(), values)
            .map_err(|e| InferenceError::Inference(e.to_string()))?;

        let start = std::time::Instant::now();
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .map_err(|e| InferenceError::Inference(e.to_string()))?;
        debug!("Classifier inference took {:?}", start.elapsed());

        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::Inference("model produced no outputs".into()))?;
        let scores = output
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::Inference(e.to_string()))?;

        if scores.len() != NUM_CLASSES {
            return Err(InferenceError::InvalidOutputShape {
                expected: NUM_CLASSES,
                actual: scores.len(),
            });
        }

        let mut vector = [0.0f32; NUM_CLASSES];
        for (slot, score) in vector.iter_mut().zip(scores.iter()) {
            *slot = *score;
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_garbage_file_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.onnx");
        std::fs::write(&path, b"not a protobuf").unwrap();

        let result = TractClassifier::load(path, 224, 224).await;
        assert!(matches!(result, Err(InferenceError::ModelLoad(_))));
    }
}
