//! Face detection for the overlay box

use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use tract_onnx::prelude::*;

use crate::{DmsError, FaceDetectorConfig, FaceModelMode};

/// Face rectangle in normalized (0-1) frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x_center: f32,
    pub y_center: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceBox {
    /// Pixel rectangle (left, top, width, height) clipped to the frame
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
        let fw = frame_width as f32;
        let fh = frame_height as f32;
        let left = ((self.x_center - self.width / 2.0) * fw).clamp(0.0, fw);
        let top = ((self.y_center - self.height / 2.0) * fh).clamp(0.0, fh);
        let right = ((self.x_center + self.width / 2.0) * fw).clamp(0.0, fw);
        let bottom = ((self.y_center + self.height / 2.0) * fh).clamp(0.0, fh);

        let width = (right - left).round() as u32;
        let height = (bottom - top).round() as u32;
        if width == 0 || height == 0 {
            return None;
        }
        Some((left.round() as u32, top.round() as u32, width, height))
    }
}

/// Reports zero or one face per frame
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceBox>, DmsError>;
}

/// Build the configured detector
pub fn create_face_detector(config: &FaceDetectorConfig) -> Result<Box<dyn FaceDetector>, DmsError> {
    match &config.model_path {
        Some(_) => Ok(Box::new(BlazeFaceDetector::new(config)?)),
        None => {
            warn!("No face model path configured. Face overlay disabled.");
            Ok(Box::new(NoFaceDetector))
        }
    }
}

/// Detector used when no face model is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaceDetector;

impl FaceDetector for NoFaceDetector {
    fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<FaceBox>, DmsError> {
        Ok(None)
    }
}

/// SSD anchor center in normalized coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x_center: f32,
    pub y_center: f32,
}

/// Anchor layout for a model variant: (stride, anchors per grid cell)
fn anchor_layout(mode: FaceModelMode) -> &'static [(u32, usize)] {
    match mode {
        FaceModelMode::Short => &[(8, 2), (16, 6)],
        FaceModelMode::Full => &[(4, 1)],
    }
}

/// Generate fixed-size SSD anchors, row-major per layer
pub fn generate_anchors(mode: FaceModelMode) -> Vec<Anchor> {
    let input_size = mode.input_size();
    let mut anchors = Vec::new();
    for &(stride, per_cell) in anchor_layout(mode) {
        let grid = input_size.div_ceil(stride);
        for y in 0..grid {
            for x in 0..grid {
                let anchor = Anchor {
                    x_center: (x as f32 + 0.5) / grid as f32,
                    y_center: (y as f32 + 0.5) / grid as f32,
                };
                anchors.extend(std::iter::repeat(anchor).take(per_cell));
            }
        }
    }
    anchors
}

fn sigmoid(raw: f32) -> f32 {
    1.0 / (1.0 + (-raw.clamp(-100.0, 100.0)).exp())
}

/// Decode the highest-scoring box above `min_confidence`.
///
/// `boxes` holds 16 regressor values per anchor (box center offset, size,
/// then six keypoints); `scores` holds one raw logit per anchor.
pub fn decode_best_face(
    boxes: &[f32],
    scores: &[f32],
    anchors: &[Anchor],
    input_size: u32,
    min_confidence: f32,
) -> Option<FaceBox> {
    let scale = input_size as f32;
    let mut best: Option<(usize, f32)> = None;
    for (i, &raw) in scores.iter().enumerate().take(anchors.len()) {
        let score = sigmoid(raw);
        if score >= min_confidence && best.map_or(true, |(_, s)| score > s) {
            best = Some((i, score));
        }
    }

    let (i, confidence) = best?;
    let regressors = boxes.get(i * 16..i * 16 + 4)?;
    let anchor = anchors[i];
    Some(FaceBox {
        x_center: regressors[0] / scale + anchor.x_center,
        y_center: regressors[1] / scale + anchor.y_center,
        width: regressors[2] / scale,
        height: regressors[3] / scale,
        confidence,
    })
}

/// BlazeFace detector running on tract
pub struct BlazeFaceDetector {
    model: TypedRunnableModel<TypedModel>,
    mode: FaceModelMode,
    min_confidence: f32,
    anchors: Vec<Anchor>,
}

impl BlazeFaceDetector {
    pub fn new(config: &FaceDetectorConfig) -> Result<Self, DmsError> {
        let path = config
            .model_path
            .as_ref()
            .ok_or_else(|| DmsError::Config("face model path is required".into()))?;
        let size = config.mode.input_size() as usize;
        info!("Loading face detection model from {}", path.display());

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec!(1, size, size, 3)),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                error!("Failed to load face model: {}", e);
                DmsError::ModelLoad(e.to_string())
            })?;

        Ok(Self {
            model,
            mode: config.mode,
            min_confidence: config.min_confidence,
            anchors: generate_anchors(config.mode),
        })
    }

    fn build_input(&self, frame: &VideoFrame) -> Result<Tensor, DmsError> {
        let size = self.mode.input_size();
        let img = frame
            .to_image()
            .ok_or_else(|| DmsError::ImageProcessing("Failed to create image buffer".into()))?;
        let resized = image::imageops::resize(&img, size, size, image::imageops::FilterType::Triangle);

        // BlazeFace expects -1..1 normalization, NHWC
        let values: Vec<f32> = resized
            .into_raw()
            .into_iter()
            .map(|v| v as f32 / 127.5 - 1.0)
            .collect();
        Tensor::from_shape(&[1, size as usize, size as usize, 3], &values)
            .map_err(|e| DmsError::ImageProcessing(e.to_string()))
    }
}

impl FaceDetector for BlazeFaceDetector {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<FaceBox>, DmsError> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| DmsError::Inference(e.to_string()))?;

        // Regressors end in 16 values per anchor, classificators in 1
        let mut boxes = None;
        let mut scores = None;
        for output in outputs.iter() {
            let view = output
                .to_array_view::<f32>()
                .map_err(|e| DmsError::Inference(e.to_string()))?;
            match view.shape().last().copied() {
                Some(16) => boxes = Some(view.iter().copied().collect::<Vec<f32>>()),
                Some(1) => scores = Some(view.iter().copied().collect::<Vec<f32>>()),
                _ => {}
            }
        }

        let (Some(boxes), Some(scores)) = (boxes, scores) else {
            return Err(DmsError::Inference(
                "face model outputs do not match BlazeFace layout".into(),
            ));
        };

        let face = decode_best_face(
            &boxes,
            &scores,
            &self.anchors,
            self.mode.input_size(),
            self.min_confidence,
        );
        debug!("Face detection: {:?}", face);
        Ok(face)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_counts() {
        assert_eq!(generate_anchors(FaceModelMode::Short).len(), 896);
        assert_eq!(generate_anchors(FaceModelMode::Full).len(), 2304);
    }

    #[test]
    fn test_first_anchor_center() {
        let anchors = generate_anchors(FaceModelMode::Short);
        assert_eq!(anchors[0], Anchor { x_center: 0.5 / 16.0, y_center: 0.5 / 16.0 });
        assert_eq!(anchors[0], anchors[1]);
        // First stride-16 anchor follows the 16x16x2 block
        assert_eq!(anchors[512], Anchor { x_center: 0.5 / 8.0, y_center: 0.5 / 8.0 });
    }

    #[test]
    fn test_decode_picks_best_above_threshold() {
        let anchors = vec![
            Anchor { x_center: 0.25, y_center: 0.25 },
            Anchor { x_center: 0.5, y_center: 0.5 },
        ];
        let mut boxes = vec![0.0f32; 32];
        boxes[16..20].copy_from_slice(&[12.8, -12.8, 64.0, 32.0]);
        let scores = vec![0.5, 3.0];

        let face = decode_best_face(&boxes, &scores, &anchors, 128, 0.5).unwrap();
        assert!((face.x_center - 0.6).abs() < 1e-6);
        assert!((face.y_center - 0.4).abs() < 1e-6);
        assert!((face.width - 0.5).abs() < 1e-6);
        assert!((face.height - 0.25).abs() < 1e-6);
        assert!(face.confidence > 0.95);
    }

    #[test]
    fn test_decode_below_threshold_is_none() {
        let anchors = vec![Anchor { x_center: 0.5, y_center: 0.5 }];
        let boxes = vec![0.0f32; 16];
        assert!(decode_best_face(&boxes, &[-2.0], &anchors, 128, 0.5).is_none());
    }

    #[test]
    fn test_face_box_to_pixels_clips() {
        let face = FaceBox {
            x_center: 0.9,
            y_center: 0.5,
            width: 0.4,
            height: 0.5,
            confidence: 0.9,
        };
        assert_eq!(face.to_pixels(640, 480), Some((448, 120, 192, 240)));
    }

    #[test]
    fn test_no_face_detector() {
        let frame = VideoFrame::new(vec![0; 12], 2, 2, 0, 0);
        assert_eq!(NoFaceDetector.detect(&frame).unwrap(), None);
    }

    #[test]
    fn test_missing_model_is_load_error() {
        let config = FaceDetectorConfig {
            model_path: Some("/nonexistent/face.onnx".into()),
            ..Default::default()
        };
        assert!(matches!(
            create_face_detector(&config),
            Err(DmsError::ModelLoad(_))
        ));
    }
}
