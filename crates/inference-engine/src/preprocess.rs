//! Frame preprocessing for the classifier

use camera_capture::VideoFrame;
use image::imageops::FilterType;
use ndarray::Array4;

use crate::InferenceError;

/// NHWC `1 x H x W x 3` float tensor with values in `[0, 1]`
#[derive(Debug, Clone)]
pub struct ImageTensor {
    data: Array4<f32>,
}

impl ImageTensor {
    /// Wrap an existing NHWC array
    pub fn from_array(data: Array4<f32>) -> Result<Self, InferenceError> {
        let shape = data.shape();
        if shape[0] != 1 || shape[3] != 3 {
            return Err(InferenceError::InvalidInputShape {
                expected: "[1, H, W, 3]".to_string(),
                actual: format!("{:?}", shape),
            });
        }
        Ok(Self { data })
    }

    /// Width and height
    pub fn dimensions(&self) -> (u32, u32) {
        let shape = self.data.shape();
        (shape[2] as u32, shape[1] as u32)
    }

    /// Tensor shape as `[1, H, W, 3]`
    pub fn shape(&self) -> [usize; 4] {
        let shape = self.data.shape();
        [shape[0], shape[1], shape[2], shape[3]]
    }

    /// Contiguous row-major values
    pub fn as_slice(&self) -> Option<&[f32]> {
        self.data.as_slice()
    }

    pub fn array(&self) -> &Array4<f32> {
        &self.data
    }
}

/// Resize a frame to the classifier input and scale pixels to `[0, 1]`
pub fn preprocess(frame: &VideoFrame, width: u32, height: u32) -> Result<ImageTensor, InferenceError> {
    let image = frame.to_image().ok_or_else(|| {
        InferenceError::ImageProcessing(format!(
            "frame buffer does not match {}x{}",
            frame.width, frame.height
        ))
    })?;

    let resized = if image.dimensions() == (width, height) {
        image
    } else {
        image::imageops::resize(&image, width, height, FilterType::Triangle)
    };

    let mut data = Array4::<f32>::zeros((1, height as usize, width as usize, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for channel in 0..3 {
            data[[0, y as usize, x as usize, channel]] = pixel[channel] as f32 / 255.0;
        }
    }

    Ok(ImageTensor { data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_shape_and_range() {
        let data: Vec<u8> = (0..640 * 480 * 3).map(|i| (i % 256) as u8).collect();
        let frame = VideoFrame::new(data, 640, 480, 0, 0);

        let tensor = preprocess(&frame, 224, 224).unwrap();
        assert_eq!(tensor.shape(), [1, 224, 224, 3]);
        assert_eq!(tensor.dimensions(), (224, 224));
        assert!(tensor.array().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_preprocess_scales_by_255() {
        let frame = VideoFrame::new([255u8, 0, 51].repeat(4), 2, 2, 0, 0);
        let tensor = preprocess(&frame, 2, 2).unwrap();
        let values = tensor.as_slice().unwrap();
        assert_eq!(values[0], 1.0);
        assert_eq!(values[1], 0.0);
        assert!((values[2] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_rejects_malformed_frame() {
        let frame = VideoFrame::new(vec![0; 7], 2, 2, 0, 0);
        assert!(matches!(
            preprocess(&frame, 2, 2),
            Err(InferenceError::ImageProcessing(_))
        ));
    }

    #[test]
    fn test_from_array_checks_layout() {
        assert!(ImageTensor::from_array(Array4::zeros((1, 4, 4, 3))).is_ok());
        assert!(ImageTensor::from_array(Array4::zeros((1, 3, 4, 4))).is_err());
    }
}
