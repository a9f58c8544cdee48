//! Frame source abstraction and media source selection

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{CameraConfig, CameraError, FileSource, SyntheticSource, VideoFrame};

/// A source of decoded video frames.
///
/// `Ok(None)` means no frame is available (end of a recorded video, or a
/// device that has not produced one yet); it is not an error.
pub trait FrameSource: Send {
    /// Read the next frame
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError>;

    /// Nominal interval between frames
    fn frame_interval(&self) -> Duration;

    /// Human-readable description for logs and status
    fn describe(&self) -> String;
}

/// User-selectable media source. Exactly one is active at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaSource {
    /// Live camera stream
    Camera {
        #[serde(default = "default_device")]
        device: String,
        #[serde(default = "default_width")]
        width: u32,
        #[serde(default = "default_height")]
        height: u32,
        #[serde(default = "default_fps")]
        fps: u32,
    },
    /// Recorded video played back locally
    VideoFile {
        path: PathBuf,
        #[serde(default = "default_fps")]
        fps: u32,
        #[serde(default)]
        looping: bool,
    },
    /// Generated frames
    Synthetic {
        #[serde(default = "default_width")]
        width: u32,
        #[serde(default = "default_height")]
        height: u32,
        #[serde(default = "default_fps")]
        fps: u32,
        /// Stop after this many frames
        #[serde(default)]
        limit: Option<u64>,
    },
}

fn default_device() -> String {
    CameraConfig::front().device
}

fn default_width() -> u32 {
    CameraConfig::front().width
}

fn default_height() -> u32 {
    CameraConfig::front().height
}

fn default_fps() -> u32 {
    CameraConfig::front().fps
}

impl Default for MediaSource {
    fn default() -> Self {
        let camera = CameraConfig::front();
        MediaSource::Camera {
            device: camera.device,
            width: camera.width,
            height: camera.height,
            fps: camera.fps,
        }
    }
}

impl MediaSource {
    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            MediaSource::Camera { .. } => "camera",
            MediaSource::VideoFile { .. } => "video_file",
            MediaSource::Synthetic { .. } => "synthetic",
        }
    }
}

/// Largest accepted frame edge, in pixels
pub const MAX_DIMENSION: u32 = 8192;

/// Byte length of an RGB frame, rejecting empty or oversized dimensions
pub fn frame_len(width: u32, height: u32) -> Result<usize, CameraError> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(CameraError::Format(format!(
            "frame size {}x{} outside 1..={}",
            width, height, MAX_DIMENSION
        )));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(3))
        .ok_or_else(|| CameraError::Format(format!("frame size {}x{} overflows", width, height)))
}

/// Open the selected media source
pub fn open_source(source: &MediaSource) -> Result<Box<dyn FrameSource>, CameraError> {
    info!("Opening {} source", source.kind());
    match source {
        MediaSource::Camera {
            device,
            width,
            height,
            fps,
        } => {
            frame_len(*width, *height)?;
            let config = CameraConfig {
                device: device.clone(),
                width: *width,
                height: *height,
                fps: *fps,
            };
            open_camera(config)
        }
        MediaSource::VideoFile { path, fps, looping } => {
            Ok(Box::new(FileSource::open(path, *fps)?.looping(*looping)))
        }
        MediaSource::Synthetic {
            width,
            height,
            fps,
            limit,
        } => {
            frame_len(*width, *height)?;
            Ok(Box::new(SyntheticSource::new(*width, *height, *fps, *limit)))
        }
    }
}

fn open_camera(config: CameraConfig) -> Result<Box<dyn FrameSource>, CameraError> {
    if config.is_stub() {
        return Ok(Box::new(SyntheticSource::new(
            config.width,
            config.height,
            config.fps,
            None,
        )));
    }

    #[cfg(feature = "camera-v4l2")]
    {
        let mut source = crate::V4l2Source::new(config);
        source.connect()?;
        Ok(Box::new(source))
    }

    #[cfg(not(feature = "camera-v4l2"))]
    {
        Err(CameraError::Unsupported(format!(
            "camera {} requires the camera-v4l2 feature",
            config.device
        )))
    }
}

pub(crate) fn interval_for_fps(fps: u32) -> Duration {
    if fps == 0 {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(1.0 / fps as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_source_from_json() {
        let source: MediaSource =
            serde_json::from_str(r#"{"kind":"video_file","path":"/tmp/drive.gif"}"#).unwrap();
        assert_eq!(
            source,
            MediaSource::VideoFile {
                path: PathBuf::from("/tmp/drive.gif"),
                fps: 15,
                looping: false,
            }
        );

        let camera: MediaSource = serde_json::from_str(r#"{"kind":"camera"}"#).unwrap();
        assert_eq!(camera, MediaSource::default());
    }

    #[test]
    fn test_open_stub_camera() {
        let mut source = open_source(&MediaSource::Camera {
            device: "stub://cabin".to_string(),
            width: 64,
            height: 48,
            fps: 30,
        })
        .unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (64, 48));
    }

    #[test]
    fn test_frame_len_bounds() {
        assert_eq!(frame_len(640, 480).unwrap(), 640 * 480 * 3);
        assert_eq!(frame_len(MAX_DIMENSION, MAX_DIMENSION).unwrap(), 8192 * 8192 * 3);
        assert!(matches!(frame_len(0, 480), Err(CameraError::Format(_))));
        assert!(matches!(frame_len(70_000, 70_000), Err(CameraError::Format(_))));
    }

    #[test]
    fn test_open_rejects_oversized_sources() {
        let synthetic = MediaSource::Synthetic {
            width: 70_000,
            height: 70_000,
            fps: 15,
            limit: None,
        };
        assert!(matches!(open_source(&synthetic), Err(CameraError::Format(_))));

        let camera = MediaSource::Camera {
            device: "stub://cabin".to_string(),
            width: 0,
            height: 48,
            fps: 30,
        };
        assert!(matches!(open_source(&camera), Err(CameraError::Format(_))));
    }

    #[test]
    fn test_interval_for_fps() {
        assert_eq!(interval_for_fps(0), Duration::ZERO);
        assert_eq!(interval_for_fps(10), Duration::from_millis(100));
    }
}
