//! Camera Capture Library for the Driver Monitor
//!
//! Provides the frame sources the monitoring loop reads from:
//! - Front-facing cabin camera (640x480) over V4L2 (feature `camera-v4l2`)
//! - Recorded video played back locally (animated GIF, frame directory, still image)
//! - Synthetic frames (`stub://` devices) for tests and demos
//!
//! Exactly one source is active at a time; see [`open_source`].

pub mod file;
pub mod frame;
pub mod source;
pub mod synthetic;
#[cfg(feature = "camera-v4l2")]
pub mod v4l2;

pub use file::FileSource;
pub use frame::VideoFrame;
pub use source::{open_source, FrameSource, MediaSource};
pub use synthetic::SyntheticSource;
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Source;

use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open source: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported source: {0}")]
    Unsupported(String),
}

/// Camera configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0", or "stub://name" for synthetic)
    pub device: String,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Target FPS
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::front()
    }
}

impl CameraConfig {
    /// Front-facing cabin camera (640x480 @ 15fps)
    pub fn front() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            fps: 15,
        }
    }

    /// Whether this config points at a synthetic device
    pub fn is_stub(&self) -> bool {
        self.device.starts_with("stub://")
    }
}

pub(crate) fn now_ns() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
