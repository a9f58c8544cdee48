//! Synthetic frame source (`stub://` devices) for tests and demos

use std::time::Duration;

use tracing::debug;

use crate::source::interval_for_fps;
use crate::{now_ns, CameraError, FrameSource, VideoFrame};

/// Generates a moving gradient pattern
pub struct SyntheticSource {
    width: u32,
    height: u32,
    fps: u32,
    limit: Option<u64>,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, fps: u32, limit: Option<u64>) -> Self {
        debug!("Synthetic source {}x{} @ {}fps", width, height, fps);
        Self {
            width,
            height,
            fps,
            limit,
            frame_count: 0,
        }
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let pixel_count = self.width as usize * self.height as usize * 3;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        if self.limit.is_some_and(|limit| self.frame_count >= limit) {
            return Ok(None);
        }

        let frame = VideoFrame::new(
            self.generate_pixels(),
            self.width,
            self.height,
            now_ns(),
            self.frame_count as u32,
        );
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn frame_interval(&self) -> Duration {
        interval_for_fps(self.fps)
    }

    fn describe(&self) -> String {
        format!("synthetic {}x{}", self.width, self.height)
    }
}
