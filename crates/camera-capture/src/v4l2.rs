//! V4L2 camera source (feature `camera-v4l2`)

use std::time::Duration;

use ouroboros::self_referencing;
use tracing::{info, warn};

use crate::{now_ns, CameraConfig, CameraError, FrameSource, VideoFrame};

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

/// Live camera over V4L2, capturing RGB24 frames
pub struct V4l2Source {
    config: CameraConfig,
    state: Option<DeviceState>,
    active_width: u32,
    active_height: u32,
    sequence: u32,
}

impl V4l2Source {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            sequence: 0,
        }
    }

    /// Open the device and start streaming
    pub fn connect(&mut self) -> Result<(), CameraError> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let device = v4l::Device::with_path(&self.config.device)
            .map_err(|e| CameraError::Open(format!("{}: {}", self.config.device, e)))?;
        let mut format = device
            .format()
            .map_err(|e| CameraError::Format(e.to_string()))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(e) => {
                warn!("Failed to set format on {}: {}", self.config.device, e);
                device
                    .format()
                    .map_err(|e| CameraError::Format(e.to_string()))?
            }
        };

        if format.fourcc != v4l::FourCC::new(b"RGB3") {
            return Err(CameraError::Format(format!(
                "{} does not support RGB24 capture",
                self.config.device
            )));
        }

        if self.config.fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.fps);
            if let Err(e) = device.set_params(&params) {
                warn!("Failed to set fps on {}: {}", self.config.device, e);
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = DeviceStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|e| CameraError::Stream(e.to_string()))
            },
        }
        .try_build()?;
        self.state = Some(state);

        info!(
            "Camera {} streaming at {}x{}",
            self.config.device, self.active_width, self.active_height
        );
        Ok(())
    }
}

impl FrameSource for V4l2Source {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };
        let data = state
            .with_mut(|fields| fields.stream.next().map(|(buf, _meta)| buf.to_vec()))
            .map_err(|e| CameraError::Stream(e.to_string()))?;

        let frame = VideoFrame::from_rgb(
            data,
            self.active_width,
            self.active_height,
            now_ns(),
            self.sequence,
        )?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(Some(frame))
    }

    fn frame_interval(&self) -> Duration {
        // Capture blocks until the device delivers a frame
        Duration::ZERO
    }

    fn describe(&self) -> String {
        format!(
            "camera {} ({}x{})",
            self.config.device, self.active_width, self.active_height
        )
    }
}
