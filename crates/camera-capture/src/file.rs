//! Recorded video playback.
//!
//! Accepts three layouts:
//! - an animated GIF, decoded up front
//! - a directory of still frames, decoded lazily in file-name order
//! - a single still image (one-frame video)

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage};
use tracing::{debug, info};

use crate::source::interval_for_fps;
use crate::{now_ns, CameraError, FrameSource, VideoFrame};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

enum Playlist {
    /// Fully decoded frames
    Decoded(Vec<VideoFrame>),
    /// Frame files decoded on demand
    Files(Vec<PathBuf>),
}

impl Playlist {
    fn len(&self) -> usize {
        match self {
            Playlist::Decoded(frames) => frames.len(),
            Playlist::Files(paths) => paths.len(),
        }
    }
}

/// Local video file source
pub struct FileSource {
    path: PathBuf,
    playlist: Playlist,
    position: usize,
    fps: u32,
    looping: bool,
    sequence: u32,
}

impl FileSource {
    /// Open a recorded video
    pub fn open(path: impl AsRef<Path>, fps: u32) -> Result<Self, CameraError> {
        let path = path.as_ref().to_path_buf();
        let playlist = if path.is_dir() {
            Playlist::Files(list_frame_files(&path)?)
        } else if has_extension(&path, "gif") {
            Playlist::Decoded(decode_gif(&path)?)
        } else if path.is_file() {
            let image = image::open(&path)?.to_rgb8();
            Playlist::Decoded(vec![VideoFrame::from_image(image, 0, 0)])
        } else {
            return Err(CameraError::Open(format!("{} does not exist", path.display())));
        };

        if playlist.len() == 0 {
            return Err(CameraError::Open(format!(
                "{} contains no decodable frames",
                path.display()
            )));
        }

        info!("Opened video {} ({} frames)", path.display(), playlist.len());
        Ok(Self {
            path,
            playlist,
            position: 0,
            fps,
            looping: false,
            sequence: 0,
        })
    }

    /// Restart from the first frame when the end is reached
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

impl FrameSource for FileSource {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        if self.position >= self.playlist.len() {
            if !self.looping {
                return Ok(None);
            }
            debug!("Looping video {}", self.path.display());
            self.position = 0;
        }

        let mut frame = match &self.playlist {
            Playlist::Decoded(frames) => frames[self.position].clone(),
            Playlist::Files(paths) => {
                let image = image::open(&paths[self.position])?.to_rgb8();
                VideoFrame::from_image(image, 0, 0)
            }
        };
        frame.timestamp_ns = now_ns();
        frame.sequence = self.sequence;

        self.position += 1;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(Some(frame))
    }

    fn frame_interval(&self) -> Duration {
        interval_for_fps(self.fps)
    }

    fn describe(&self) -> String {
        format!("video {} ({} frames)", self.path.display(), self.playlist.len())
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn list_frame_files(dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && FRAME_EXTENSIONS.iter().any(|ext| has_extension(&path, ext)) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn decode_gif(path: &Path) -> Result<Vec<VideoFrame>, CameraError> {
    let reader = BufReader::new(File::open(path)?);
    let decoder = GifDecoder::new(reader)?;
    let frames = decoder.into_frames().collect_frames()?;

    Ok(frames
        .into_iter()
        .map(|frame| {
            let rgb = DynamicImage::ImageRgba8(frame.into_buffer()).to_rgb8();
            VideoFrame::from_image(rgb, 0, 0)
        })
        .collect())
}
