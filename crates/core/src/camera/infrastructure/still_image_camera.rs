use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::camera::domain::camera_device::{CameraDevice, MediaTrack, TrackKind};
use crate::camera::domain::camera_error::CameraError;
use crate::shared::frame::Frame;

/// Virtual camera that streams a single image file as a live video track.
///
/// Lets headless hosts and demos drive the capture workflow without real
/// hardware. The file is decoded on every `acquire`, so edits between
/// sessions are picked up.
pub struct StillImageCamera {
    path: PathBuf,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CameraDevice for StillImageCamera {
    fn acquire(&mut self) -> Result<Vec<Box<dyn MediaTrack>>, CameraError> {
        let img = image::open(&self.path).map_err(|e| match e {
            image::ImageError::IoError(io) if io.kind() == ErrorKind::PermissionDenied => {
                CameraError::PermissionDenied
            }
            other => CameraError::DeviceUnavailable(format!("{}: {other}", self.path.display())),
        })?;
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        log::debug!(
            "Still image camera opened {} ({width}x{height})",
            self.path.display()
        );

        let track: Box<dyn MediaTrack> = Box::new(StillImageTrack {
            pixels: Arc::new(rgb.into_raw()),
            width,
            height,
            sequence: 0,
            live: true,
        });
        Ok(vec![track])
    }
}

struct StillImageTrack {
    pixels: Arc<Vec<u8>>,
    width: u32,
    height: u32,
    sequence: u64,
    live: bool,
}

impl MediaTrack for StillImageTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn grab(&mut self) -> Result<Frame, CameraError> {
        if !self.live {
            return Err(CameraError::Capture("track stopped".into()));
        }
        let frame = Frame::new(
            self.pixels.as_ref().clone(),
            self.width,
            self.height,
            self.sequence,
        );
        self.sequence += 1;
        Ok(frame)
    }

    fn stop(&mut self) {
        self.live = false;
    }

    fn is_live(&self) -> bool {
        self.live
    }
}
