use crate::camera::domain::camera_device::{CameraDevice, MediaTrack, TrackKind};
use crate::camera::domain::camera_error::CameraError;
use crate::camera::domain::camera_state::CameraState;
use crate::camera::domain::frame_encoder::FrameEncoder;

/// Called with the new state on every transition.
pub type StateObserver = Box<dyn Fn(CameraState) + Send>;

/// Exclusive owner of one live camera stream.
///
/// Tracks are released on `stop()`, on any stream failure, and when the
/// session is dropped, so tearing down the owner never leaks the device.
pub struct CameraSession {
    device: Box<dyn CameraDevice>,
    encoder: Box<dyn FrameEncoder>,
    tracks: Vec<Box<dyn MediaTrack>>,
    state: CameraState,
    observer: Option<StateObserver>,
}

impl CameraSession {
    pub fn new(device: Box<dyn CameraDevice>, encoder: Box<dyn FrameEncoder>) -> Self {
        Self {
            device,
            encoder,
            tracks: Vec::new(),
            state: CameraState::Idle,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: StateObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    /// Number of tracks currently holding the device.
    pub fn active_tracks(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }

    /// Acquires the device. A no-op while already streaming.
    ///
    /// On failure the session passes through `Failed` and lands in `Idle`.
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.state == CameraState::Streaming {
            return Ok(());
        }
        self.transition(CameraState::Requesting);

        let mut tracks = match self.device.acquire() {
            Ok(tracks) => tracks,
            Err(e) => {
                log::warn!("Camera request failed: {e}");
                self.fail();
                return Err(e);
            }
        };

        if !tracks.iter().any(|t| t.kind() == TrackKind::Video) {
            for track in tracks.iter_mut() {
                track.stop();
            }
            self.fail();
            return Err(CameraError::DeviceUnavailable(
                "device exposes no video track".into(),
            ));
        }

        log::debug!("Camera streaming with {} track(s)", tracks.len());
        self.tracks = tracks;
        self.transition(CameraState::Streaming);
        Ok(())
    }

    /// Releases every track and returns to `Idle`. Safe from any state.
    pub fn stop(&mut self) {
        self.release_tracks();
        if self.state != CameraState::Idle {
            self.transition(CameraState::Idle);
        }
    }

    /// Renders the current video frame to an encoded still image.
    ///
    /// A track failure tears the stream down; encoder failures leave it running.
    pub fn capture_frame(&mut self) -> Result<Vec<u8>, CameraError> {
        if self.state != CameraState::Streaming {
            return Err(CameraError::NotStreaming);
        }
        let track = self
            .tracks
            .iter_mut()
            .find(|t| t.kind() == TrackKind::Video && t.is_live())
            .ok_or(CameraError::NotStreaming)?;

        let frame = match track.grab() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Camera stream lost: {e}");
                self.release_tracks();
                self.fail();
                return Err(e);
            }
        };
        self.encoder.encode(&frame)
    }

    fn fail(&mut self) {
        self.transition(CameraState::Failed);
        self.transition(CameraState::Idle);
    }

    fn release_tracks(&mut self) {
        for mut track in self.tracks.drain(..) {
            track.stop();
        }
    }

    fn transition(&mut self, next: CameraState) {
        self.state = next;
        if let Some(observer) = &self.observer {
            observer(next);
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.release_tracks();
    }
}
