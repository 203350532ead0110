use crate::camera::domain::camera_error::CameraError;
use crate::shared::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

/// One live track handed out by a [`CameraDevice`].
///
/// A stopped track must release its underlying handle and report
/// `is_live() == false`; `stop` on an already stopped track is a no-op.
pub trait MediaTrack: Send {
    fn kind(&self) -> TrackKind;

    /// Renders the track's current picture. Only meaningful for video tracks.
    fn grab(&mut self) -> Result<Frame, CameraError>;

    fn stop(&mut self);

    fn is_live(&self) -> bool;
}

/// Domain interface for a video capture device.
pub trait CameraDevice: Send {
    /// Requests exclusive access and returns the device's track set.
    fn acquire(&mut self) -> Result<Vec<Box<dyn MediaTrack>>, CameraError>;
}
