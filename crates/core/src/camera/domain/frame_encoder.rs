use crate::camera::domain::camera_error::CameraError;
use crate::shared::frame::Frame;

/// Turns a grabbed frame into a still image payload ready for staging.
pub trait FrameEncoder: Send {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, CameraError>;
}
