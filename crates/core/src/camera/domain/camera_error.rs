use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera access was denied")]
    PermissionDenied,
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("camera is not streaming")]
    NotStreaming,
    #[error("failed to grab frame: {0}")]
    Capture(String),
    #[error("failed to encode frame: {0}")]
    Encode(String),
}
