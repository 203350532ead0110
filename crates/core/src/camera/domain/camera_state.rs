use std::fmt;

/// Lifecycle of a [`CameraSession`](super::camera_session::CameraSession).
///
/// `Failed` is transient: a session never rests there, it falls back to
/// `Idle` immediately so the caller can retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    Idle,
    Requesting,
    Streaming,
    Failed,
}

impl fmt::Display for CameraState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraState::Idle => write!(f, "idle"),
            CameraState::Requesting => write!(f, "requesting"),
            CameraState::Streaming => write!(f, "streaming"),
            CameraState::Failed => write!(f, "failed"),
        }
    }
}
