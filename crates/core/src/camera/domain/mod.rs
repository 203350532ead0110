pub mod camera_device;
pub mod camera_error;
pub mod camera_session;
pub mod camera_state;
pub mod frame_encoder;
