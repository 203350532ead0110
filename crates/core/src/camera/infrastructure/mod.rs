#[cfg(feature = "device-camera")]
pub mod ffmpeg_camera;
pub mod png_frame_encoder;
pub mod still_image_camera;
