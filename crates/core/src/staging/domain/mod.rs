pub mod capture_buffer;
pub mod staged_image;
