use std::io::Cursor;

use crate::camera::domain::camera_error::CameraError;
use crate::camera::domain::frame_encoder::FrameEncoder;
use crate::shared::frame::Frame;

/// Encodes frames as PNG using the `image` crate.
pub struct PngFrameEncoder;

impl PngFrameEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PngFrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameEncoder for PngFrameEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, CameraError> {
        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or_else(|| CameraError::Encode("frame data does not match dimensions".into()))?;

        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| CameraError::Encode(e.to_string()))?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Frame::new(data, width, height, 0)
    }

    #[test]
    fn test_output_is_png() {
        let bytes = PngFrameEncoder::new()
            .encode(&solid_frame(8, 4, [1, 2, 3]))
            .unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_decoded_pixels_match_frame() {
        let bytes = PngFrameEncoder::new()
            .encode(&solid_frame(5, 3, [50, 100, 200]))
            .unwrap();

        let img = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(img.width(), 5);
        assert_eq!(img.height(), 3);
        assert_eq!(img.get_pixel(4, 2).0, [50, 100, 200]);
    }
}
