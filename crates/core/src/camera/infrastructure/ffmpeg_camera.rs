use std::io::ErrorKind;

use crate::camera::domain::camera_device::{CameraDevice, MediaTrack, TrackKind};
use crate::camera::domain::camera_error::CameraError;
use crate::shared::frame::Frame;

#[cfg(target_os = "linux")]
const DEFAULT_INPUT_FORMAT: &str = "video4linux2,v4l2";
#[cfg(target_os = "macos")]
const DEFAULT_INPUT_FORMAT: &str = "avfoundation";
#[cfg(target_os = "windows")]
const DEFAULT_INPUT_FORMAT: &str = "dshow";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const DEFAULT_INPUT_FORMAT: &str = "";

/// Platform capture device opened through libavdevice.
///
/// `device` is whatever the platform input format expects:
/// `/dev/video0` for v4l2, `"0"` for avfoundation, `video=<name>` for dshow.
pub struct FfmpegCamera {
    device: String,
    input_format: String,
}

impl FfmpegCamera {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            input_format: DEFAULT_INPUT_FORMAT.to_string(),
        }
    }

    pub fn with_input_format(mut self, format: impl Into<String>) -> Self {
        self.input_format = format.into();
        self
    }

    fn find_format(&self) -> Result<ffmpeg_next::format::Format, CameraError> {
        ffmpeg_next::device::input::video()
            .find(|f| f.name() == self.input_format)
            .ok_or_else(|| {
                CameraError::DeviceUnavailable(format!(
                    "input format '{}' not available",
                    self.input_format
                ))
            })
    }
}

impl CameraDevice for FfmpegCamera {
    fn acquire(&mut self) -> Result<Vec<Box<dyn MediaTrack>>, CameraError> {
        ffmpeg_next::init().map_err(|e| CameraError::DeviceUnavailable(e.to_string()))?;

        let format = self.find_format()?;
        let ictx = ffmpeg_next::format::open_with(
            &self.device,
            &format,
            ffmpeg_next::Dictionary::new(),
        )
        .map_err(|e| map_open_error(&self.device, e))?
        .input();

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CameraError::DeviceUnavailable("no video stream".into()))?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| CameraError::DeviceUnavailable(e.to_string()))?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(|e| CameraError::DeviceUnavailable(e.to_string()))?;

        let width = decoder.width();
        let height = decoder.height();
        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| CameraError::DeviceUnavailable(e.to_string()))?;

        log::info!("Opened camera {} ({width}x{height})", self.device);
        let track: Box<dyn MediaTrack> = Box::new(FfmpegVideoTrack {
            live: Some(LiveStream {
                ictx,
                decoder,
                scaler,
                stream_index,
            }),
            width,
            height,
            sequence: 0,
        });
        Ok(vec![track])
    }
}

fn map_open_error(device: &str, err: ffmpeg_next::Error) -> CameraError {
    if let ffmpeg_next::Error::Other { errno } = err {
        if std::io::Error::from_raw_os_error(errno).kind() == ErrorKind::PermissionDenied {
            return CameraError::PermissionDenied;
        }
    }
    CameraError::DeviceUnavailable(format!("{device}: {err}"))
}

struct LiveStream {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
}

struct FfmpegVideoTrack {
    live: Option<LiveStream>,
    width: u32,
    height: u32,
    sequence: u64,
}

// Safety: a track is owned by exactly one CameraSession and only touched
// from the thread currently holding that session.
unsafe impl Send for FfmpegVideoTrack {}

impl MediaTrack for FfmpegVideoTrack {
    fn kind(&self) -> TrackKind {
        TrackKind::Video
    }

    fn grab(&mut self) -> Result<Frame, CameraError> {
        let (width, height) = (self.width, self.height);
        let stream = self
            .live
            .as_mut()
            .ok_or_else(|| CameraError::Capture("track stopped".into()))?;

        for (packet_stream, packet) in stream.ictx.packets() {
            if packet_stream.index() != stream.stream_index {
                continue;
            }
            if stream.decoder.send_packet(&packet).is_err() {
                continue;
            }
            let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
            if stream.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
                stream
                    .scaler
                    .run(&decoded, &mut rgb)
                    .map_err(|e| CameraError::Capture(e.to_string()))?;
                let frame = Frame::new(
                    extract_rgb_pixels(&rgb, width, height),
                    width,
                    height,
                    self.sequence,
                );
                self.sequence += 1;
                return Ok(frame);
            }
        }
        Err(CameraError::Capture("device stopped delivering frames".into()))
    }

    fn stop(&mut self) {
        // Dropping the input context closes the device handle.
        self.live = None;
    }

    fn is_live(&self) -> bool {
        self.live.is_some()
    }
}

/// Strips per-row stride padding into a tightly packed RGB buffer.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
