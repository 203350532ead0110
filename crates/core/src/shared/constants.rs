/// Environment variable that overrides the recognition service base URL.
pub const API_URL_ENV: &str = "FACE_ENROLL_API_URL";

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Label reported when the service finds no match at all.
pub const UNKNOWN_LABEL: &str = "Unknown";

pub const CAPTURE_FILE_PREFIX: &str = "capture_";
pub const CAPTURE_MIME_TYPE: &str = "image/png";
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const SETTINGS_DIR_NAME: &str = "FaceEnroll";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
