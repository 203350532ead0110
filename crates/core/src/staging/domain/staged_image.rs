use std::fmt;
use std::sync::Arc;

/// Identifier of a staged image, unique within the buffer that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub(crate) u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrigin {
    /// Selected from the filesystem.
    File,
    /// Grabbed from a live camera track at the given unix time (ms).
    Capture { captured_at_ms: u64 },
}

/// A pending image awaiting submission.
///
/// The payload is shared, so snapshots taken for a request are cheap and
/// cannot be mutated behind the buffer's back.
#[derive(Debug, Clone)]
pub struct StagedImage {
    id: ImageId,
    origin: ImageOrigin,
    file_name: String,
    mime_type: String,
    payload: Arc<[u8]>,
}

impl StagedImage {
    pub(crate) fn new(
        id: ImageId,
        origin: ImageOrigin,
        file_name: String,
        mime_type: String,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            id,
            origin,
            file_name,
            mime_type,
            payload: payload.into(),
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn origin(&self) -> ImageOrigin {
        self.origin
    }

    /// Name sent as the multipart file name.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Display reference for listing the image while it stays staged.
    pub fn preview(&self) -> PreviewHandle<'_> {
        PreviewHandle { image: self }
    }
}

/// Borrowed view used by presentation layers; cannot outlive the image.
#[derive(Debug, Clone, Copy)]
pub struct PreviewHandle<'a> {
    image: &'a StagedImage,
}

impl PreviewHandle<'_> {
    pub fn label(&self) -> &str {
        &self.image.file_name
    }

    pub fn byte_len(&self) -> usize {
        self.image.payload.len()
    }

    pub fn is_capture(&self) -> bool {
        matches!(self.image.origin, ImageOrigin::Capture { .. })
    }
}

impl fmt::Display for PreviewHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = if self.is_capture() { "camera" } else { "file" };
        write!(
            f,
            "{} {} ({}, {} bytes)",
            self.image.id,
            self.label(),
            source,
            self.byte_len()
        )
    }
}
