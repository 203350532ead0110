use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::shared::constants::{CAPTURE_FILE_PREFIX, CAPTURE_MIME_TYPE, FALLBACK_MIME_TYPE};
use crate::shared::in_flight::{FlagClaim, InFlightFlag};
use crate::shared::workflow_error::WorkflowError;
use crate::staging::domain::staged_image::{ImageId, ImageOrigin, StagedImage};

/// Ordered staging area for images awaiting submission.
///
/// Insertion order is submission order. Images leave the buffer only through
/// [`CaptureBuffer::remove`], [`CaptureBuffer::clear`] or a completed
/// submission.
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    images: Vec<StagedImage>,
    next_id: u64,
    in_flight: InFlightFlag,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a user-selected file. The MIME type is derived from `name`.
    pub fn add_file(&mut self, payload: Vec<u8>, name: &str) -> Result<ImageId, WorkflowError> {
        ensure_not_empty(&payload)?;
        let id = self.issue_id();
        let file_name = if name.trim().is_empty() {
            format!("image_{}", id.0)
        } else {
            name.to_string()
        };
        let mime_type = mime_type_for(&file_name);
        self.images.push(StagedImage::new(
            id,
            ImageOrigin::File,
            file_name,
            mime_type,
            payload,
        ));
        Ok(id)
    }

    /// Stages a PNG still grabbed from a camera.
    pub fn add_capture(&mut self, payload: Vec<u8>) -> Result<ImageId, WorkflowError> {
        ensure_not_empty(&payload)?;
        let id = self.issue_id();
        let captured_at_ms = unix_millis();
        // The id suffix keeps names distinct for captures taken within the same millisecond.
        let file_name = format!("{CAPTURE_FILE_PREFIX}{captured_at_ms}_{}.png", id.0);
        self.images.push(StagedImage::new(
            id,
            ImageOrigin::Capture { captured_at_ms },
            file_name,
            CAPTURE_MIME_TYPE.to_string(),
            payload,
        ));
        Ok(id)
    }

    pub fn remove(&mut self, id: ImageId) -> Option<StagedImage> {
        let pos = self.images.iter().position(|img| img.id() == id)?;
        Some(self.images.remove(pos))
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }

    /// Immutable ordered copy of the staged images.
    pub fn snapshot(&self) -> Vec<StagedImage> {
        self.images.clone()
    }

    pub fn get(&self, id: ImageId) -> Option<&StagedImage> {
        self.images.iter().find(|img| img.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StagedImage> {
        self.images.iter()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_set()
    }

    /// Claims the buffer for one submission and snapshots its contents.
    ///
    /// Fails with `AlreadyInFlight` while another submission holds the claim
    /// and with `Validation` when nothing is staged.
    pub fn begin_submission(&self) -> Result<PendingSubmission, WorkflowError> {
        let claim = self
            .in_flight
            .try_claim()
            .ok_or_else(|| WorkflowError::AlreadyInFlight("capture buffer".into()))?;
        if self.images.is_empty() {
            return Err(WorkflowError::Validation("no images staged".into()));
        }
        Ok(PendingSubmission {
            images: self.snapshot(),
            claim,
        })
    }

    /// Drops the images a successful submission carried.
    ///
    /// Images staged while the request was pending stay in the buffer. A
    /// submission begun on another buffer is rejected and nothing is removed.
    pub fn complete(&mut self, pending: PendingSubmission) -> Result<(), WorkflowError> {
        if !self.in_flight.owns(&pending.claim) {
            return Err(WorkflowError::Validation(
                "submission belongs to another buffer".into(),
            ));
        }
        let sent: HashSet<ImageId> = pending.images.iter().map(StagedImage::id).collect();
        self.images.retain(|img| !sent.contains(&img.id()));
        Ok(())
    }

    fn issue_id(&mut self) -> ImageId {
        let id = ImageId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Snapshot of a buffer bound to its in-flight claim.
///
/// Dropping it without [`CaptureBuffer::complete`] releases the claim and
/// leaves every image staged for a retry.
#[derive(Debug)]
pub struct PendingSubmission {
    images: Vec<StagedImage>,
    claim: FlagClaim,
}

impl PendingSubmission {
    pub fn images(&self) -> &[StagedImage] {
        &self.images
    }
}

fn ensure_not_empty(payload: &[u8]) -> Result<(), WorkflowError> {
    if payload.is_empty() {
        Err(WorkflowError::Validation("image payload is empty".into()))
    } else {
        Ok(())
    }
}

fn mime_type_for(file_name: &str) -> String {
    image::ImageFormat::from_path(file_name)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| FALLBACK_MIME_TYPE.to_string())
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
