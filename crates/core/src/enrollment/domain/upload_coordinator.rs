use std::sync::Arc;

use crate::persons::domain::person_registry::PersonRegistry;
use crate::service::domain::face_service::FaceService;
use crate::shared::cancel_token::CancelToken;
use crate::shared::workflow_error::WorkflowError;
use crate::staging::domain::capture_buffer::{CaptureBuffer, PendingSubmission};
use crate::workers::background_submission::{self, BackgroundSubmission};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub person: String,
    pub image_count: usize,
}

/// Outcome of a background upload, handed back so the owning buffer can be settled.
#[derive(Debug)]
pub struct CompletedUpload {
    pending: PendingSubmission,
    receipt: UploadReceipt,
}

/// Enrolls the contents of a [`CaptureBuffer`] for one person.
///
/// One multipart request carries every staged image in buffer order. The
/// buffer is emptied only after the service accepts the request; on any
/// failure the images stay staged for a retry.
pub struct UploadCoordinator {
    service: Arc<dyn FaceService>,
    registry: Arc<PersonRegistry>,
}

impl UploadCoordinator {
    pub fn new(service: Arc<dyn FaceService>, registry: Arc<PersonRegistry>) -> Self {
        Self { service, registry }
    }

    pub fn submit(
        &self,
        person: &str,
        buffer: &mut CaptureBuffer,
        cancel: &CancelToken,
    ) -> Result<UploadReceipt, WorkflowError> {
        let pending = buffer.begin_submission()?;
        let receipt = self.send(person, &pending, cancel)?;
        buffer.complete(pending)?;
        self.registry.invalidate();
        Ok(receipt)
    }

    /// Starts the upload on a worker thread; settle it with [`UploadCoordinator::finish`].
    pub fn submit_in_background(
        self: &Arc<Self>,
        person: &str,
        pending: PendingSubmission,
    ) -> BackgroundSubmission<CompletedUpload> {
        let coordinator = Arc::clone(self);
        let person = person.to_string();
        background_submission::spawn(Some(person.clone()), move |cancel| {
            let receipt = coordinator.send(&person, &pending, cancel)?;
            Ok(CompletedUpload { pending, receipt })
        })
    }

    /// Removes the uploaded images from `buffer` and invalidates the registry.
    ///
    /// `buffer` must be the one the submission was begun on.
    pub fn finish(
        &self,
        buffer: &mut CaptureBuffer,
        completed: CompletedUpload,
    ) -> Result<UploadReceipt, WorkflowError> {
        let settled = buffer.complete(completed.pending);
        self.registry.invalidate();
        settled.map(|()| completed.receipt)
    }

    fn send(
        &self,
        person: &str,
        pending: &PendingSubmission,
        cancel: &CancelToken,
    ) -> Result<UploadReceipt, WorkflowError> {
        if person.trim().is_empty() {
            return Err(WorkflowError::Validation("person name is empty".into()));
        }
        if cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }

        let images = pending.images();
        self.service.attach_images(person, images)?;

        if cancel.is_cancelled() {
            // The service has the images; only the registry learns about it.
            self.registry.invalidate();
            return Err(WorkflowError::Cancelled);
        }
        log::info!("Uploaded {} image(s) for '{person}'", images.len());
        Ok(UploadReceipt {
            person: person.to_string(),
            image_count: images.len(),
        })
    }
}
