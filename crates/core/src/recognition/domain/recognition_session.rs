use std::sync::Arc;

use crate::service::domain::face_service::FaceService;
use crate::shared::cancel_token::CancelToken;
use crate::shared::constants::UNKNOWN_LABEL;
use crate::shared::workflow_error::WorkflowError;
use crate::staging::domain::capture_buffer::{CaptureBuffer, PendingSubmission};
use crate::workers::background_submission::{self, BackgroundSubmission};

/// Identifies the people in a buffer of probe images.
///
/// The buffer is left as-is afterwards so the same probes can be re-run.
pub struct RecognitionSession {
    service: Arc<dyn FaceService>,
}

impl RecognitionSession {
    pub fn new(service: Arc<dyn FaceService>) -> Self {
        Self { service }
    }

    /// Labels for the staged probes, in service order.
    ///
    /// A response with no matches yields `["Unknown"]`.
    pub fn recognize(
        &self,
        buffer: &CaptureBuffer,
        cancel: &CancelToken,
    ) -> Result<Vec<String>, WorkflowError> {
        let pending = buffer.begin_submission()?;
        self.identify(&pending, cancel)
    }

    pub fn recognize_in_background(
        self: &Arc<Self>,
        pending: PendingSubmission,
    ) -> BackgroundSubmission<Vec<String>> {
        let session = Arc::clone(self);
        background_submission::spawn(None, move |cancel| session.identify(&pending, cancel))
    }

    fn identify(
        &self,
        pending: &PendingSubmission,
        cancel: &CancelToken,
    ) -> Result<Vec<String>, WorkflowError> {
        if cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }
        let labels = self.service.recognize(pending.images())?;
        if cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }
        log::info!(
            "Recognized {} label(s) from {} probe(s)",
            labels.len(),
            pending.images().len()
        );
        Ok(normalize_labels(labels))
    }
}

fn normalize_labels(labels: Vec<String>) -> Vec<String> {
    if labels.is_empty() {
        vec![UNKNOWN_LABEL.to_string()]
    } else {
        labels
    }
}
