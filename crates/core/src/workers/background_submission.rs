use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::shared::cancel_token::CancelToken;
use crate::shared::workflow_error::WorkflowError;

/// Lifecycle of one network exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Succeeded,
    Failed(WorkflowError),
}

/// A submission running on a worker thread.
///
/// The owner polls or waits for the outcome. Dropping the handle cancels the
/// request: the worker still finishes the exchange it started, but its result
/// is discarded.
pub struct BackgroundSubmission<T> {
    target: Option<String>,
    rx: Receiver<Result<T, WorkflowError>>,
    cancel: CancelToken,
    outcome: Option<Result<T, WorkflowError>>,
}

/// Runs `job` on its own thread. The job receives the request's cancel token.
pub fn spawn<T, F>(target: Option<String>, job: F) -> BackgroundSubmission<T>
where
    T: Send + 'static,
    F: FnOnce(&CancelToken) -> Result<T, WorkflowError> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();

    thread::spawn(move || {
        let result = job(&worker_cancel);
        let result = if worker_cancel.is_cancelled() {
            Err(WorkflowError::Cancelled)
        } else {
            result
        };
        let _ = tx.send(result);
    });

    BackgroundSubmission {
        target,
        rx,
        cancel,
        outcome: None,
    }
}

impl<T> BackgroundSubmission<T> {
    /// Person the request is about, if any.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Non-blocking status check.
    pub fn poll(&mut self) -> RequestStatus {
        if self.outcome.is_none() {
            match self.rx.try_recv() {
                Ok(result) => self.outcome = Some(result),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    self.outcome = Some(Err(WorkflowError::Cancelled));
                }
            }
        }
        self.status()
    }

    /// Blocks up to `timeout` for the outcome.
    pub fn wait_timeout(&mut self, timeout: Duration) -> RequestStatus {
        if self.outcome.is_none() {
            match self.rx.recv_timeout(timeout) {
                Ok(result) => self.outcome = Some(result),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.outcome = Some(Err(WorkflowError::Cancelled));
                }
            }
        }
        self.status()
    }

    /// Blocks until the worker reports.
    pub fn wait(mut self) -> Result<T, WorkflowError> {
        if let Some(outcome) = self.outcome.take() {
            return outcome;
        }
        self.rx.recv().unwrap_or(Err(WorkflowError::Cancelled))
    }

    /// Outcome received so far, consuming the handle.
    pub fn into_outcome(mut self) -> Option<Result<T, WorkflowError>> {
        self.outcome.take()
    }

    fn status(&self) -> RequestStatus {
        match &self.outcome {
            None => RequestStatus::Pending,
            Some(Ok(_)) => RequestStatus::Succeeded,
            Some(Err(e)) => RequestStatus::Failed(e.clone()),
        }
    }
}

impl<T> Drop for BackgroundSubmission<T> {
    fn drop(&mut self) {
        if self.outcome.is_none() {
            self.cancel.cancel();
        }
    }
}
