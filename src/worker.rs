//! Background export jobs.
//!
//! Per-frame quantization is the dominant cost of GIF and mobile exports,
//! so callers that must stay responsive run them through [`spawn_export`].
//! The job runs on its own named thread with its own buffers; the returned
//! [`ExportJob`] can be cancelled and joined.
//!
//! Cancellation is cooperative: exporters call [`CancelToken::check`]
//! between frames and bail out with [`ExportError::Cancelled`], discarding
//! whatever they had built.

use crate::export::ExportError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, info};

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<(), ExportError> {
        if self.is_cancelled() {
            Err(ExportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Handle to an export running on a background thread.
pub struct ExportJob<T> {
    name: String,
    cancel: CancelToken,
    handle: JoinHandle<Result<T, ExportError>>,
}

impl<T> ExportJob<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the job to stop at its next frame boundary.
    pub fn cancel(&self) {
        debug!(job = %self.name, "cancel requested");
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the job ends.
    ///
    /// A job that was cancelled reports [`ExportError::Cancelled`] even if it
    /// managed to finish, so callers never act on output they abandoned.
    pub fn wait(self) -> Result<T, ExportError> {
        let result = self
            .handle
            .join()
            .map_err(|_| ExportError::Encoder(format!("export job '{}' panicked", self.name)))?;
        if self.cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        result
    }
}

/// Run `job` on a dedicated thread named after the export.
pub fn spawn_export<T, F>(name: &str, job: F) -> Result<ExportJob<T>, ExportError>
where
    T: Send + 'static,
    F: FnOnce(CancelToken) -> Result<T, ExportError> + Send + 'static,
{
    let cancel = CancelToken::new();
    let token = cancel.clone();
    let handle = std::thread::Builder::new()
        .name(format!("export-{name}"))
        .spawn(move || job(token))?;
    info!(job = name, "export started");
    Ok(ExportJob {
        name: name.to_string(),
        cancel,
        handle,
    })
}
