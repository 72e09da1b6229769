//! Rescan task submission.
//!
//! The scanner only hands work off; whatever consumes [`RescanRequest`]s
//! does the per-model processing. Delivery is at-least-once, so consumers
//! must tolerate seeing the same model twice.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{Error, Result};

/// Why a model needs a rescan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescanReason {
    /// First time the model was seen.
    Added,
    /// Member files changed since the last scan.
    Changed,
}

/// One unit of per-model work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescanRequest {
    pub task_id: Uuid,
    pub library_id: i64,
    pub model_id: i64,
    pub model_path: String,
    pub reason: RescanReason,
}

impl RescanRequest {
    /// Create a request with a fresh task id.
    #[must_use]
    pub fn new(
        library_id: i64,
        model_id: i64,
        model_path: impl Into<String>,
        reason: RescanReason,
    ) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            library_id,
            model_id,
            model_path: model_path.into(),
            reason,
        }
    }
}

/// Destination for rescan tasks.
///
/// `enqueue` is called after the scan has committed, so every request
/// names a stored model. The scan still holds its library lock.
pub trait RescanQueue: Send + Sync {
    /// Submit one task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Queue`] if the task could not be accepted.
    fn enqueue(&self, request: RescanRequest) -> Result<()>;
}

impl RescanQueue for mpsc::UnboundedSender<RescanRequest> {
    fn enqueue(&self, request: RescanRequest) -> Result<()> {
        self.send(request)
            .map_err(|e| Error::queue(format!("rescan channel closed, dropped {}", e.0.model_path)))
    }
}

impl RescanQueue for crossbeam_channel::Sender<RescanRequest> {
    fn enqueue(&self, request: RescanRequest) -> Result<()> {
        self.send(request)
            .map_err(|e| Error::queue(format!("rescan channel closed, dropped {}", e.0.model_path)))
    }
}

/// Queue that keeps every request in memory.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    requests: Mutex<Vec<RescanRequest>>,
}

impl RecordingQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RescanRequest> {
        self.requests.lock().clone()
    }

    /// Remove and return every request received so far.
    pub fn take(&self) -> Vec<RescanRequest> {
        std::mem::take(&mut *self.requests.lock())
    }

    /// Number of requests received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    /// True if nothing was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }
}

impl RescanQueue for RecordingQueue {
    fn enqueue(&self, request: RescanRequest) -> Result<()> {
        self.requests.lock().push(request);
        Ok(())
    }
}
