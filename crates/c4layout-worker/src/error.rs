use thiserror::Error;

/// Failures surfaced by [`LayoutWorkerClient`](crate::LayoutWorkerClient).
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("layout request {id} timed out after {timeout_ms}ms")]
    Timeout { id: String, timeout_ms: u64 },

    #[error("failed to encode or decode a worker message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("layout worker crashed: {0}")]
    WorkerCrashed(String),

    /// The engine ran and rejected the request.
    #[error("layout failed: {0}")]
    Layout(String),

    #[error("layout worker disconnected")]
    Disconnected,

    #[error("layout worker client is shut down")]
    ShutDown,
}

impl WorkerError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WorkerError::Timeout { .. })
    }
}
