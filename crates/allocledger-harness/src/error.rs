use allocledger_core::RegistryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("registry: {0}")]
    Registry(#[from] RegistryError),
    #[error("allocation of {size} bytes failed")]
    AllocationFailed { size: usize },
    #[error("stress worker {thread} panicked")]
    WorkerPanicked { thread: usize },
    #[error("{failed} of {total} checks failed")]
    CheckFailed { failed: usize, total: usize },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
