use crate::jobs::JobStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("illegal status transition for job {id}: {from} -> {to}")]
    IllegalTransition {
        id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("job {id} is terminal ({status}), payload writes are closed")]
    TerminalJob { id: String, status: JobStatus },
}

impl StoreError {
    /// Whether the underlying store itself was unavailable, as opposed to a
    /// state-machine rejection. Unavailable errors are retryable at the
    /// worker loop level (leave the message unacked).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::Fjall(_) | StoreError::Io(_) | StoreError::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
