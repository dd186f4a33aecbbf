//! Error types for the batch-generation engine.
//!
//! This module defines the central [`Error`] enum, which captures every
//! reportable failure of the engine. Variants fall into two groups:
//!
//! ## Validation errors
//!
//! Raised synchronously by control-plane calls on [`JobManager`]. They never
//! mutate any state.
//!
//! - `InvalidChain`: The chain identifier is not in the supported set.
//! - `QuotaExceeded`: The requested count is outside the caller's ceiling.
//! - `JobNotFound`: No job with the given id exists in the store.
//! - `NotOwner`: The requester neither owns the job nor is an admin.
//! - `JobStateConflict`: The operation is not valid in the job's status.
//! - `InvalidConfig`: An engine configuration value is out of bounds.
//! - `ServiceShutdown`: The engine refuses new work while shutting down.
//!
//! ## Generation errors
//!
//! Raised inside a running job. They are recorded on the job (status
//! `Failed`) and never retried.
//!
//! - `StorageWriteFailure`: A chunk or archive file could not be written.
//! - `DeriverFailure`: The credential deriver failed to produce a record.
//! - `StoreFailure`: Job metadata could not be persisted or loaded.
//! - `TaskFailure`: A blocking I/O task panicked or was aborted.
//!
//! [`JobManager`]: crate::JobManager

use crate::deriver::DeriverError;
use crate::job::{JobId, JobStatus};
use std::path::PathBuf;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the batch-generation engine.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The chain identifier is not one of the supported chains.
    #[error("Unsupported chain: {chain}")]
    InvalidChain { chain: String },

    /// The requested count is outside `[min, max]` for the caller.
    #[error("Requested count {requested} is outside the allowed range {min}..={max}")]
    QuotaExceeded { requested: u64, min: u64, max: u64 },

    /// No job with this id exists.
    #[error("Job {id} not found")]
    JobNotFound { id: JobId },

    /// The requester is not allowed to act on this job.
    #[error("Job {id} is not owned by the requester")]
    NotOwner { id: JobId },

    /// The job's current status does not permit the requested operation.
    #[error("Cannot {action} job {id} while it is {status}")]
    JobStateConflict {
        id: JobId,
        status: JobStatus,
        action: &'static str,
    },

    /// A chunk or archive file could not be written.
    #[error("Storage write failed for {}: {source}", path.display())]
    StorageWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The credential deriver failed.
    #[error("Deriver failure: {0}")]
    DeriverFailure(#[from] DeriverError),

    /// Job metadata could not be persisted or loaded.
    #[error("Job store error: {context}")]
    StoreFailure { context: String },

    /// A configuration value is invalid.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The engine is shutting down and refuses new work.
    #[error("Service is shutting down")]
    ServiceShutdown,

    /// A background task panicked or was cancelled by the runtime.
    #[error("Task failure: {context}")]
    TaskFailure { context: String },
}

impl Error {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StorageWriteFailure {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn store(context: impl Into<String>) -> Self {
        Self::StoreFailure {
            context: context.into(),
        }
    }

    /// Returns `true` for errors raised by control-plane validation, which
    /// never change any state.
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidChain { .. }
                | Self::QuotaExceeded { .. }
                | Self::JobNotFound { .. }
                | Self::NotOwner { .. }
                | Self::JobStateConflict { .. }
                | Self::InvalidConfig { .. }
                | Self::ServiceShutdown
        )
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskFailure {
            context: err.to_string(),
        }
    }
}
