//! Job execution.
//!
//! [`JobManager`] is the control plane: it validates requests, owns the
//! registry of live jobs and spawns one worker task per job. Workers run the
//! generate, seal, checkpoint loop and observe pause and cancel requests at
//! chunk boundaries (cancel is also observed before every derivation).

mod control;
mod manager;
mod worker;

pub use manager::JobManager;

/// Reason recorded on jobs stopped by [`JobManager::shutdown`].
pub const SHUTDOWN_FAILURE: &str = "interrupted by shutdown";

#[cfg(test)]
mod tests;
