//! Durable job metadata.
//!
//! The [`JobStore`] is the source of truth for listing and for restart
//! recovery. Updates are whole-record rewrites, so a store must only ever be
//! written by a single process.
//!
//! ## Implementations
//!
//! - [`FileJobStore`] - JSON file rewritten atomically on every `put`.
//! - [`MemoryJobStore`] - process-local table, for tests and embedding.

mod file;
mod memory;

pub use file::FileJobStore;
pub use memory::MemoryJobStore;

use crate::error::{Error, Result};
use crate::job::{Job, JobId};
use std::collections::BTreeMap;

/// Reason recorded on jobs that were live when the process went away.
pub const RESTART_FAILURE: &str = "interrupted by restart";

pub trait JobStore: Send + Sync {
    /// Inserts or replaces the record for `job.id`.
    fn put(&self, job: &Job) -> Result<()>;

    /// # Errors
    ///
    /// Returns [`Error::JobNotFound`] if no record exists.
    fn get(&self, id: &JobId) -> Result<Job>;

    /// Jobs owned by `owner`, oldest first.
    fn list_by_owner(&self, owner: u64) -> Result<Vec<Job>>;

    /// Every job, oldest first.
    fn list_all(&self) -> Result<Vec<Job>>;

    /// Marks every job left `Pending`, `Running` or `Paused` by a previous
    /// process as `Failed`, returning how many were rewritten.
    ///
    /// Their buffers and control channels died with that process, so no
    /// resumable cursor is inferred. Sealed chunk and archive references are
    /// kept as they are.
    fn recover_on_startup(&self) -> Result<usize>;
}

/// In-memory table shared by the store implementations.
#[derive(Debug, Default)]
pub(crate) struct JobTable {
    jobs: BTreeMap<JobId, Job>,
    next_seq: u64,
}

impl JobTable {
    pub(crate) fn from_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let jobs: BTreeMap<JobId, Job> = jobs.into_iter().map(|job| (job.id.clone(), job)).collect();
        let next_seq = jobs.values().map(|job| job.created_seq).max().unwrap_or(0) + 1;
        Self { jobs, next_seq }
    }

    /// Inserts or replaces a record. A new id is given the next insertion
    /// sequence; a replacement keeps the sequence of the record it replaces.
    pub(crate) fn insert(&mut self, mut job: Job) -> Option<Job> {
        match self.jobs.get(&job.id) {
            Some(existing) => job.created_seq = existing.created_seq,
            None => {
                self.next_seq = self.next_seq.max(1);
                job.created_seq = self.next_seq;
                self.next_seq += 1;
            }
        }
        self.jobs.insert(job.id.clone(), job)
    }

    pub(crate) fn restore(&mut self, id: &JobId, previous: Option<Job>) {
        match previous {
            Some(job) => {
                self.jobs.insert(id.clone(), job);
            }
            None => {
                self.jobs.remove(id);
            }
        }
    }

    pub(crate) fn get(&self, id: &JobId) -> Result<Job> {
        self.jobs
            .get(id)
            .cloned()
            .ok_or_else(|| Error::JobNotFound { id: id.clone() })
    }

    pub(crate) fn list(&self, filter: impl Fn(&Job) -> bool) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.values().filter(|j| filter(j)).cloned().collect();
        jobs.sort_by(|a, b| a.creation_key().cmp(&b.creation_key()));
        jobs
    }

    /// Applies restart recovery in place and returns the rewritten ids.
    pub(crate) fn recover(&mut self) -> Vec<JobId> {
        let mut recovered = Vec::new();
        for job in self.jobs.values_mut().filter(|j| j.status.is_live()) {
            if job.fail(RESTART_FAILURE).is_ok() {
                recovered.push(job.id.clone());
            }
        }
        recovered
    }

    /// Reverts the given jobs to `snapshot` after a failed persist.
    pub(crate) fn revert(&mut self, snapshot: Vec<Job>) {
        for job in snapshot {
            self.jobs.insert(job.id.clone(), job);
        }
    }

    pub(crate) fn snapshot(&self, ids: &[JobId]) -> Vec<Job> {
        ids.iter().filter_map(|id| self.jobs.get(id).cloned()).collect()
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }
}
