use super::{JobStore, JobTable};
use crate::error::Result;
use crate::job::{Job, JobId};
use parking_lot::Mutex;

/// Process-local job store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryJobStore {
    table: Mutex<JobTable>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with existing records, e.g. to simulate a restart.
    pub fn with_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        Self {
            table: Mutex::new(JobTable::from_jobs(jobs)),
        }
    }
}

impl JobStore for MemoryJobStore {
    fn put(&self, job: &Job) -> Result<()> {
        self.table.lock().insert(job.clone());
        Ok(())
    }

    fn get(&self, id: &JobId) -> Result<Job> {
        self.table.lock().get(id)
    }

    fn list_by_owner(&self, owner: u64) -> Result<Vec<Job>> {
        Ok(self.table.lock().list(|job| job.owner == owner))
    }

    fn list_all(&self) -> Result<Vec<Job>> {
        Ok(self.table.lock().list(|_| true))
    }

    fn recover_on_startup(&self) -> Result<usize> {
        Ok(self.table.lock().recover().len())
    }
}
