use super::control::{self, JobControl};
use super::worker::JobWorker;
use crate::chain::Chain;
use crate::config::EngineConfig;
use crate::deriver::WalletDeriver;
use crate::error::{Error, Result};
use crate::job::{ChunkRef, Job, JobId, JobStatus};
use crate::output::ChunkWriter;
use crate::quota::{QuotaPolicy, Requester};
use crate::store::{FileJobStore, JobStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Control plane for batch-generation jobs.
///
/// Cloning is cheap; clones share the same registry, store and workers.
/// Control-plane calls never wait on generation: they validate against the
/// [`JobStore`] and signal the job's worker through its control channel.
///
/// Workers are spawned on the ambient Tokio runtime, so [`create`] must be
/// called from within one.
///
/// [`create`]: JobManager::create
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: EngineConfig,
    quota: QuotaPolicy,
    store: Arc<dyn JobStore>,
    deriver: Arc<dyn WalletDeriver>,
    registry: Mutex<HashMap<JobId, JobControl>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl JobManager {
    /// Builds a manager over an existing store.
    ///
    /// Restart recovery is the caller's business; see [`JobManager::open`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` does not validate.
    pub fn new<S, D>(config: EngineConfig, store: S, deriver: D) -> Result<Self>
    where
        S: JobStore + 'static,
        D: WalletDeriver + 'static,
    {
        Self::with_shared(config, Arc::new(store), Arc::new(deriver))
    }

    /// Like [`JobManager::new`], for a store or deriver that is shared with
    /// other owners.
    pub fn with_shared(
        config: EngineConfig,
        store: Arc<dyn JobStore>,
        deriver: Arc<dyn WalletDeriver>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                quota: QuotaPolicy::new(&config.quota),
                config,
                store,
                deriver,
                registry: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        })
    }

    /// Opens the file store under `config.data_dir` and fails every job a
    /// previous process left live.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] or [`Error::StoreFailure`].
    pub fn open<D>(config: EngineConfig, deriver: D) -> Result<Self>
    where
        D: WalletDeriver + 'static,
    {
        config.validate()?;
        let store = FileJobStore::open(config.store_path())?;
        let _recovered = store.recover_on_startup()?;

        #[cfg(feature = "tracing")]
        if _recovered > 0 {
            tracing::warn!("{_recovered} jobs were interrupted by a restart and marked failed");
        }

        Self::new(config, store, deriver)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn quota(&self) -> &QuotaPolicy {
        &self.inner.quota
    }

    /// Starts a job producing `count` records on `chain` for `requester`.
    ///
    /// Returns the `Running` snapshot immediately; generation continues on a
    /// spawned task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServiceShutdown`], [`Error::InvalidChain`] or
    /// [`Error::QuotaExceeded`] without touching the store, or
    /// [`Error::StoreFailure`] if the initial record cannot be written.
    pub fn create(&self, requester: &Requester, chain: &str, count: u64) -> Result<Job> {
        let inner = &self.inner;
        if inner.shutdown.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }
        let chain: Chain = chain.parse()?;
        let count = inner.quota.authorize(requester.tier, count)?;

        let mut job = Job::new(JobId::generate(), requester.user, chain, count);
        inner.store.put(&job)?;

        job.transition(JobStatus::Running)?;
        if let Err(e) = inner.store.put(&job) {
            if job.fail(e.to_string()).is_ok() {
                let _ = inner.store.put(&job);
            }
            return Err(e);
        }

        let (control, handle) = control::channel(&inner.shutdown);
        inner.registry.lock().insert(job.id.clone(), control);

        let worker = JobWorker::new(
            job.clone(),
            &inner.config,
            Arc::clone(&inner.store),
            Arc::clone(&inner.deriver),
            handle,
        );
        let supervisor = Supervisor {
            id: job.id.clone(),
            inner: Arc::clone(inner),
        };
        inner.tracker.spawn(supervisor.run(worker));

        #[cfg(feature = "tracing")]
        tracing::info!(
            "User {} created job {} ({} x {chain})",
            requester.user,
            job.id,
            count
        );

        Ok(job)
    }

    /// Asks a running job to pause at its next checkpoint.
    ///
    /// The status stays `Running` until the worker reaches the checkpoint and
    /// records `Paused`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobNotFound`], [`Error::NotOwner`], or
    /// [`Error::JobStateConflict`] unless the job is `Running`.
    pub fn pause(&self, id: &JobId, requester: &Requester) -> Result<()> {
        let job = self.get(id, requester)?;
        if job.status != JobStatus::Running {
            return Err(conflict(&job, "pause"));
        }
        self.with_control(&job, "pause", JobControl::pause)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Pause requested for job {id}");
        Ok(())
    }

    /// Lets a paused job continue from its last checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobNotFound`], [`Error::NotOwner`], or
    /// [`Error::JobStateConflict`] unless the job is `Paused`.
    pub fn resume(&self, id: &JobId, requester: &Requester) -> Result<()> {
        let job = self.get(id, requester)?;
        if job.status != JobStatus::Paused {
            return Err(conflict(&job, "resume"));
        }
        self.with_control(&job, "resume", JobControl::resume)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Resume requested for job {id}");
        Ok(())
    }

    /// Stops a job for good. The worker seals what it has buffered and the
    /// job ends `Cancelled`. Cancelling a terminal job is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobNotFound`] or [`Error::NotOwner`].
    pub fn cancel(&self, id: &JobId, requester: &Requester) -> Result<()> {
        let job = self.get(id, requester)?;
        if job.status.is_terminal() {
            return Ok(());
        }

        let signalled = self
            .inner
            .registry
            .lock()
            .get(id)
            .map(JobControl::cancel)
            .is_some();
        if !signalled {
            // No worker owns the record and none can be registered for an
            // existing id. Re-read it, since a worker may have finished since
            // the check above.
            let mut job = self.inner.store.get(id)?;
            if !job.status.is_terminal() {
                job.transition(JobStatus::Cancelled)?;
                self.inner.store.put(&job)?;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Cancel requested for job {id}");
        Ok(())
    }

    /// Every job owned by `requester`, or every job for admins, oldest first.
    pub fn list(&self, requester: &Requester) -> Result<Vec<Job>> {
        if requester.is_admin() {
            self.inner.store.list_all()
        } else {
            self.inner.store.list_by_owner(requester.user)
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::JobNotFound`] or [`Error::NotOwner`].
    pub fn get(&self, id: &JobId, requester: &Requester) -> Result<Job> {
        let job = self.inner.store.get(id)?;
        if !job.is_visible_to(requester) {
            return Err(Error::NotOwner { id: id.clone() });
        }
        Ok(job)
    }

    /// Generates a small batch synchronously as a single chunk file under
    /// `<data_dir>/batches/<user>/<batch id>/`.
    ///
    /// No job record is kept for a batch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidChain`], [`Error::QuotaExceeded`],
    /// [`Error::DeriverFailure`] or [`Error::StorageWriteFailure`].
    pub async fn generate_batch(
        &self,
        requester: &Requester,
        chain: &str,
        count: u64,
    ) -> Result<ChunkRef> {
        let chain: Chain = chain.parse()?;
        let count = self.inner.quota.authorize_small_batch(count)?;

        let id = JobId::generate();
        let writer = ChunkWriter::new(
            self.inner
                .config
                .batches_dir()
                .join(requester.user.to_string()),
        );
        let deriver = Arc::clone(&self.inner.deriver);

        let chunk = tokio::task::spawn_blocking(move || -> Result<ChunkRef> {
            let records = (0..count)
                .map(|_| deriver.generate(chain))
                .collect::<core::result::Result<Vec<_>, _>>()?;
            writer.seal(&id, chain, 1, 0, &records)
        })
        .await??;

        #[cfg(feature = "tracing")]
        tracing::info!(
            "User {} generated a batch of {} x {chain}",
            requester.user,
            chunk.rows
        );

        Ok(chunk)
    }

    /// Number of jobs with a live worker.
    pub fn active_jobs(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Refuses new jobs, interrupts every live worker and waits for them to
    /// record their final state.
    ///
    /// Interrupted jobs end `Failed` with reason
    /// [`SHUTDOWN_FAILURE`](super::SHUTDOWN_FAILURE).
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskFailure`] if workers are still running after the
    /// configured shutdown timeout.
    pub async fn shutdown(&self) -> Result<()> {
        let inner = &self.inner;

        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new jobs, interrupting {} workers", self.active_jobs());

        inner.shutdown.cancel();
        inner.tracker.close();

        if timeout(inner.config.shutdown_timeout, inner.tracker.wait())
            .await
            .is_err()
        {
            let remaining = self.active_jobs();
            #[cfg(feature = "tracing")]
            tracing::warn!("Shutdown timed out with {remaining} workers still running");
            return Err(Error::TaskFailure {
                context: format!(
                    "{remaining} workers still running after {:?}",
                    inner.config.shutdown_timeout
                ),
            });
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Job manager shutdown complete");
        Ok(())
    }

    fn with_control(&self, job: &Job, action: &'static str, f: impl FnOnce(&JobControl)) -> Result<()> {
        let registry = self.inner.registry.lock();
        let control = registry.get(&job.id).ok_or_else(|| conflict(job, action))?;
        f(control);
        Ok(())
    }
}

fn conflict(job: &Job, action: &'static str) -> Error {
    Error::JobStateConflict {
        id: job.id.clone(),
        status: job.status,
        action,
    }
}

/// Owns a worker task on behalf of the manager.
struct Supervisor {
    id: JobId,
    inner: Arc<Inner>,
}

impl Supervisor {
    async fn run(self, worker: JobWorker) {
        // A nested task keeps a panicking worker from taking the registry
        // entry down with it.
        let work = worker.run();

        #[cfg(feature = "tracing")]
        let work = tracing::Instrument::instrument(work, tracing::info_span!("job", id = %self.id));

        let result = tokio::spawn(work).await;
        self.inner.registry.lock().remove(&self.id);

        if let Err(e) = result {
            #[cfg(feature = "tracing")]
            tracing::error!("Worker for job {} died: {e}", self.id);
            self.fail_orphan(&Error::from(e));
        }
    }

    fn fail_orphan(&self, error: &Error) {
        let Ok(mut job) = self.inner.store.get(&self.id) else {
            return;
        };
        if job.status.is_live() && job.fail(error.to_string()).is_ok() {
            let _ = self.inner.store.put(&job);
        }
    }
}
