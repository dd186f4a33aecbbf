use super::SHUTDOWN_FAILURE;
use super::control::{ControlHandle, Stop};
use crate::config::EngineConfig;
use crate::deriver::{CredentialRecord, WalletDeriver};
use crate::error::{Error, Result};
use crate::job::{ChunkRef, Job, JobStatus};
use crate::output::{ArchiveBuilder, ChunkWriter};
use crate::store::JobStore;
use std::sync::Arc;

/// Drives one job from `Running` to a terminal status.
///
/// The worker owns its copy of the [`Job`] record and is the only writer of
/// that record while it runs. Every sealed chunk, sealed archive and status
/// change is persisted before the loop moves on, so the stored record is
/// always a valid checkpoint.
pub(crate) struct JobWorker {
    job: Job,
    store: Arc<dyn JobStore>,
    deriver: Arc<dyn WalletDeriver>,
    chunks: ChunkWriter,
    archives: ArchiveBuilder,
    control: ControlHandle,
    chunk_size: u64,
    archive_cap: u64,
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    progress_every: u64,
    /// Sealed chunks not yet bundled into an archive, ascending.
    pending: Vec<ChunkRef>,
    archive_failed: bool,
}

impl JobWorker {
    pub(crate) fn new(
        job: Job,
        config: &EngineConfig,
        store: Arc<dyn JobStore>,
        deriver: Arc<dyn WalletDeriver>,
        control: ControlHandle,
    ) -> Self {
        let root = config.jobs_dir();
        Self {
            job,
            store,
            deriver,
            chunks: ChunkWriter::new(&root),
            archives: ArchiveBuilder::new(root),
            control,
            chunk_size: config.quota.csv_chunk_size,
            archive_cap: config.quota.zip_csvs_cap,
            progress_every: config.progress_log_every,
            pending: Vec::new(),
            archive_failed: false,
        }
    }

    /// Runs the job to completion and returns its final record.
    pub(crate) async fn run(mut self) -> Job {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Job {} started: {} x {}",
            self.job.id,
            self.job.total_count,
            self.job.chain
        );

        let outcome = self.generate().await;
        let ended = match outcome {
            Ok(None) => self.job.transition(JobStatus::Completed),
            Ok(Some(Stop::Cancelled)) => self.job.transition(JobStatus::Cancelled),
            Ok(Some(Stop::Interrupted)) => self.job.fail(SHUTDOWN_FAILURE),
            Err(e) => {
                if !self.archive_failed {
                    if let Err(_archive_err) = self.archive_pending().await {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            "Job {}: could not archive remaining chunks: {_archive_err}",
                            self.job.id
                        );
                    }
                }
                self.job.fail(e.to_string())
            }
        };

        if let Err(_e) = ended {
            #[cfg(feature = "tracing")]
            tracing::error!("Job {}: cannot record final status: {_e}", self.job.id);
        } else if let Err(_e) = self.persist().await {
            #[cfg(feature = "tracing")]
            tracing::error!("Job {}: cannot persist final status: {_e}", self.job.id);
        }

        #[cfg(feature = "tracing")]
        match &self.job.failure {
            Some(reason) => tracing::warn!(
                "Job {} {} after {}/{} records: {reason}",
                self.job.id,
                self.job.status,
                self.job.generated_count,
                self.job.total_count
            ),
            None => tracing::info!(
                "Job {} {}: {}/{} records in {} chunks, {} archives",
                self.job.id,
                self.job.status,
                self.job.generated_count,
                self.job.total_count,
                self.job.chunk_index,
                self.job.archive_refs.len()
            ),
        }

        self.job
    }

    /// The generation loop. Returns `Some(stop)` if the job was stopped early.
    async fn generate(&mut self) -> Result<Option<Stop>> {
        let capacity = self.job.remaining().min(self.chunk_size);
        let mut buffer = Vec::with_capacity(usize::try_from(capacity).unwrap_or(0));

        loop {
            // Checkpoint boundary: the buffer is empty here.
            if let Some(stop) = self.control.stopped() {
                self.archive_pending().await?;
                return Ok(Some(stop));
            }
            if self.job.is_finished() {
                break;
            }
            if self.control.pause_requested() {
                self.job.transition(JobStatus::Paused)?;
                self.persist().await?;

                #[cfg(feature = "tracing")]
                tracing::info!(
                    "Job {} paused at chunk {} ({} records)",
                    self.job.id,
                    self.job.chunk_index,
                    self.job.generated_count
                );

                if let Some(stop) = self.control.paused().await {
                    self.archive_pending().await?;
                    return Ok(Some(stop));
                }

                self.job.transition(JobStatus::Running)?;
                self.persist().await?;

                #[cfg(feature = "tracing")]
                tracing::info!("Job {} resumed", self.job.id);
            }

            let target = self.job.remaining().min(self.chunk_size);
            let mut stop = None;
            while (buffer.len() as u64) < target {
                if let Some(reason) = self.control.stopped() {
                    stop = Some(reason);
                    break;
                }
                // Derivation is CPU-bound and may block, so it runs on the
                // blocking pool. Awaiting it also yields to the scheduler.
                let deriver = Arc::clone(&self.deriver);
                let chain = self.job.chain;
                buffer.push(tokio::task::spawn_blocking(move || deriver.generate(chain)).await??);

                #[cfg(feature = "tracing")]
                {
                    let produced = self.job.generated_count + buffer.len() as u64;
                    if produced % self.progress_every == 0 {
                        tracing::info!(
                            "Job {} progress: {produced}/{}",
                            self.job.id,
                            self.job.total_count
                        );
                    }
                }
            }

            if !buffer.is_empty() {
                buffer = self.seal_chunk(buffer).await?;
            }
            if self.pending.len() as u64 >= self.archive_cap {
                self.archive_pending().await?;
            }
            if let Some(stop) = stop {
                self.archive_pending().await?;
                return Ok(Some(stop));
            }
        }

        self.archive_pending().await?;
        Ok(None)
    }

    /// Seals `records` as the next chunk and checkpoints it. Hands the
    /// emptied buffer back for reuse.
    async fn seal_chunk(&mut self, records: Vec<CredentialRecord>) -> Result<Vec<CredentialRecord>> {
        let writer = self.chunks.clone();
        let id = self.job.id.clone();
        let chain = self.job.chain;
        let index = self.job.chunk_index + 1;
        let first = self.job.generated_count;

        let (sealed, mut records) = tokio::task::spawn_blocking(move || {
            let sealed = writer.seal(&id, chain, index, first, &records);
            (sealed, records)
        })
        .await?;
        let chunk = sealed?;
        records.clear();

        self.job.record_chunk(chunk.clone());
        self.pending.push(chunk);
        self.persist().await?;
        Ok(records)
    }

    /// Bundles every pending chunk into the next archive and checkpoints it.
    async fn archive_pending(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let builder = self.archives.clone();
        let id = self.job.id.clone();
        let chain = self.job.chain;
        let index = self.job.archive_refs.len() as u64 + 1;
        let chunks = self.pending.clone();

        let sealed = tokio::task::spawn_blocking(move || builder.seal(&id, chain, index, &chunks))
            .await
            .map_err(Error::from)
            .and_then(|sealed| sealed);
        let archive = match sealed {
            Ok(archive) => archive,
            Err(e) => {
                self.archive_failed = true;
                return Err(e);
            }
        };

        self.pending.clear();
        self.job.record_archive(archive);
        self.persist().await
    }

    async fn persist(&self) -> Result<()> {
        let store = Arc::clone(&self.store);
        let job = self.job.clone();
        tokio::task::spawn_blocking(move || store.put(&job)).await?
    }
}
