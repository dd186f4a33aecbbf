use super::*;
use crate::chain::Chain;
use crate::config::{EngineConfig, QuotaConfig};
use crate::deriver::{CredentialRecord, DeriverError, WalletDeriver};
use crate::error::Error;
use crate::job::{ChunkRef, Job, JobId, JobStatus};
use crate::quota::Requester;
use crate::store::{FileJobStore, JobStore, MemoryJobStore, RESTART_FAILURE};
use core::time::Duration;
use parking_lot::{Condvar, Mutex};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

const ADMIN: Requester = Requester::admin(1);
const ALICE: Requester = Requester::user(10);
const BOB: Requester = Requester::user(20);

#[derive(Default)]
struct GateState {
    /// Calls with a 0-based number below this return immediately.
    allowed: u64,
    calls: u64,
    waiting: bool,
    fail_at: Option<u64>,
}

/// Deterministic deriver whose progress the test releases explicitly.
#[derive(Clone, Default)]
struct GatedDeriver {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

impl GatedDeriver {
    fn open() -> Self {
        let gate = Self::default();
        gate.release_all();
        gate
    }

    fn failing_at(call: u64) -> Self {
        let gate = Self::open();
        gate.inner.0.lock().fail_at = Some(call);
        gate
    }

    fn allow(&self, calls: u64) {
        self.inner.0.lock().allowed = calls;
        self.inner.1.notify_all();
    }

    fn release_all(&self) {
        self.allow(u64::MAX);
    }

    fn calls(&self) -> u64 {
        self.inner.0.lock().calls
    }

    /// Waits until call number `call` is parked in the gate.
    async fn parked_at(&self, call: u64) {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            {
                let state = self.inner.0.lock();
                if state.waiting && state.calls == call + 1 {
                    return;
                }
            }
            assert!(Instant::now() < deadline, "deriver never reached call {call}");
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

impl WalletDeriver for GatedDeriver {
    fn generate(&self, chain: Chain) -> Result<CredentialRecord, DeriverError> {
        let (lock, cond) = &*self.inner;
        let mut state = lock.lock();
        let call = state.calls;
        state.calls += 1;

        if state.fail_at == Some(call) {
            return Err(DeriverError::new(chain, "entropy source unavailable"));
        }

        let deadline = Instant::now() + Duration::from_secs(10);
        while call >= state.allowed {
            state.waiting = true;
            if cond.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.waiting = false;

        Ok(CredentialRecord::new(
            chain,
            format!("secret-{call}"),
            format!("addr-{call}"),
            chain.derivation_path(),
        ))
    }
}

fn config(dir: &Path, chunk: u64, cap: u64) -> EngineConfig {
    let mut config = EngineConfig::new(dir);
    config.quota = QuotaConfig {
        small_batch_max: 50,
        csv_chunk_size: chunk,
        zip_csvs_cap: cap,
        max_nonadmin: 100,
        max_admin: 1_000,
    };
    config.shutdown_timeout = Duration::from_secs(5);
    config
}

fn manager(dir: &Path, chunk: u64, cap: u64, deriver: GatedDeriver) -> JobManager {
    JobManager::new(config(dir, chunk, cap), MemoryJobStore::new(), deriver).unwrap()
}

async fn wait_for(manager: &JobManager, id: &JobId, done: impl Fn(&Job) -> bool) -> Job {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let job = manager.get(id, &ADMIN).unwrap();
        assert!(job.generated_count <= job.total_count);
        if done(&job) {
            return job;
        }
        assert!(
            Instant::now() < deadline,
            "job {id} stuck at {} ({}/{})",
            job.status,
            job.generated_count,
            job.total_count
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn wait_terminal(manager: &JobManager, id: &JobId) -> Job {
    wait_for(manager, id, |job| job.status.is_terminal()).await
}

fn rows(chunks: &[ChunkRef]) -> Vec<u64> {
    chunks.iter().map(|c| c.rows).collect()
}

fn assert_contiguous(chunks: &[ChunkRef]) {
    let mut next = 0;
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.index, i as u64 + 1);
        assert_eq!(chunk.first_sequence, next);
        next = chunk.end_sequence();
    }
}

fn csv_indices(chunks: &[ChunkRef]) -> Vec<u64> {
    let mut indices = Vec::new();
    for chunk in chunks {
        let mut reader = csv::Reader::from_path(&chunk.path).unwrap();
        for record in reader.records() {
            indices.push(record.unwrap()[0].parse().unwrap());
        }
    }
    indices
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completed_job_seals_chunks_and_one_archive() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path(), 10, 10, GatedDeriver::open());

    let created = manager.create(&ADMIN, "btc", 25).unwrap();
    assert_eq!(created.status, JobStatus::Running);
    assert_eq!(created.chain, Chain::Btc);

    let job = wait_terminal(&manager, &created.id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.generated_count, 25);
    assert_eq!(job.chunk_index, 3);
    assert_eq!(rows(&job.chunk_refs), vec![10, 10, 5]);
    assert_contiguous(&job.chunk_refs);
    assert_eq!(csv_indices(&job.chunk_refs), (0..25).collect::<Vec<_>>());

    assert_eq!(job.archive_refs.len(), 1);
    assert_eq!(job.archive_refs[0].chunk_indices, vec![1, 2, 3]);
    assert!(job.archive_refs[0].path.ends_with("backup_BTC_001.tar.gz"));
    assert!(job.archive_refs[0].path.is_file());

    let job_dir = dir.path().join("jobs").join(job.id.as_str());
    for entry in std::fs::read_dir(job_dir).unwrap() {
        let name = entry.unwrap().file_name();
        assert!(!name.to_string_lossy().ends_with(".part"));
    }
    assert_eq!(manager.active_jobs(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn archive_cap_splits_archives() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path(), 10, 2, GatedDeriver::open());

    let created = manager.create(&ALICE, "ETH", 25).unwrap();
    let job = wait_terminal(&manager, &created.id).await;

    assert_eq!(job.status, JobStatus::Completed);
    let archived: Vec<_> = job
        .archive_refs
        .iter()
        .map(|a| a.chunk_indices.clone())
        .collect();
    assert_eq!(archived, vec![vec![1, 2], vec![3]]);
    assert!(job.archive_refs[1].path.ends_with("backup_ETH_002.tar.gz"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_requests_leave_no_record() {
    let dir = tempfile::tempdir().unwrap();
    let deriver = GatedDeriver::open();
    let manager = manager(dir.path(), 10, 10, deriver.clone());

    let err = manager.create(&ALICE, "BTC", 200).unwrap_err();
    assert!(matches!(
        err,
        Error::QuotaExceeded {
            requested: 200,
            max: 100,
            ..
        }
    ));
    assert!(err.is_validation());
    assert!(matches!(
        manager.create(&ALICE, "BTC", 0),
        Err(Error::QuotaExceeded { .. })
    ));
    assert!(matches!(
        manager.create(&ALICE, "DOGEZ", 5),
        Err(Error::InvalidChain { .. })
    ));

    assert!(manager.list(&ADMIN).unwrap().is_empty());
    assert_eq!(deriver.calls(), 0);

    // The same count is fine for an admin.
    let job = manager.create(&ADMIN, "BTC", 200).unwrap();
    assert_eq!(job.total_count, 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pause_then_resume_continues_from_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let deriver = GatedDeriver::default();
    let manager = manager(dir.path(), 10, 10, deriver.clone());

    deriver.allow(25);
    let created = manager.create(&ALICE, "sol", 100).unwrap();
    deriver.parked_at(25).await;

    // The pause lands at the next chunk boundary, after chunk 3.
    manager.pause(&created.id, &ALICE).unwrap();
    deriver.allow(30);
    let paused = wait_for(&manager, &created.id, |j| j.status == JobStatus::Paused).await;
    assert_eq!(paused.chunk_index, 3);
    assert_eq!(paused.generated_count, 30);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let still = manager.get(&created.id, &ALICE).unwrap();
    assert_eq!(still.status, JobStatus::Paused);
    assert_eq!(still.generated_count, 30);
    assert_eq!(still.chunk_refs, paused.chunk_refs);
    assert_eq!(deriver.calls(), 30);

    assert!(matches!(
        manager.pause(&created.id, &ALICE),
        Err(Error::JobStateConflict {
            status: JobStatus::Paused,
            ..
        })
    ));

    deriver.release_all();
    manager.resume(&created.id, &ALICE).unwrap();
    let job = wait_terminal(&manager, &created.id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.generated_count, 100);
    assert_eq!(job.chunk_refs[..3], paused.chunk_refs[..]);
    assert_eq!(job.chunk_refs[3].index, 4);
    assert_eq!(job.chunk_refs[3].first_sequence, 30);
    assert_contiguous(&job.chunk_refs);
    assert_eq!(csv_indices(&job.chunk_refs), (0..100).collect::<Vec<_>>());
    assert_eq!(deriver.calls(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_seals_partial_chunk_and_stops() {
    let dir = tempfile::tempdir().unwrap();
    let deriver = GatedDeriver::default();
    let manager = manager(dir.path(), 10, 10, deriver.clone());

    deriver.allow(15);
    let created = manager.create(&ALICE, "TRON", 100).unwrap();
    deriver.parked_at(15).await;

    manager.cancel(&created.id, &ALICE).unwrap();
    deriver.release_all();
    let job = wait_terminal(&manager, &created.id).await;

    // The in-flight derivation completes, then the buffer is sealed short.
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.generated_count, 16);
    assert_eq!(rows(&job.chunk_refs), vec![10, 6]);
    assert_contiguous(&job.chunk_refs);
    assert_eq!(job.archive_refs.len(), 1);
    assert_eq!(job.archive_refs[0].chunk_indices, vec![1, 2]);
    assert!(job.failure.is_none());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(deriver.calls(), 16);
    assert_eq!(manager.get(&created.id, &ALICE).unwrap().generated_count, 16);

    // Cancelling again is a no-op.
    manager.cancel(&created.id, &ALICE).unwrap();
    assert_eq!(
        manager.get(&created.id, &ALICE).unwrap().status,
        JobStatus::Cancelled
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_while_paused() {
    let dir = tempfile::tempdir().unwrap();
    let deriver = GatedDeriver::default();
    let manager = manager(dir.path(), 10, 10, deriver.clone());

    deriver.allow(5);
    let created = manager.create(&BOB, "XRP", 50).unwrap();
    deriver.parked_at(5).await;
    manager.pause(&created.id, &BOB).unwrap();
    deriver.allow(10);
    wait_for(&manager, &created.id, |j| j.status == JobStatus::Paused).await;

    manager.cancel(&created.id, &BOB).unwrap();
    let job = wait_terminal(&manager, &created.id).await;

    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(job.generated_count, 10);
    assert_eq!(rows(&job.chunk_refs), vec![10]);
    assert_eq!(job.archive_refs.len(), 1);
    assert_eq!(deriver.calls(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deriver_failure_keeps_sealed_output() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path(), 10, 10, GatedDeriver::failing_at(22));

    let created = manager.create(&ALICE, "LTC", 50).unwrap();
    let job = wait_terminal(&manager, &created.id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(
        job.failure
            .as_deref()
            .unwrap()
            .contains("entropy source unavailable")
    );
    assert_eq!(job.generated_count, 20);
    assert_eq!(rows(&job.chunk_refs), vec![10, 10]);
    assert!(job.chunk_refs.iter().all(|c| c.path.is_file()));
    assert_eq!(job.archive_refs.len(), 1);
    assert_eq!(job.archive_refs[0].chunk_indices, vec![1, 2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn jobs_are_scoped_to_their_owner() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path(), 10, 10, GatedDeriver::open());

    let alice_job = manager.create(&ALICE, "BTC", 5).unwrap();
    let bob_job = manager.create(&BOB, "ETH", 5).unwrap();
    wait_terminal(&manager, &alice_job.id).await;
    wait_terminal(&manager, &bob_job.id).await;

    let ids = |jobs: Vec<Job>| jobs.into_iter().map(|j| j.id).collect::<Vec<_>>();
    assert_eq!(ids(manager.list(&ALICE).unwrap()), vec![alice_job.id.clone()]);
    assert_eq!(ids(manager.list(&BOB).unwrap()), vec![bob_job.id.clone()]);
    assert_eq!(manager.list(&ADMIN).unwrap().len(), 2);

    assert!(matches!(
        manager.get(&alice_job.id, &BOB),
        Err(Error::NotOwner { .. })
    ));
    assert!(matches!(
        manager.cancel(&alice_job.id, &BOB),
        Err(Error::NotOwner { .. })
    ));
    assert!(matches!(
        manager.pause(&alice_job.id, &BOB),
        Err(Error::NotOwner { .. })
    ));
    assert!(manager.get(&alice_job.id, &ADMIN).is_ok());

    let missing = JobId::from("0000000000000000");
    assert!(matches!(
        manager.resume(&missing, &ADMIN),
        Err(Error::JobNotFound { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn control_calls_respect_the_state_machine() {
    let dir = tempfile::tempdir().unwrap();
    let deriver = GatedDeriver::default();
    let manager = manager(dir.path(), 10, 10, deriver.clone());

    let created = manager.create(&ALICE, "DOGE", 20).unwrap();
    deriver.parked_at(0).await;
    assert!(matches!(
        manager.resume(&created.id, &ALICE),
        Err(Error::JobStateConflict {
            status: JobStatus::Running,
            action: "resume",
            ..
        })
    ));

    deriver.release_all();
    let done = wait_terminal(&manager, &created.id).await;
    assert_eq!(done.status, JobStatus::Completed);

    assert!(matches!(
        manager.pause(&created.id, &ALICE),
        Err(Error::JobStateConflict {
            status: JobStatus::Completed,
            ..
        })
    ));
    manager.cancel(&created.id, &ALICE).unwrap();
    assert_eq!(
        manager.get(&created.id, &ALICE).unwrap().status,
        JobStatus::Completed
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn small_batches_write_one_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path(), 10, 10, GatedDeriver::open());

    let chunk = manager.generate_batch(&ALICE, "sol", 37).await.unwrap();
    assert_eq!(chunk.index, 1);
    assert_eq!(chunk.rows, 37);
    assert!(chunk.path.starts_with(dir.path().join("batches").join("10")));
    assert_eq!(csv_indices(&[chunk]), (0..37).collect::<Vec<_>>());

    // The small-batch ceiling applies to every tier.
    assert!(matches!(
        manager.generate_batch(&ADMIN, "SOL", 51).await,
        Err(Error::QuotaExceeded { max: 50, .. })
    ));
    assert!(matches!(
        manager.generate_batch(&ALICE, "ADA", 1).await,
        Err(Error::InvalidChain { .. })
    ));
    assert!(manager.list(&ADMIN).unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_interrupts_live_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let deriver = GatedDeriver::default();
    let manager = manager(dir.path(), 10, 10, deriver.clone());

    deriver.allow(5);
    let created = manager.create(&ALICE, "AVAXC", 50).unwrap();
    deriver.parked_at(5).await;

    let release = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        deriver.release_all();
    };
    let (result, ()) = tokio::join!(manager.shutdown(), release);
    result.unwrap();

    let job = manager.get(&created.id, &ALICE).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure.as_deref(), Some(SHUTDOWN_FAILURE));
    assert_eq!(job.generated_count, 6);
    assert_eq!(rows(&job.chunk_refs), vec![6]);
    assert_eq!(job.archive_refs.len(), 1);
    assert_eq!(manager.active_jobs(), 0);

    assert!(matches!(
        manager.create(&ALICE, "BTC", 1),
        Err(Error::ServiceShutdown)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn open_fails_jobs_left_live_by_a_previous_process() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), 10, 10);

    let mut running = Job::new(JobId::from("aaaa"), 10, Chain::Btc, 30);
    running.transition(JobStatus::Running).unwrap();
    running.record_chunk(ChunkRef {
        index: 1,
        path: dir.path().join("jobs/aaaa/wallets_BTC_0_9.csv"),
        rows: 10,
        first_sequence: 0,
    });
    let mut paused = Job::new(JobId::from("bbbb"), 10, Chain::Eth, 30);
    paused.transition(JobStatus::Running).unwrap();
    paused.transition(JobStatus::Paused).unwrap();
    {
        let store = FileJobStore::open(config.store_path()).unwrap();
        store.put(&running).unwrap();
        store.put(&paused).unwrap();
    }

    let manager = JobManager::open(config, GatedDeriver::open()).unwrap();
    let jobs = manager.list(&ALICE).unwrap();
    assert_eq!(jobs.len(), 2);
    for job in &jobs {
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure.as_deref(), Some(RESTART_FAILURE));
    }
    let recovered = manager.get(&running.id, &ALICE).unwrap();
    assert_eq!(recovered.chunk_refs, running.chunk_refs);
    assert_eq!(recovered.generated_count, 10);

    // New work is accepted on the recovered store.
    let fresh = manager.create(&ALICE, "BTC", 3).unwrap();
    assert_eq!(wait_terminal(&manager, &fresh.id).await.status, JobStatus::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn jobs_list_in_creation_order() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path(), 10, 10, GatedDeriver::open());

    // Back-to-back creates share a timestamp second; the random ids do not
    // decide the order.
    let created: Vec<JobId> = (0..40)
        .map(|_| manager.create(&ALICE, "BTC", 1).unwrap().id)
        .collect();
    for id in &created {
        wait_terminal(&manager, id).await;
    }

    let listed: Vec<JobId> = manager
        .list(&ALICE)
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    assert_eq!(listed, created);
    let all: Vec<JobId> = manager
        .list(&ADMIN)
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    assert_eq!(all, created);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn chunk_write_failure_keeps_earlier_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let deriver = GatedDeriver::default();
    let manager = manager(dir.path(), 10, 10, deriver.clone());

    deriver.allow(10);
    let created = manager.create(&ALICE, "BTC", 25).unwrap();
    deriver.parked_at(10).await;

    // Chunk 1 is sealed; a directory in place of chunk 2's part file makes
    // the next seal fail.
    let job_dir = dir.path().join("jobs").join(created.id.as_str());
    std::fs::create_dir_all(job_dir.join("wallets_BTC_10_19.csv.part")).unwrap();
    deriver.release_all();

    let job = wait_terminal(&manager, &created.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(
        job.failure
            .as_deref()
            .unwrap()
            .contains("Storage write failed")
    );
    assert_eq!(job.generated_count, 10);
    assert_eq!(rows(&job.chunk_refs), vec![10]);
    assert_eq!(csv_indices(&job.chunk_refs), (0..10).collect::<Vec<_>>());
    assert!(!job_dir.join("wallets_BTC_10_19.csv").exists());

    assert_eq!(job.archive_refs.len(), 1);
    assert_eq!(job.archive_refs[0].chunk_indices, vec![1]);
    assert!(job.archive_refs[0].path.is_file());

    // Nothing is retried.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(deriver.calls(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn archive_write_failure_fails_without_retry() {
    let dir = tempfile::tempdir().unwrap();
    let deriver = GatedDeriver::default();
    let manager = manager(dir.path(), 10, 10, deriver.clone());

    let created = manager.create(&ALICE, "ETH", 25).unwrap();
    deriver.parked_at(0).await;

    let job_dir = dir.path().join("jobs").join(created.id.as_str());
    let blocker = job_dir.join("backup_ETH_001.tar.gz.part");
    std::fs::create_dir_all(&blocker).unwrap();
    deriver.release_all();

    let job = wait_terminal(&manager, &created.id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(
        job.failure
            .as_deref()
            .unwrap()
            .contains("Storage write failed")
    );
    assert_eq!(job.generated_count, 25);
    assert_eq!(rows(&job.chunk_refs), vec![10, 10, 5]);
    assert!(job.chunk_refs.iter().all(|c| c.path.is_file()));
    assert!(job.archive_refs.is_empty());
    assert!(!job_dir.join("backup_ETH_001.tar.gz").exists());
    assert!(blocker.is_dir());
    assert_eq!(deriver.calls(), 25);
}

#[tokio::test]
async fn slow_deriver_does_not_stall_a_single_threaded_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let deriver = GatedDeriver::default();
    let manager = manager(dir.path(), 10, 10, deriver.clone());

    deriver.allow(3);
    let created = manager.create(&BOB, "SOL", 20).unwrap();

    // The parked derivation holds a blocking-pool thread, not the runtime.
    tokio::time::timeout(Duration::from_secs(2), deriver.parked_at(3))
        .await
        .expect("runtime stalled behind the deriver");
    let running = manager.get(&created.id, &BOB).unwrap();
    assert_eq!(running.status, JobStatus::Running);
    assert_eq!(running.generated_count, 0);

    manager.cancel(&created.id, &BOB).unwrap();
    deriver.release_all();
    let job = wait_terminal(&manager, &created.id).await;
    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(rows(&job.chunk_refs), vec![4]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_without_worker_records_cancelled() {
    let dir = tempfile::tempdir().unwrap();

    let pending = Job::new(JobId::from("p1"), 10, Chain::Btc, 5);
    let mut paused = Job::new(JobId::from("p2"), 10, Chain::Eth, 5);
    paused.transition(JobStatus::Running).unwrap();
    paused.transition(JobStatus::Paused).unwrap();
    let store = MemoryJobStore::with_jobs([pending.clone(), paused.clone()]);
    let manager = JobManager::new(config(dir.path(), 10, 10), store, GatedDeriver::open()).unwrap();
    assert_eq!(manager.active_jobs(), 0);

    for id in [&pending.id, &paused.id] {
        manager.cancel(id, &ALICE).unwrap();
        let job = manager.get(id, &ALICE).unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.failure.is_none());
    }

    // A stale record cannot be resumed into a worker that does not exist.
    let mut orphan = Job::new(JobId::from("p3"), 10, Chain::Ton, 5);
    orphan.transition(JobStatus::Running).unwrap();
    orphan.transition(JobStatus::Paused).unwrap();
    let manager = JobManager::new(
        config(dir.path(), 10, 10),
        MemoryJobStore::with_jobs([orphan.clone()]),
        GatedDeriver::open(),
    )
    .unwrap();
    assert!(matches!(
        manager.resume(&orphan.id, &ALICE),
        Err(Error::JobStateConflict { action: "resume", .. })
    ));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), 10, 10);
    config.quota.max_nonadmin = 5_000;
    assert!(matches!(
        JobManager::new(config, MemoryJobStore::new(), GatedDeriver::open()),
        Err(Error::InvalidConfig { .. })
    ));
}
