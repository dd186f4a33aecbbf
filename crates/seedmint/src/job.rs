//! Job metadata and the job state machine.
//!
//! A [`Job`] is the durable record the store keeps per batch. It doubles as
//! the listing record handed to presentation layers, so it serializes with
//! camelCase field names.

use crate::chain::Chain;
use crate::error::{Error, Result};
use core::fmt;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque job identifier (16 lowercase hex chars).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Allocates a random identifier.
    pub fn generate() -> Self {
        Self(format!("{:016x}", rand::random::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Whether a live worker may still exist for a job in this status.
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Pending | Self::Running | Self::Paused)
    }

    /// Allowed lifecycle edges.
    ///
    /// `Pending -> Cancelled | Failed` covers jobs stopped before their worker
    /// starts; `Paused -> Failed` is only taken by restart recovery and
    /// shutdown bookkeeping.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Cancelled | Self::Failed)
                | (
                    Self::Running,
                    Self::Paused | Self::Completed | Self::Cancelled | Self::Failed
                )
                | (Self::Paused, Self::Running | Self::Cancelled | Self::Failed)
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sealed chunk file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRef {
    /// 1-based position of the chunk within its job.
    pub index: u64,
    pub path: PathBuf,
    pub rows: u64,
    /// Job-wide sequence number of the first row.
    pub first_sequence: u64,
}

impl ChunkRef {
    /// Job-wide sequence number one past the last row.
    pub const fn end_sequence(&self) -> u64 {
        self.first_sequence + self.rows
    }
}

/// A sealed archive bundling one or more chunk files.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRef {
    /// 1-based position of the archive within its job.
    pub index: u64,
    pub path: PathBuf,
    /// Indices of the chunks inside, ascending.
    pub chunk_indices: Vec<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub owner: u64,
    pub chain: Chain,
    pub total_count: u64,
    pub generated_count: u64,
    pub status: JobStatus,
    /// Number of chunks sealed so far.
    pub chunk_index: u64,
    pub chunk_refs: Vec<ChunkRef>,
    pub archive_refs: Vec<ArchiveRef>,
    /// Unix seconds.
    pub created_at: u64,
    /// Insertion order assigned by the store on first `put`. Orders jobs
    /// created within the same second.
    #[serde(default)]
    pub created_seq: u64,
    /// Unix seconds.
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl Job {
    pub fn new(id: JobId, owner: u64, chain: Chain, total_count: u64) -> Self {
        let now = unix_now();
        Self {
            id,
            owner,
            chain,
            total_count,
            generated_count: 0,
            status: JobStatus::Pending,
            chunk_index: 0,
            chunk_refs: Vec::new(),
            archive_refs: Vec::new(),
            created_at: now,
            created_seq: 0,
            updated_at: now,
            failure: None,
        }
    }

    /// Moves the job to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JobStateConflict`] if the state machine has no such
    /// edge; the job is left untouched.
    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::JobStateConflict {
                id: self.id.clone(),
                status: self.status,
                action: "transition",
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Ends the job as `Failed` with a recorded reason.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        self.failure = Some(reason.into());
        Ok(())
    }

    /// Records a freshly sealed chunk as the new checkpoint.
    pub(crate) fn record_chunk(&mut self, chunk: ChunkRef) {
        debug_assert_eq!(chunk.index, self.chunk_index + 1);
        debug_assert_eq!(chunk.first_sequence, self.generated_count);
        self.generated_count = (self.generated_count + chunk.rows).min(self.total_count);
        self.chunk_index = chunk.index;
        self.chunk_refs.push(chunk);
        self.touch();
    }

    pub(crate) fn record_archive(&mut self, archive: ArchiveRef) {
        self.archive_refs.push(archive);
        self.touch();
    }

    pub const fn remaining(&self) -> u64 {
        self.total_count - self.generated_count
    }

    pub const fn is_finished(&self) -> bool {
        self.generated_count >= self.total_count
    }

    /// Whether `user` may see and control this job.
    pub fn is_visible_to(&self, requester: &crate::quota::Requester) -> bool {
        requester.is_admin() || requester.user == self.owner
    }

    /// Listing order: creation time, then store insertion order.
    pub(crate) fn creation_key(&self) -> (u64, u64, &JobId) {
        (self.created_at, self.created_seq, &self.id)
    }

    fn touch(&mut self) {
        self.updated_at = unix_now().max(self.updated_at);
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::Requester;
    use JobStatus::*;

    #[test]
    fn state_machine_edges() {
        let allowed = [
            (Pending, Running),
            (Running, Paused),
            (Running, Completed),
            (Running, Cancelled),
            (Running, Failed),
            (Paused, Running),
            (Paused, Cancelled),
        ];
        for (from, to) in allowed {
            assert!(from.can_transition_to(to), "{from} -> {to}");
        }

        let forbidden = [
            (Pending, Paused),
            (Pending, Completed),
            (Paused, Completed),
            (Paused, Paused),
            (Running, Running),
            (Running, Pending),
        ];
        for (from, to) in forbidden {
            assert!(!from.can_transition_to(to), "{from} -> {to}");
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in [Completed, Cancelled, Failed] {
            assert!(terminal.is_terminal());
            for next in [Pending, Running, Paused, Completed, Cancelled, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn rejected_transition_leaves_job_untouched() {
        let mut job = Job::new(JobId::from("j1"), 1, Chain::Eth, 10);
        let err = job.transition(Completed).unwrap_err();
        assert!(matches!(err, Error::JobStateConflict { status: Pending, .. }));
        assert_eq!(job.status, Pending);
    }

    #[test]
    fn record_chunk_advances_checkpoint() {
        let mut job = Job::new(JobId::from("j1"), 1, Chain::Btc, 25);
        job.transition(Running).unwrap();
        job.record_chunk(ChunkRef {
            index: 1,
            path: PathBuf::from("a.csv"),
            rows: 10,
            first_sequence: 0,
        });
        assert_eq!(job.generated_count, 10);
        assert_eq!(job.chunk_index, 1);
        assert_eq!(job.remaining(), 15);
        assert!(!job.is_finished());
    }

    #[test]
    fn visibility_follows_owner_or_admin() {
        let job = Job::new(JobId::from("j1"), 42, Chain::Sol, 1);
        assert!(job.is_visible_to(&Requester::user(42)));
        assert!(!job.is_visible_to(&Requester::user(43)));
        assert!(job.is_visible_to(&Requester::admin(1)));
    }

    #[test]
    fn listing_record_uses_camel_case() {
        let job = Job::new(JobId::from("abc"), 9, Chain::Ton, 3);
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["id"], "abc");
        assert_eq!(value["totalCount"], 3);
        assert_eq!(value["generatedCount"], 0);
        assert_eq!(value["status"], "pending");
        assert_eq!(value["chain"], "TON");
        assert!(value.get("failure").is_none());
    }

    #[test]
    fn generated_ids_are_distinct_hex() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 16);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
