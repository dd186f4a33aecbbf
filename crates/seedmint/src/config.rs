//! Engine configuration.
//!
//! [`EngineConfig`] bundles the quota surface (the five externally supplied
//! limits), the data directory that holds the job store and all job output,
//! and a few operational knobs. Values are usually populated by the binary
//! from CLI flags or environment variables and then checked with
//! [`EngineConfig::validate`].

use crate::error::{Error, Result};
use crate::quota::{Requester, Tier};
use core::time::Duration;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Limits applied to generation requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuotaConfig {
    /// Ceiling for small synchronous batches, regardless of tier.
    pub small_batch_max: u64,
    /// Maximum rows per chunk file.
    pub csv_chunk_size: u64,
    /// Maximum chunk files per archive.
    pub zip_csvs_cap: u64,
    /// Job ceiling for non-admin callers.
    pub max_nonadmin: u64,
    /// Job ceiling for admins.
    pub max_admin: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            small_batch_max: 1_000,
            csv_chunk_size: 10_000,
            zip_csvs_cap: 10,
            max_nonadmin: 100_000,
            max_admin: 1_000_000,
        }
    }
}

impl QuotaConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("small_batch_max", self.small_batch_max),
            ("csv_chunk_size", self.csv_chunk_size),
            ("zip_csvs_cap", self.zip_csvs_cap),
            ("max_nonadmin", self.max_nonadmin),
            ("max_admin", self.max_admin),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(Error::InvalidConfig {
                reason: format!("{name} must be at least 1"),
            });
        }
        if self.max_nonadmin > self.max_admin {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "max_nonadmin ({}) cannot exceed max_admin ({})",
                    self.max_nonadmin, self.max_admin
                ),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub quota: QuotaConfig,
    /// Root directory for `jobs.json`, job output and small batches.
    pub data_dir: PathBuf,
    /// Users resolved to [`Tier::Admin`].
    pub admin_ids: BTreeSet<u64>,
    /// Emit a progress event every this many generated records.
    pub progress_log_every: u64,
    /// How long [`JobManager::shutdown`] waits for workers to settle.
    ///
    /// [`JobManager::shutdown`]: crate::JobManager::shutdown
    pub shutdown_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quota: QuotaConfig::default(),
            data_dir: PathBuf::from("."),
            admin_ids: BTreeSet::new(),
            progress_log_every: 5_000,
            shutdown_timeout: Duration::from_secs(3),
        }
    }
}

impl EngineConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.quota.validate()?;
        if self.progress_log_every == 0 {
            return Err(Error::InvalidConfig {
                reason: "progress_log_every must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn is_admin(&self, user: u64) -> bool {
        self.admin_ids.contains(&user)
    }

    /// Resolves a user id to a [`Requester`] using the configured admin list.
    pub fn requester(&self, user: u64) -> Requester {
        let tier = if self.is_admin(user) {
            Tier::Admin
        } else {
            Tier::NonAdmin
        };
        Requester::new(user, tier)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("jobs.json")
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.data_dir.join("jobs")
    }

    pub fn batches_dir(&self) -> PathBuf {
        self.data_dir.join("batches")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
