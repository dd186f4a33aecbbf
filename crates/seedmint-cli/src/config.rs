use anyhow::{Context, bail};
use clap::Args;
use core::time::Duration;
use seedmint::{EngineConfig, QuotaConfig};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Engine configuration shared by every subcommand.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file in the working directory is honoured). The defaults match a
/// stock deployment.
#[derive(Args, Debug, Clone)]
pub struct CliArgs {
    /// Root directory for `jobs.json`, job output and small batches.
    ///
    /// Environment variable: `DATA_DIR`
    #[arg(long, env = "DATA_DIR", default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Ceiling for small synchronous batches, for every tier.
    ///
    /// Environment variable: `BULK_MAX_COUNT`
    #[arg(long, env = "BULK_MAX_COUNT", default_value_t = 1_000, global = true)]
    pub bulk_max_count: u64,

    /// Maximum rows per chunk file.
    ///
    /// Environment variable: `BULKZIP_CSV_CHUNK`
    #[arg(long, env = "BULKZIP_CSV_CHUNK", default_value_t = 10_000, global = true)]
    pub bulkzip_csv_chunk: u64,

    /// Maximum chunk files per archive.
    ///
    /// Environment variable: `BULKZIP_ZIP_CSVS`
    #[arg(long, env = "BULKZIP_ZIP_CSVS", default_value_t = 10, global = true)]
    pub bulkzip_zip_csvs: u64,

    /// Job ceiling for non-admin users. Must not exceed `BULKZIP_MAX_COUNT`.
    ///
    /// Environment variable: `BULKZIP_MAX_NONADMIN`
    #[arg(long, env = "BULKZIP_MAX_NONADMIN", default_value_t = 100_000, global = true)]
    pub bulkzip_max_nonadmin: u64,

    /// Job ceiling for admins.
    ///
    /// Environment variable: `BULKZIP_MAX_COUNT`
    #[arg(long, env = "BULKZIP_MAX_COUNT", default_value_t = 1_000_000, global = true)]
    pub bulkzip_max_count: u64,

    /// Comma-separated user ids with admin privileges.
    ///
    /// Environment variable: `ADMIN_USER_IDS`
    #[arg(long, env = "ADMIN_USER_IDS", default_value = "", global = true)]
    pub admin_user_ids: String,

    /// Emit a progress event every this many generated records.
    ///
    /// Environment variable: `PROGRESS_LOG_EVERY`
    #[arg(long, env = "PROGRESS_LOG_EVERY", default_value_t = 5_000, global = true)]
    pub progress_log_every: u64,

    /// Seconds to wait for workers to settle on shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3, global = true)]
    pub shutdown_timeout: u64,
}

impl TryFrom<CliArgs> for EngineConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let limits = [
            ("BULK_MAX_COUNT", args.bulk_max_count),
            ("BULKZIP_CSV_CHUNK", args.bulkzip_csv_chunk),
            ("BULKZIP_ZIP_CSVS", args.bulkzip_zip_csvs),
            ("BULKZIP_MAX_NONADMIN", args.bulkzip_max_nonadmin),
            ("BULKZIP_MAX_COUNT", args.bulkzip_max_count),
            ("PROGRESS_LOG_EVERY", args.progress_log_every),
        ];
        for (name, value) in limits {
            if value == 0 {
                bail!("{name} must be greater than 0");
            }
        }

        if args.bulkzip_max_nonadmin > args.bulkzip_max_count {
            bail!(
                "BULKZIP_MAX_NONADMIN ({}) exceeds BULKZIP_MAX_COUNT ({})",
                args.bulkzip_max_nonadmin,
                args.bulkzip_max_count
            );
        }

        let config = Self {
            quota: QuotaConfig {
                small_batch_max: args.bulk_max_count,
                csv_chunk_size: args.bulkzip_csv_chunk,
                zip_csvs_cap: args.bulkzip_zip_csvs,
                max_nonadmin: args.bulkzip_max_nonadmin,
                max_admin: args.bulkzip_max_count,
            },
            data_dir: args.data_dir,
            admin_ids: parse_admin_ids(&args.admin_user_ids)?,
            progress_log_every: args.progress_log_every,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_admin_ids(raw: &str) -> anyhow::Result<BTreeSet<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<u64>()
                .with_context(|| format!("ADMIN_USER_IDS contains an invalid user id: {id:?}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CliArgs {
        CliArgs {
            data_dir: PathBuf::from("/var/lib/seedmint"),
            bulk_max_count: 1_000,
            bulkzip_csv_chunk: 10_000,
            bulkzip_zip_csvs: 10,
            bulkzip_max_nonadmin: 100_000,
            bulkzip_max_count: 1_000_000,
            admin_user_ids: String::new(),
            progress_log_every: 5_000,
            shutdown_timeout: 3,
        }
    }

    #[test]
    fn converts_defaults() {
        let config = EngineConfig::try_from(args()).unwrap();
        assert_eq!(config.quota, QuotaConfig::default());
        assert_eq!(config.store_path(), PathBuf::from("/var/lib/seedmint/jobs.json"));
        assert!(config.admin_ids.is_empty());
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
    }

    #[test]
    fn parses_admin_list() {
        let mut args = args();
        args.admin_user_ids = " 12, 34 ,,56 ".to_string();
        let config = EngineConfig::try_from(args).unwrap();
        assert_eq!(config.admin_ids.into_iter().collect::<Vec<_>>(), vec![12, 34, 56]);
    }

    #[test]
    fn rejects_bad_admin_id() {
        let mut args = args();
        args.admin_user_ids = "12,alice".to_string();
        let err = EngineConfig::try_from(args).unwrap_err();
        assert!(err.to_string().contains("alice"));
    }

    #[test]
    fn rejects_zero_limit() {
        let mut args = args();
        args.bulkzip_zip_csvs = 0;
        let err = EngineConfig::try_from(args).unwrap_err();
        assert!(err.to_string().contains("BULKZIP_ZIP_CSVS"));
    }

    #[test]
    fn rejects_inverted_ceilings() {
        let mut args = args();
        args.bulkzip_max_nonadmin = 2_000_000;
        let err = EngineConfig::try_from(args).unwrap_err();
        assert!(err.to_string().contains("BULKZIP_MAX_NONADMIN"));
    }
}
