use anyhow::Context;
use clap::Subcommand;
use seedmint::{Chain, EngineConfig, FileJobStore, Job, JobId, JobStore};
use std::io::Write;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List jobs, oldest first.
    Jobs {
        /// Only show jobs owned by this user id.
        #[arg(long)]
        owner: Option<u64>,
        /// Print the listing records as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show one job with its chunk and archive references.
    Show {
        job_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Mark jobs left live by a stopped service as failed.
    ///
    /// Only run this while no service holds the store open.
    Recover,
    /// List the supported chains.
    Chains,
    /// Print the effective configuration.
    Config,
}

pub fn run(command: &Command, config: &EngineConfig, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Command::Jobs { owner, json } => {
            let store = open_store(config)?;
            let jobs = match owner {
                Some(owner) => store.list_by_owner(*owner)?,
                None => store.list_all()?,
            };
            if *json {
                serde_json::to_writer_pretty(&mut *out, &jobs)?;
                writeln!(out)?;
            } else {
                write_job_table(out, &jobs)?;
            }
        }
        Command::Show { job_id, json } => {
            let store = open_store(config)?;
            let job = store.get(&JobId::from(job_id.as_str()))?;
            if *json {
                serde_json::to_writer_pretty(&mut *out, &job)?;
                writeln!(out)?;
            } else {
                write_job_detail(out, &job)?;
            }
        }
        Command::Recover => {
            let store = open_store(config)?;
            let recovered = store.recover_on_startup()?;
            tracing::info!("Recovered {} in {}", recovered, store.path().display());
            writeln!(out, "{recovered} interrupted jobs marked failed")?;
        }
        Command::Chains => {
            writeln!(
                out,
                "{:<8} {:<18} {:<18} {}",
                "CHAIN", "NAME", "DERIVATION PATH", "ADDRESS"
            )?;
            for chain in Chain::ALL {
                let info = chain.info();
                writeln!(
                    out,
                    "{:<8} {:<18} {:<18} {}",
                    chain.as_str(),
                    info.name,
                    info.derivation_path,
                    info.address_format
                )?;
            }
        }
        Command::Config => {
            let quota = &config.quota;
            writeln!(out, "data_dir              {}", config.data_dir.display())?;
            writeln!(out, "store                 {}", config.store_path().display())?;
            writeln!(out, "small_batch_max       {}", quota.small_batch_max)?;
            writeln!(out, "csv_chunk_size        {}", quota.csv_chunk_size)?;
            writeln!(out, "zip_csvs_cap          {}", quota.zip_csvs_cap)?;
            writeln!(out, "max_nonadmin          {}", quota.max_nonadmin)?;
            writeln!(out, "max_admin             {}", quota.max_admin)?;
            let admins: Vec<String> = config.admin_ids.iter().map(u64::to_string).collect();
            writeln!(out, "admin_ids             {}", admins.join(","))?;
            writeln!(out, "progress_log_every    {}", config.progress_log_every)?;
            writeln!(out, "shutdown_timeout      {:?}", config.shutdown_timeout)?;
        }
    }
    Ok(())
}

fn open_store(config: &EngineConfig) -> anyhow::Result<FileJobStore> {
    let path = config.store_path();
    FileJobStore::open(&path).with_context(|| format!("cannot open job store {}", path.display()))
}

fn write_job_table(out: &mut impl Write, jobs: &[Job]) -> std::io::Result<()> {
    writeln!(
        out,
        "{:<16} {:>12} {:<8} {:<9} {:>21} {:>6} {:>8}",
        "ID", "OWNER", "CHAIN", "STATUS", "PROGRESS", "CHUNKS", "ARCHIVES"
    )?;
    for job in jobs {
        writeln!(
            out,
            "{:<16} {:>12} {:<8} {:<9} {:>21} {:>6} {:>8}",
            job.id.as_str(),
            job.owner,
            job.chain.as_str(),
            job.status.as_str(),
            format!("{}/{}", job.generated_count, job.total_count),
            job.chunk_index,
            job.archive_refs.len()
        )?;
    }
    Ok(())
}

fn write_job_detail(out: &mut impl Write, job: &Job) -> std::io::Result<()> {
    writeln!(out, "id          {}", job.id)?;
    writeln!(out, "owner       {}", job.owner)?;
    writeln!(out, "chain       {}", job.chain)?;
    writeln!(out, "status      {}", job.status)?;
    writeln!(out, "progress    {}/{}", job.generated_count, job.total_count)?;
    writeln!(out, "created     {}", job.created_at)?;
    writeln!(out, "updated     {}", job.updated_at)?;
    if let Some(reason) = &job.failure {
        writeln!(out, "failure     {reason}")?;
    }
    for chunk in &job.chunk_refs {
        writeln!(
            out,
            "chunk {:>4}  {} rows  {}",
            chunk.index,
            chunk.rows,
            chunk.path.display()
        )?;
    }
    for archive in &job.archive_refs {
        writeln!(
            out,
            "archive {:>2}  {} chunks  {}",
            archive.index,
            archive.chunk_indices.len(),
            archive.path.display()
        )?;
    }
    Ok(())
}
