use super::{JobStore, JobTable};
use crate::error::{Error, Result};
use crate::job::{Job, JobId};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// JSON-file job store.
///
/// The whole table is held in memory and the file is rewritten on every
/// update: serialized to a sibling temp file, synced, then renamed over the
/// previous version so readers never observe a half-written table. If the
/// write fails the in-memory table is rolled back to match the file.
pub struct FileJobStore {
    path: PathBuf,
    table: Mutex<JobTable>,
}

impl FileJobStore {
    /// Opens the store at `path`, loading existing records if the file
    /// exists. Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreFailure`] if the directory cannot be created or
    /// the existing file cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                Error::store(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let jobs = if path.exists() {
            load(&path)?
        } else {
            Vec::new()
        };

        #[cfg(feature = "tracing")]
        tracing::debug!("Loaded {} job records from {}", jobs.len(), path.display());

        Ok(Self {
            path,
            table: Mutex::new(JobTable::from_jobs(jobs)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, table: &JobTable) -> Result<()> {
        let mut jobs: Vec<&Job> = table.values().collect();
        jobs.sort_by(|a, b| a.creation_key().cmp(&b.creation_key()));

        let tmp = self.path.with_extension("json.tmp");
        let write = || -> std::io::Result<()> {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &jobs)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
            drop(writer);
            fs::rename(&tmp, &self.path)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::store(format!("cannot write {}: {e}", self.path.display()))
        })
    }
}

fn load(path: &Path) -> Result<Vec<Job>> {
    let file = File::open(path)
        .map_err(|e| Error::store(format!("cannot open {}: {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::store(format!("cannot parse {}: {e}", path.display())))
}

impl JobStore for FileJobStore {
    fn put(&self, job: &Job) -> Result<()> {
        let mut table = self.table.lock();
        let previous = table.insert(job.clone());
        if let Err(e) = self.persist(&table) {
            table.restore(&job.id, previous);
            return Err(e);
        }
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
        let mut table = self.table.lock();
        let live: Vec<JobId> = table
            .values()
            .filter(|job| job.status.is_live())
            .map(|job| job.id.clone())
            .collect();
        if live.is_empty() {
            return Ok(0);
        }

        let before = table.snapshot(&live);
        let recovered = table.recover();
        if let Err(e) = self.persist(&table) {
            table.revert(before);
            return Err(e);
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Marked {} interrupted jobs as failed in {}",
            recovered.len(),
            self.path.display()
        );

        Ok(recovered.len())
    }
}
