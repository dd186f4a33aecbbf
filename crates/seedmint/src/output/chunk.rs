use super::write_sealed;
use crate::chain::Chain;
use crate::deriver::CredentialRecord;
use crate::error::Result;
use crate::job::{ChunkRef, JobId};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Writes buffered records to fixed-schema CSV chunk files.
///
/// Files land in `<root>/<job id>/wallets_<CHAIN>_<first>_<last>.csv`, where
/// `first` and `last` are the inclusive job-wide sequence numbers of the rows
/// inside. The header is `index,row,chain,address,derivation_path,secret`.
#[derive(Clone, Debug)]
pub struct ChunkWriter {
    root: PathBuf,
}

const HEADER: [&str; 6] = ["index", "row", "chain", "address", "derivation_path", "secret"];

/// One CSV line. Field order is the column order.
#[derive(Serialize)]
struct Row<'a> {
    index: u64,
    row: u64,
    chain: Chain,
    address: &'a str,
    derivation_path: &'a str,
    secret: &'a str,
}

impl ChunkWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every file of `job`.
    pub fn job_dir(&self, job: &JobId) -> PathBuf {
        self.root.join(job.as_str())
    }

    /// Serializes `records` in order as chunk `index` of `job`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageWriteFailure`] if the file cannot be written;
    /// no partial file is left behind.
    ///
    /// [`Error::StorageWriteFailure`]: crate::Error::StorageWriteFailure
    pub fn seal(
        &self,
        job: &JobId,
        chain: Chain,
        index: u64,
        first_sequence: u64,
        records: &[CredentialRecord],
    ) -> Result<ChunkRef> {
        let rows = records.len() as u64;
        let last = first_sequence + rows.saturating_sub(1);
        let path = self
            .job_dir(job)
            .join(format!("wallets_{chain}_{first_sequence}_{last}.csv"));

        write_sealed(&path, |part| {
            let file = File::create(part)?;
            let mut writer = csv::Writer::from_writer(file);
            for (row, record) in (0_u64..).zip(records) {
                writer.serialize(Row {
                    index: first_sequence + row,
                    row,
                    chain: record.chain,
                    address: &record.address,
                    derivation_path: &record.derivation_path,
                    secret: &record.secret,
                })?;
            }
            if records.is_empty() {
                // `serialize` writes the header lazily.
                writer.write_record(HEADER)?;
            }
            writer.flush()?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()
        })?;

        #[cfg(feature = "tracing")]
        tracing::debug!("Sealed chunk {index} of job {job} ({rows} rows)");

        Ok(ChunkRef {
            index,
            path,
            rows,
            first_sequence,
        })
    }
}
