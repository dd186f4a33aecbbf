use super::write_sealed;
use crate::chain::Chain;
use crate::error::{Error, Result};
use crate::job::{ArchiveRef, ChunkRef, JobId};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Bundles sealed chunk files into `backup_<CHAIN>_<NNN>.tar.gz` archives.
///
/// Chunk files are streamed into the archive one at a time and are left in
/// place afterwards.
#[derive(Clone, Debug)]
pub struct ArchiveBuilder {
    root: PathBuf,
}

impl ArchiveBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Seals `chunks` as archive `index` of `job`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageWriteFailure`] if a chunk cannot be read or the
    /// archive cannot be written; no partial archive is left behind.
    pub fn seal(
        &self,
        job: &JobId,
        chain: Chain,
        index: u64,
        chunks: &[ChunkRef],
    ) -> Result<ArchiveRef> {
        let path = self
            .root
            .join(job.as_str())
            .join(format!("backup_{chain}_{index:03}.tar.gz"));

        for chunk in chunks {
            if !chunk.path.is_file() {
                return Err(Error::storage(
                    &chunk.path,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "sealed chunk is missing"),
                ));
            }
        }

        write_sealed(&path, |part| {
            let file = File::create(part)?;
            let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
            let mut tar = tar::Builder::new(encoder);
            for chunk in chunks {
                let name = chunk.path.file_name().unwrap_or_default();
                tar.append_path_with_name(&chunk.path, name)?;
            }
            let mut buffered = tar.into_inner()?.finish()?;
            buffered.flush()?;
            let file = buffered.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()
        })?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Sealed archive {index} of job {job} ({} chunks)",
            chunks.len()
        );

        Ok(ArchiveRef {
            index,
            path,
            chunk_indices: chunks.iter().map(|c| c.index).collect(),
        })
    }
}
