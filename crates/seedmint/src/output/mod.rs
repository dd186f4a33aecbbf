//! Sealed job output.
//!
//! Every file a job produces is written to a `.part` sibling first and only
//! renamed into place once it is complete and synced. A reference returned by
//! [`ChunkWriter::seal`] or [`ArchiveBuilder::seal`] therefore always points
//! at a closed file; on error the partial file is removed and nothing is
//! reported.
//!
//! Both writers do blocking file I/O and are meant to run on Tokio's
//! blocking pool.

mod archive;
mod chunk;

pub use archive::ArchiveBuilder;
pub use chunk::ChunkWriter;

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Path of the in-progress sibling for `target`.
fn part_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    target.with_file_name(name)
}

/// Runs `write` against the `.part` sibling of `target`, then renames it into
/// place. The partial file is removed if either step fails.
fn write_sealed<F>(target: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::storage(parent, e))?;
    }

    let part = part_path(target);
    write(&part)
        .and_then(|()| fs::rename(&part, target))
        .map_err(|e| {
            let _ = fs::remove_file(&part);
            Error::storage(target, e)
        })
}
