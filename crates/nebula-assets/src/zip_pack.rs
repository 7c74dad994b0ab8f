//! Zip archives mounted as resource packs.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use zip::ZipArchive;

use crate::error::PackError;
use crate::pack::normalize_entry_path;

/// A file entry in a zip pack: normalized pack path plus the raw archive name.
#[derive(Debug, Clone)]
pub(crate) struct ZipEntry {
    pub path: String,
    pub archive_name: String,
}

/// Lists the files of the zip archive in `file`. Directory entries are skipped.
pub(crate) fn read_directory(file: File) -> Result<Vec<ZipEntry>, PackError> {
    let mut archive = ZipArchive::new(file)
        .map_err(|e| PackError::UnrecognizedFormat(format!("not a zip archive: {e}")))?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let archive_name = entry.name().to_string();
        entries.push(ZipEntry {
            path: normalize_entry_path(&archive_name)?,
            archive_name,
        });
    }
    Ok(entries)
}

/// Reads one entry out of the zip pack at `path`.
pub(crate) fn read_entry(path: &Path, archive_name: &str) -> Result<Vec<u8>, PackError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut entry = archive.by_name(archive_name)?;
    let mut buf = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}
