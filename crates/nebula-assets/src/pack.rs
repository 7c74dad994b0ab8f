//! Native resource pack format (NPCK) reading and writing.
//!
//! ## Binary Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Magic bytes `"NPCK"` |
//! | 4 | 4 | Format version (`u32`, little-endian, currently 1) |
//! | 8 | 4 | File count (`u32`, little-endian) |
//! | 12 | … | Directory: per file `u32` path length, UTF-8 path, `u64` data offset, `u64` size |
//! | … | … | File data |
//!
//! Data offsets are relative to the start of the pack. A pack appended to
//! another file (typically the game executable) is followed by a 12-byte
//! trailer: `u64` pack length, then the magic again, so it can be found by
//! reading backwards from the end of the host file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::PackError;

/// Magic bytes identifying a native pack.
pub const PACK_MAGIC: [u8; 4] = *b"NPCK";

/// Current native pack format version.
pub const PACK_FORMAT_VERSION: u32 = 1;

/// Length of the trailer written after an embedded pack.
const TRAILER_LEN: u64 = 12;

/// A file listed in a pack directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PackEntry {
    /// Pack-relative path, `/`-separated, without a scheme.
    pub path: String,
    /// Absolute byte offset of the file data inside the pack file.
    pub offset: u64,
    /// Size of the file data in bytes.
    pub size: u64,
}

/// Normalizes a path stored in a pack to its pack-relative form.
///
/// Strips a `res://` prefix and leading slashes, unifies separators and drops
/// `.` segments. Paths that climb out of the pack with `..` are rejected.
pub(crate) fn normalize_entry_path(path: &str) -> Result<String, PackError> {
    let path = path.strip_prefix("res://").unwrap_or(path).replace('\\', "/");
    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => return Err(PackError::InvalidPath(path.clone())),
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return Err(PackError::InvalidPath(path.clone()));
    }
    Ok(parts.join("/"))
}

fn truncated(e: std::io::Error) -> PackError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        PackError::Truncated("unexpected end of pack directory".to_string())
    } else {
        PackError::Io(e)
    }
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, PackError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(truncated)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64, PackError> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).map_err(truncated)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_magic<R: Read + Seek>(reader: &mut R, at: u64) -> Result<bool, PackError> {
    reader.seek(SeekFrom::Start(at))?;
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(truncated)?;
    Ok(magic == PACK_MAGIC)
}

/// Finds the start of a native pack inside `file`.
///
/// Looks for the magic at `offset` first, then for an embedded-pack trailer
/// at the end of the file. Returns `None` if the file is not a native pack.
pub(crate) fn locate(file: &mut File, offset: u64) -> Result<Option<u64>, PackError> {
    let len = file.metadata()?.len();

    if offset.checked_add(4).is_some_and(|end| end <= len) && read_magic(file, offset)? {
        return Ok(Some(offset));
    }

    if len >= TRAILER_LEN + 4 && read_magic(file, len - 4)? {
        file.seek(SeekFrom::Start(len - TRAILER_LEN))?;
        let pack_len = read_u64(file)?;
        let start = (len - TRAILER_LEN).checked_sub(pack_len);
        if let Some(start) = start.filter(|start| start + 4 <= len - TRAILER_LEN)
            && read_magic(file, start)?
        {
            return Ok(Some(start));
        }
    }

    Ok(None)
}

/// Reads the directory of the native pack starting at `pack_start`.
///
/// Every entry is checked against the file length so a truncated pack is
/// rejected before anything is indexed.
pub(crate) fn read_directory(file: &mut File, pack_start: u64) -> Result<Vec<PackEntry>, PackError> {
    let len = file.metadata()?.len();
    let header_end = pack_start
        .checked_add(12)
        .filter(|end| *end <= len)
        .ok_or_else(|| PackError::Truncated("pack header extends past end of file".to_string()))?;
    file.seek(SeekFrom::Start(pack_start + 4))?;

    let version = read_u32(file)?;
    if version != PACK_FORMAT_VERSION {
        return Err(PackError::UnrecognizedFormat(format!(
            "unsupported pack version {version}"
        )));
    }

    let count = read_u32(file)?;
    let mut entries = Vec::with_capacity(count.min(4096) as usize);
    for _ in 0..count {
        let path_len = u64::from(read_u32(file)?);
        let remaining = len.saturating_sub(file.stream_position()?);
        if path_len > remaining {
            return Err(PackError::Truncated(format!(
                "entry path of {path_len} bytes extends past end of file"
            )));
        }
        let mut raw = vec![0u8; path_len as usize];
        file.read_exact(&mut raw).map_err(truncated)?;
        let path = String::from_utf8(raw)
            .map_err(|e| PackError::InvalidPath(String::from_utf8_lossy(e.as_bytes()).into()))?;
        let path = normalize_entry_path(&path)?;

        let relative = read_u64(file)?;
        let size = read_u64(file)?;
        let offset = pack_start.checked_add(relative).filter(|offset| *offset >= header_end);
        let Some(offset) = offset.filter(|o| o.checked_add(size).is_some_and(|end| end <= len)) else {
            return Err(PackError::Truncated(format!("data for {path} extends past end of file")));
        };
        entries.push(PackEntry { path, offset, size });
    }

    Ok(entries)
}

/// Reads `size` bytes at `offset` from the pack at `path`.
pub(crate) fn read_range(path: &Path, offset: u64, size: u64) -> Result<Vec<u8>, PackError> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; size as usize];
    file.read_exact(&mut buf).map_err(truncated)?;
    Ok(buf)
}

/// Builds native packs from in-memory files.
#[derive(Debug, Default, Clone)]
pub struct PackBuilder {
    files: Vec<(String, Vec<u8>)>,
}

impl PackBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file. `path` may carry a `res://` prefix. A later file with the
    /// same path replaces the earlier one.
    pub fn add_file(&mut self, path: &str, data: impl Into<Vec<u8>>) -> Result<&mut Self, PackError> {
        let path = normalize_entry_path(path)?;
        let data = data.into();
        match self.files.iter_mut().find(|(p, _)| *p == path) {
            Some(existing) => existing.1 = data,
            None => self.files.push((path, data)),
        }
        Ok(self)
    }

    /// Number of files added so far.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if no files were added.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Serializes the pack to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let directory_len: usize = self
            .files
            .iter()
            .map(|(path, _)| 4 + path.len() + 8 + 8)
            .sum();
        let header_len = 4 + 4 + 4 + directory_len;
        let data_len: usize = self.files.iter().map(|(_, data)| data.len()).sum();

        let mut buf = Vec::with_capacity(header_len + data_len);
        buf.extend_from_slice(&PACK_MAGIC);
        buf.extend_from_slice(&PACK_FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&(self.files.len() as u32).to_le_bytes());

        let mut data_offset = header_len as u64;
        for (path, data) in &self.files {
            buf.extend_from_slice(&(path.len() as u32).to_le_bytes());
            buf.extend_from_slice(path.as_bytes());
            buf.extend_from_slice(&data_offset.to_le_bytes());
            buf.extend_from_slice(&(data.len() as u64).to_le_bytes());
            data_offset += data.len() as u64;
        }
        for (_, data) in &self.files {
            buf.extend_from_slice(data);
        }
        buf
    }

    /// Writes a standalone pack file.
    pub fn write_to(&self, path: &Path) -> Result<(), PackError> {
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }

    /// Appends the pack plus trailer to an existing file, returning the
    /// offset at which the pack starts.
    pub fn append_to(&self, path: &Path) -> Result<u64, PackError> {
        let bytes = self.to_bytes();
        let mut file = std::fs::OpenOptions::new().append(true).open(path)?;
        let start = file.metadata()?.len();
        file.write_all(&bytes)?;
        file.write_all(&(bytes.len() as u64).to_le_bytes())?;
        file.write_all(&PACK_MAGIC)?;
        Ok(start)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
