//! Pack overlay: an index of files from every mounted resource pack.
//!
//! Packs are mounted in order and never unmounted. When two packs contain the
//! same path, the `replace_files` flag of the later mount decides which one
//! the index keeps. The first successful mount activates the overlay for the
//! rest of the process; see [`crate::ResourceFs`].

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::error::{FsError, PackError};
use crate::pack::{self, normalize_entry_path};
use crate::zip_pack;

/// Container format of a mounted pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackFormat {
    /// Native NPCK pack, standalone or embedded in another file.
    Native,
    /// Zip archive.
    Zip,
}

/// A successfully mounted pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackMount {
    /// Path of the pack file on disk.
    pub source: PathBuf,
    /// Offset requested by the caller.
    pub offset: u64,
    /// Whether this mount shadowed files indexed by earlier mounts.
    pub replace_files: bool,
    /// Detected container format.
    pub format: PackFormat,
    /// Number of files listed in the pack.
    pub file_count: usize,
}

#[derive(Debug, Clone)]
enum Location {
    Range { offset: u64, size: u64 },
    ZipEntry(String),
}

#[derive(Debug, Clone)]
struct PackedFile {
    mount: usize,
    location: Location,
}

#[derive(Debug, Default)]
struct OverlayState {
    mounts: Vec<PackMount>,
    files: HashMap<String, PackedFile>,
    dirs: HashSet<String>,
}

/// Registry of mounted packs and the merged file index.
#[derive(Debug, Default)]
pub struct PackOverlay {
    disabled: AtomicBool,
    state: RwLock<OverlayState>,
}

impl PackOverlay {
    /// Creates an empty, enabled overlay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables mounting. A disabled overlay rejects every mount.
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::Release);
    }

    /// Returns `true` if mounting has been disabled by the host.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Acquire)
    }

    /// Returns `true` once at least one pack has been mounted.
    pub fn is_active(&self) -> bool {
        !self.read_state().mounts.is_empty()
    }

    /// Mounts the pack at `source`.
    ///
    /// `offset` is where a native pack starts inside the file; packs appended
    /// to an executable are also found through their trailer. Returns the
    /// number of index entries this mount added or replaced.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Disabled`] if the overlay is disabled, and an I/O
    /// or format error if the file cannot be opened or is not a pack. The
    /// index is left untouched on error.
    pub fn mount(&self, source: &Path, replace_files: bool, offset: u64) -> Result<usize, PackError> {
        if self.is_disabled() {
            return Err(PackError::Disabled);
        }

        let mut file = File::open(source)?;
        let (format, files) = match pack::locate(&mut file, offset)? {
            Some(start) => {
                let entries = pack::read_directory(&mut file, start)?;
                let files: Vec<_> = entries
                    .into_iter()
                    .map(|e| {
                        let location = Location::Range { offset: e.offset, size: e.size };
                        (e.path, location)
                    })
                    .collect();
                (PackFormat::Native, files)
            }
            None => {
                let entries = zip_pack::read_directory(file)?;
                let files: Vec<_> = entries
                    .into_iter()
                    .map(|e| (e.path, Location::ZipEntry(e.archive_name)))
                    .collect();
                (PackFormat::Zip, files)
            }
        };

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mount = state.mounts.len();
        let file_count = files.len();
        let mut indexed = 0;
        for (path, location) in files {
            register_dirs(&mut state.dirs, &path);
            if !replace_files && state.files.contains_key(&path) {
                continue;
            }
            state.files.insert(path, PackedFile { mount, location });
            indexed += 1;
        }
        state.mounts.push(PackMount {
            source: source.to_path_buf(),
            offset,
            replace_files,
            format,
            file_count,
        });

        tracing::info!(
            "Mounted {:?} pack {} ({} files, {} indexed)",
            format,
            source.display(),
            file_count,
            indexed
        );
        Ok(indexed)
    }

    /// Snapshot of all mounts in mount order.
    pub fn mounts(&self) -> Vec<PackMount> {
        self.read_state().mounts.clone()
    }

    /// Number of distinct files in the merged index.
    pub fn file_count(&self) -> usize {
        self.read_state().files.len()
    }

    /// Returns `true` if `path` (with or without `res://`) is a packed file.
    pub fn contains(&self, path: &str) -> bool {
        normalize_entry_path(path).is_ok_and(|key| self.read_state().files.contains_key(&key))
    }

    /// Returns `true` if `path` is a directory containing packed files.
    pub fn dir_exists(&self, path: &str) -> bool {
        match normalize_entry_path(path) {
            Ok(key) => self.read_state().dirs.contains(&key),
            // `res://` itself.
            Err(_) => path.trim_start_matches("res://").trim_matches('/').is_empty(),
        }
    }

    /// Returns the pack file that currently provides `path`.
    pub fn source_of(&self, path: &str) -> Option<PathBuf> {
        let key = normalize_entry_path(path).ok()?;
        let state = self.read_state();
        let file = state.files.get(&key)?;
        Some(state.mounts[file.mount].source.clone())
    }

    /// Reads the packed file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::NotFound`] if no mounted pack provides the path.
    pub fn read(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let key = normalize_entry_path(path).map_err(|_| FsError::NotFound(path.to_string()))?;
        let (source, location) = {
            let state = self.read_state();
            let file = state
                .files
                .get(&key)
                .ok_or_else(|| FsError::NotFound(path.to_string()))?;
            (state.mounts[file.mount].source.clone(), file.location.clone())
        };

        let data = match location {
            Location::Range { offset, size } => pack::read_range(&source, offset, size)?,
            Location::ZipEntry(name) => zip_pack::read_entry(&source, &name)?,
        };
        Ok(data)
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, OverlayState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn register_dirs(dirs: &mut HashSet<String>, path: &str) {
    let mut end = path.len();
    while let Some(sep) = path[..end].rfind('/') {
        if !dirs.insert(path[..sep].to_string()) {
            break;
        }
        end = sep;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
