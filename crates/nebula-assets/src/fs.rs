//! Filesystem backends for resource access.
//!
//! [`DiskFs`] maps `res://` onto a directory on disk and passes every other
//! path through to the OS. [`ResourceFs`] composes the disk with a
//! [`PackOverlay`]: until a pack is mounted it reads from disk, afterwards
//! every `res://` path is served by the overlay alone.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::FsError;
use crate::overlay::PackOverlay;

/// Scheme prefix of project-relative resource paths.
pub const RESOURCE_SCHEME: &str = "res://";

/// Read access to files by path.
pub trait FileSystem: Send + Sync {
    /// Returns `true` if a file exists at `path`.
    fn exists(&self, path: &str) -> bool;

    /// Reads the whole file at `path`.
    fn read(&self, path: &str) -> Result<Vec<u8>, FsError>;

    /// Reads the file at `path` as UTF-8 text.
    fn read_to_string(&self, path: &str) -> Result<String, FsError> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
    }
}

/// Direct disk access with `res://` mapped onto a resource root.
#[derive(Debug, Default)]
pub struct DiskFs {
    root: RwLock<String>,
}

impl DiskFs {
    /// Creates a disk backend rooted at `root` (may be empty).
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: RwLock::new(root.into()) }
    }

    /// Current resource root, `/`-separated, without a trailing slash.
    pub fn root(&self) -> String {
        self.root.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replaces the resource root.
    pub fn set_root(&self, root: impl Into<String>) {
        *self.root.write().unwrap_or_else(PoisonError::into_inner) = root.into();
    }

    /// Resolves `path` to an OS path. `res://` paths are joined onto the root;
    /// with an empty root they resolve relative to the working directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        match path.strip_prefix(RESOURCE_SCHEME) {
            Some(rel) => {
                let root = self.root();
                if root.is_empty() {
                    PathBuf::from(rel)
                } else {
                    PathBuf::from(root).join(rel)
                }
            }
            None => PathBuf::from(path),
        }
    }
}

impl FileSystem for DiskFs {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let resolved = self.resolve(path);
        std::fs::read(&resolved).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FsError::NotFound(path.to_string())
            } else {
                FsError::Io(e)
            }
        })
    }
}

impl FileSystem for PackOverlay {
    fn exists(&self, path: &str) -> bool {
        self.contains(path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, FsError> {
        PackOverlay::read(self, path)
    }
}

/// Composite resource filesystem handed to everything that loads project files.
#[derive(Debug)]
pub struct ResourceFs {
    disk: DiskFs,
    overlay: Arc<PackOverlay>,
}

impl ResourceFs {
    /// Creates a composite over a disk root and a (possibly empty) overlay.
    pub fn new(root: impl Into<String>, overlay: Arc<PackOverlay>) -> Self {
        Self { disk: DiskFs::new(root), overlay }
    }

    /// The disk backend.
    pub fn disk(&self) -> &DiskFs {
        &self.disk
    }

    /// The pack overlay.
    pub fn overlay(&self) -> &Arc<PackOverlay> {
        &self.overlay
    }

    /// Returns `true` if `res://` access is currently served by the overlay.
    pub fn is_redirected(&self) -> bool {
        self.overlay.is_active()
    }

    fn backend_for(&self, path: &str) -> &dyn FileSystem {
        if path.starts_with(RESOURCE_SCHEME) && self.overlay.is_active() {
            self.overlay.as_ref()
        } else {
            &self.disk
        }
    }
}

impl FileSystem for ResourceFs {
    fn exists(&self, path: &str) -> bool {
        self.backend_for(path).exists(path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, FsError> {
        self.backend_for(path).read(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
