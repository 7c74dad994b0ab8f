//! Error types for pack mounting and resource access.

/// Errors that can occur while opening or mounting a resource pack.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    /// The pack file could not be opened or read.
    #[error("failed to read pack: {0}")]
    Io(#[from] std::io::Error),

    /// The file is neither a native pack nor a zip archive.
    #[error("unrecognized pack format: {0}")]
    UnrecognizedFormat(String),

    /// The pack overlay has been disabled by the host.
    #[error("pack overlay is disabled")]
    Disabled,

    /// The pack directory ends before all declared entries were read.
    #[error("pack truncated: {0}")]
    Truncated(String),

    /// An entry path is not valid UTF-8 or escapes the pack root.
    #[error("invalid pack entry path: {0}")]
    InvalidPath(String),

    /// The zip reader rejected the archive or an entry.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Errors returned by [`crate::FileSystem`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// No file exists at the given path in the active backend.
    #[error("file not found: {0}")]
    NotFound(String),

    /// The file exists but could not be read.
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Reading the file out of a mounted pack failed.
    #[error("failed to read packed file: {0}")]
    Pack(#[from] PackError),
}

impl FsError {
    /// Returns `true` if this error means "nothing there" rather than a read failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            Self::Pack(PackError::Io(e)) => e.kind() == std::io::ErrorKind::NotFound,
            Self::Pack(_) => false,
        }
    }
}
