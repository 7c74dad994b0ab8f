//! Settings error types.

use nebula_assets::FsError;

/// Errors that can occur when querying, loading or saving project settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// A setting or project file that does not exist was referenced.
    #[error("nonexistent project setting: {0}")]
    NotFound(String),

    /// The hidden prefix has already been registered.
    #[error("hidden prefix '{0}' already exists")]
    DuplicatePrefix(String),

    /// A settings file exists but could not be read.
    #[error("failed to read settings: {0}")]
    Read(#[from] FsError),

    /// A settings file could not be written.
    #[error("failed to write settings: {0}")]
    Write(#[source] std::io::Error),

    /// A text settings file is malformed.
    #[error("failed to parse {path}:{line}: {message}")]
    Parse {
        /// File being parsed.
        path: String,
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// A binary settings file is malformed.
    #[error("invalid binary settings: {0}")]
    InvalidBinary(String),

    /// The file was written by a newer, incompatible engine.
    #[error("config_version {found} is newer than the supported version {supported}")]
    NewerVersion {
        /// Version found in the file.
        found: i64,
        /// Highest version this build understands.
        supported: i64,
    },

    /// An explicitly requested resource pack could not be mounted.
    #[error("cannot open resource pack '{0}'")]
    CannotOpenPack(String),

    /// Failed to serialize a value to RON.
    #[error("failed to serialize setting: {0}")]
    Serialize(#[from] ron::Error),
}

impl SettingsError {
    /// Returns `true` if the error means "not there" rather than "broken".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Read(e) => e.is_not_found(),
            _ => false,
        }
    }
}
