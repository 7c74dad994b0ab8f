//! Host platform queries used by the settings store.

use std::collections::HashSet;
use std::path::PathBuf;

/// What the store needs to know about the host OS and build.
///
/// Implementations must not call back into the settings store: feature
/// checks run while the store lock is held.
pub trait Platform: Send + Sync {
    /// Returns `true` if the named feature tag is active.
    fn has_feature(&self, feature: &str) -> bool;

    /// Path of the running executable, if known.
    fn executable_path(&self) -> Option<PathBuf>;

    /// Directory `user://` maps to, `/`-separated, or empty.
    fn user_data_dir(&self) -> String;

    /// Host-imposed resource directory. When set it replaces project discovery.
    fn resource_dir(&self) -> Option<String> {
        None
    }
}

/// The platform of the running process.
#[derive(Debug, Clone)]
pub struct NativePlatform {
    app_name: String,
    features: HashSet<String>,
}

impl NativePlatform {
    /// Creates the native platform for an application. `app_name` selects
    /// the user data directory.
    pub fn new(app_name: impl Into<String>) -> Self {
        let mut features: HashSet<String> = [
            std::env::consts::OS,
            std::env::consts::ARCH,
            if cfg!(debug_assertions) { "debug" } else { "release" },
            if cfg!(target_pointer_width = "64") { "64" } else { "32" },
        ]
        .into_iter()
        .map(str::to_string)
        .collect();
        if cfg!(any(target_os = "linux", target_os = "windows", target_os = "macos")) {
            features.insert("pc".to_string());
        }
        Self {
            app_name: app_name.into(),
            features,
        }
    }

    /// Active feature tags.
    pub fn features(&self) -> &HashSet<String> {
        &self.features
    }
}

impl Platform for NativePlatform {
    fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    fn executable_path(&self) -> Option<PathBuf> {
        std::env::current_exe().ok()
    }

    fn user_data_dir(&self) -> String {
        dirs::data_dir()
            .map(|d| d.join("nebula").join("app_userdata").join(&self.app_name))
            .map(|d| d.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default()
    }
}

/// A platform with fixed answers, for embedding hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPlatform {
    /// Active feature tags.
    pub features: HashSet<String>,
    /// Reported executable path.
    pub executable: Option<PathBuf>,
    /// Reported user data directory.
    pub user_data_dir: String,
    /// Reported resource directory override.
    pub resource_dir: Option<String>,
}

impl StaticPlatform {
    /// Creates a platform with the given feature tags active.
    pub fn with_features<'a>(features: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            features: features.into_iter().map(str::to_string).collect(),
            ..Self::default()
        }
    }
}

impl Platform for StaticPlatform {
    fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    fn executable_path(&self) -> Option<PathBuf> {
        self.executable.clone()
    }

    fn user_data_dir(&self) -> String {
        self.user_data_dir.clone()
    }

    fn resource_dir(&self) -> Option<String> {
        self.resource_dir.clone()
    }
}
