//! Project discovery at startup.
//!
//! [`ProjectSettings::setup`] finds the project's settings in the first
//! place that has them:
//!
//! 1. an explicitly given main pack,
//! 2. a pack embedded in or next to the executable,
//! 3. the host's resource directory,
//! 4. a directory on disk, optionally walking up towards the filesystem root.
//!
//! Probing steps that find nothing move on to the next source; an explicit
//! main pack that cannot be opened, or a settings file that exists but is
//! broken, stops setup with an error.

use std::path::{Path, PathBuf};

use crate::error::SettingsError;
use crate::events::SettingsEvent;
use crate::loader::{OVERRIDE_FILE, PROJECT_BINARY_FILE, PROJECT_FILE};
use crate::store::ProjectSettings;
use crate::value::Value;

/// Extension of resource packs looked up next to the executable.
pub const PACK_EXTENSION: &str = "pck";

/// Setting naming an extra text settings file applied after the project's.
pub const PROJECT_SETTINGS_OVERRIDE_KEY: &str = "application/config/project_settings_override";

/// Setting selecting a hidden (`.nebula`) or visible (`nebula`) data directory.
pub const HIDDEN_DATA_DIR_KEY: &str = "application/config/use_hidden_project_data_directory";

/// Where and how to look for the project.
#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    /// Directory to search for loose project files. Empty means the working directory.
    pub path: String,
    /// Pack to load the project from instead of searching.
    pub main_pack: Option<String>,
    /// Keep searching parent directories when `path` has no project.
    pub upwards: bool,
    /// Skip `override.cfg` and the project settings override file.
    pub ignore_override: bool,
    /// Settings applied after all files were loaded.
    pub overrides: Vec<(String, Value)>,
}

impl ProjectSettings {
    /// Finds and loads the project, then applies overrides.
    ///
    /// # Errors
    ///
    /// [`SettingsError::CannotOpenPack`] if `main_pack` cannot be mounted,
    /// [`SettingsError::NotFound`] if no project was found, or the error of a
    /// settings file that exists but could not be loaded.
    pub fn setup(&self, options: &SetupOptions) -> Result<(), SettingsError> {
        self.setup_sources(options)?;

        self.apply_overrides(&options.overrides);
        if !options.ignore_override {
            self.apply_project_settings_override();
        }
        self.update_project_data_dir_name();
        self.set_project_loaded(true);

        log::info!("Project loaded from {}", self.describe_source());
        Ok(())
    }

    fn setup_sources(&self, options: &SetupOptions) -> Result<(), SettingsError> {
        let resource_dir = self.platform().resource_dir().filter(|d| !d.is_empty());
        if let Some(dir) = &resource_dir {
            self.set_resource_path(dir);
        }

        if let Some(pack) = &options.main_pack {
            if !self.load_resource_pack(pack, false, 0) {
                log::error!("Cannot open resource pack '{pack}'.");
                return Err(SettingsError::CannotOpenPack(pack.clone()));
            }
            self.load_project_files()?;
            if !options.ignore_override {
                self.apply_override_file(&sibling(Path::new(pack), OVERRIDE_FILE));
            }
            return Ok(());
        }

        if let Some(exe) = self.platform().executable_path() {
            if self.mount_executable_pack(&exe) {
                self.load_project_files()?;
                if !options.ignore_override {
                    self.apply_override_file(&sibling(&exe, OVERRIDE_FILE));
                }
                return Ok(());
            }
        }

        if resource_dir.is_some() {
            self.load_project_files()?;
            if !options.ignore_override {
                self.apply_override_file(&format!("res://{OVERRIDE_FILE}"));
            }
            return Ok(());
        }

        self.search_directories(options)
    }

    /// Tries the executable itself, then `<stem>.pck` and `<name>.pck` next to it.
    fn mount_executable_pack(&self, exe: &Path) -> bool {
        let mut candidates = vec![exe.to_path_buf()];
        if let (Some(dir), Some(stem), Some(name)) = (exe.parent(), exe.file_stem(), exe.file_name()) {
            let mut by_stem = stem.to_os_string();
            by_stem.push(format!(".{PACK_EXTENSION}"));
            let mut by_name = name.to_os_string();
            by_name.push(format!(".{PACK_EXTENSION}"));
            candidates.push(dir.join(by_stem));
            candidates.push(dir.join(by_name));
        }

        candidates.iter().any(|candidate| {
            candidate.is_file() && self.load_resource_pack(&path_string(candidate), false, 0)
        })
    }

    fn search_directories(&self, options: &SetupOptions) -> Result<(), SettingsError> {
        let start = absolute_start_dir(&options.path)?;

        let mut current = Some(start.as_path());
        while let Some(dir) = current {
            self.set_resource_path(&path_string(dir));
            match self.load_project_files() {
                Ok(()) => {
                    if !options.ignore_override {
                        self.apply_override_file(&sibling_in(dir, OVERRIDE_FILE));
                    }
                    return Ok(());
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
            if !options.upwards {
                break;
            }
            current = dir.parent();
        }

        self.set_resource_path(&path_string(&start));
        log::error!(
            "No {PROJECT_FILE} or {PROJECT_BINARY_FILE} found in '{}'{}.",
            start.display(),
            if options.upwards { " or its parents" } else { "" }
        );
        Err(SettingsError::NotFound(path_string(&start)))
    }

    fn apply_project_settings_override(&self) {
        let Some(path) = self.try_get_with_override(PROJECT_SETTINGS_OVERRIDE_KEY) else {
            return;
        };
        let path = path.to_text();
        if path.is_empty() {
            return;
        }
        if let Err(e) = self.load_settings_text(&path) {
            log::error!("Cannot load project settings override '{path}': {e}");
        }
    }

    fn update_project_data_dir_name(&self) {
        let hidden = self
            .try_get_with_override(HIDDEN_DATA_DIR_KEY)
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let name = if hidden { ".nebula" } else { "nebula" };
        self.set_project_data_dir_name(name.to_string());
    }

    fn describe_source(&self) -> String {
        match self.overlay().mounts().first() {
            Some(mount) => mount.source.display().to_string(),
            None => self.resource_path(),
        }
    }

    /// Mounts a resource pack. Returns `false` if it could not be mounted.
    ///
    /// Mounting after the project was loaded invalidates cached class lists
    /// and resource ids, so [`SettingsEvent::GlobalClassesChanged`] and
    /// [`SettingsEvent::UidCacheChanged`] are emitted.
    pub fn load_resource_pack(&self, path: &str, replace_files: bool, offset: u64) -> bool {
        let os_path = self.globalize_path(path);
        match self.overlay().mount(Path::new(&os_path), replace_files, offset) {
            Ok(count) => {
                log::info!("Mounted resource pack {os_path} ({count} files)");
                if self.is_project_loaded() {
                    self.emit(SettingsEvent::GlobalClassesChanged);
                    self.emit(SettingsEvent::UidCacheChanged);
                }
                true
            }
            Err(e) => {
                log::debug!("Could not mount resource pack '{os_path}': {e}");
                false
            }
        }
    }
}

/// Resolves the search start against the working directory so that parent
/// walks and the resource path are absolute.
fn absolute_start_dir(path: &str) -> Result<PathBuf, SettingsError> {
    let cwd = || std::env::current_dir().map_err(|e| SettingsError::Read(e.into()));
    if path.is_empty() {
        return cwd();
    }
    match std::fs::canonicalize(path) {
        Ok(dir) => Ok(strip_verbatim(dir)),
        Err(_) if Path::new(path).is_absolute() => Ok(PathBuf::from(path)),
        Err(_) => Ok(cwd()?.join(path)),
    }
}

/// Drops the `\\?\` prefix Windows puts on canonical paths.
fn strip_verbatim(path: PathBuf) -> PathBuf {
    match path.to_str().and_then(|s| s.strip_prefix(r"\\?\")) {
        Some(rest) if !rest.starts_with("UNC") => PathBuf::from(rest),
        _ => path,
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn sibling(file: &Path, name: &str) -> String {
    match file.parent() {
        Some(dir) => sibling_in(dir, name),
        None => name.to_string(),
    }
}

fn sibling_in(dir: &Path, name: &str) -> String {
    path_string(&dir.join(name))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nebula_assets::PackBuilder;

    use super::*;
    use crate::platform::StaticPlatform;

    fn empty_settings() -> ProjectSettings {
        ProjectSettings::new(Arc::new(StaticPlatform::default()))
    }

    fn canonical(dir: &Path) -> String {
        path_string(&std::fs::canonicalize(dir).unwrap())
    }

    fn options_for(dir: &Path) -> SetupOptions {
        SetupOptions {
            path: canonical(dir),
            ..SetupOptions::default()
        }
    }

    #[test]
    fn test_loose_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_FILE), "[application]\nconfig/name=\"Loose\"\n").unwrap();

        let settings = empty_settings();
        settings.setup(&options_for(dir.path())).unwrap();
        assert!(settings.is_project_loaded());
        assert_eq!(settings.get("application/config/name"), Value::from("Loose"));
        assert_eq!(settings.resource_path(), canonical(dir.path()));
        assert_eq!(settings.project_data_dir_name(), ".nebula");
    }

    #[test]
    fn test_upwards_search() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(PROJECT_FILE), "[a]\nfound=true\n").unwrap();

        let settings = empty_settings();
        assert!(settings.setup(&options_for(&nested)).unwrap_err().is_not_found());
        assert!(!settings.is_project_loaded());

        let options = SetupOptions {
            upwards: true,
            ..options_for(&nested)
        };
        settings.setup(&options).unwrap();
        assert_eq!(settings.resource_path(), canonical(dir.path()));
        assert_eq!(settings.get("a/found"), Value::Bool(true));
    }

    #[test]
    fn test_relative_start_dir_is_made_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let missing = "no-such-project-dir";
        assert_eq!(absolute_start_dir(missing).unwrap(), cwd.join(missing));
        assert_eq!(absolute_start_dir("").unwrap(), cwd);
        assert!(absolute_start_dir(".").unwrap().is_absolute());
    }

    #[test]
    fn test_broken_project_aborts_search() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("sub");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join(PROJECT_FILE), "[a]\nb=\n").unwrap();
        std::fs::write(dir.path().join(PROJECT_FILE), "[a]\nb=1\n").unwrap();

        let options = SetupOptions {
            upwards: true,
            ..options_for(&nested)
        };
        let err = empty_settings().setup(&options).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_override_cfg_applied_unless_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_FILE), "[a]\nb=1\n").unwrap();
        std::fs::write(dir.path().join(OVERRIDE_FILE), "[a]\nb=2\n").unwrap();

        let settings = empty_settings();
        settings.setup(&options_for(dir.path())).unwrap();
        assert_eq!(settings.get("a/b"), Value::Int(2));

        let settings = empty_settings();
        let options = SetupOptions {
            ignore_override: true,
            ..options_for(dir.path())
        };
        settings.setup(&options).unwrap();
        assert_eq!(settings.get("a/b"), Value::Int(1));
    }

    #[test]
    fn test_command_line_overrides_win() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_FILE), "[a]\nb=1\n").unwrap();

        let settings = empty_settings();
        let options = SetupOptions {
            overrides: vec![("a/b".to_string(), Value::Int(5))],
            ..options_for(dir.path())
        };
        settings.setup(&options).unwrap();
        assert_eq!(settings.get("a/b"), Value::Int(5));
    }

    #[test]
    fn test_project_settings_override_and_visible_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let extra = dir.path().join("extra.cfg");
        std::fs::write(&extra, "[a]\nextra=true\n").unwrap();
        std::fs::write(
            dir.path().join(PROJECT_FILE),
            format!(
                "[application]\nconfig/project_settings_override=\"{}\"\nconfig/use_hidden_project_data_directory=false\n",
                path_string(&extra)
            ),
        )
        .unwrap();

        let settings = empty_settings();
        settings.setup(&options_for(dir.path())).unwrap();
        assert_eq!(settings.get("a/extra"), Value::Bool(true));
        assert_eq!(settings.project_data_path(), "res://nebula");
    }

    #[test]
    fn test_main_pack() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("game.pck");
        let mut builder = PackBuilder::new();
        builder
            .add_file(PROJECT_FILE, b"[application]\nconfig/name=\"Packed\"\n")
            .unwrap();
        builder.write_to(&pack_path).unwrap();
        std::fs::write(dir.path().join(OVERRIDE_FILE), "[a]\nnext_to_pack=1\n").unwrap();

        let settings = empty_settings();
        let options = SetupOptions {
            main_pack: Some(path_string(&pack_path)),
            ..SetupOptions::default()
        };
        settings.setup(&options).unwrap();
        assert!(settings.fs().is_redirected());
        assert_eq!(settings.get("application/config/name"), Value::from("Packed"));
        assert_eq!(settings.get("a/next_to_pack"), Value::Int(1));
    }

    #[test]
    fn test_missing_main_pack_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let options = SetupOptions {
            main_pack: Some(path_string(&dir.path().join("missing.pck"))),
            ..SetupOptions::default()
        };
        let settings = empty_settings();
        assert!(matches!(
            settings.setup(&options),
            Err(SettingsError::CannotOpenPack(_))
        ));
        assert!(!settings.is_project_loaded());
    }

    #[test]
    fn test_pack_next_to_executable() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("game.exe");
        std::fs::write(&exe, b"not a pack").unwrap();
        let mut builder = PackBuilder::new();
        builder.add_file(PROJECT_FILE, b"[a]\nfrom=\"stem\"\n").unwrap();
        builder.write_to(&dir.path().join("game.pck")).unwrap();

        let platform = StaticPlatform {
            executable: Some(exe),
            ..StaticPlatform::default()
        };
        let settings = ProjectSettings::new(Arc::new(platform));
        settings.setup(&SetupOptions::default()).unwrap();
        assert_eq!(settings.get("a/from"), Value::from("stem"));
    }

    #[test]
    fn test_pack_embedded_in_executable() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("game");
        std::fs::write(&exe, b"\x7fELF pretend executable").unwrap();
        let mut builder = PackBuilder::new();
        builder.add_file(PROJECT_FILE, b"[a]\nfrom=\"embedded\"\n").unwrap();
        builder.append_to(&exe).unwrap();

        let platform = StaticPlatform {
            executable: Some(exe),
            ..StaticPlatform::default()
        };
        let settings = ProjectSettings::new(Arc::new(platform));
        settings.setup(&SetupOptions::default()).unwrap();
        assert_eq!(settings.get("a/from"), Value::from("embedded"));
    }

    #[test]
    fn test_host_resource_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_FILE), "[a]\nhost=true\n").unwrap();

        let platform = StaticPlatform {
            resource_dir: Some(format!("{}/", path_string(dir.path()))),
            ..StaticPlatform::default()
        };
        let settings = ProjectSettings::new(Arc::new(platform));
        settings.setup(&SetupOptions::default()).unwrap();
        assert_eq!(settings.resource_path(), path_string(dir.path()));
        assert_eq!(settings.get("a/host"), Value::Bool(true));
    }

    #[test]
    fn test_late_pack_mount_emits_cache_events() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_FILE), "[a]\nb=1\n").unwrap();
        let dlc = dir.path().join("dlc.pck");
        let mut builder = PackBuilder::new();
        builder.add_file("levels/extra.scn", b"scene").unwrap();
        builder.write_to(&dlc).unwrap();

        let before_load = empty_settings();
        let events = before_load.subscribe();
        assert!(before_load.load_resource_pack(&path_string(&dlc), false, 0));
        assert!(events.try_recv().is_err());

        let settings = empty_settings();
        settings.setup(&options_for(dir.path())).unwrap();
        let events = settings.subscribe();
        assert!(settings.load_resource_pack(&path_string(&dlc), false, 0));
        let received: Vec<_> = events.try_iter().collect();
        assert!(received.contains(&SettingsEvent::GlobalClassesChanged));
        assert!(received.contains(&SettingsEvent::UidCacheChanged));
    }
}
