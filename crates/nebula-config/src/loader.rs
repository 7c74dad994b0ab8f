//! Reading settings files into the store and writing them back out.

use nebula_assets::FileSystem;

use crate::codec;
use crate::error::SettingsError;
use crate::migration::{CONFIG_VERSION, migrate};
use crate::store::{CUSTOM_FEATURES_KEY, ProjectSettings};
use crate::value::Value;

/// Text settings file at the project root.
pub const PROJECT_FILE: &str = "project.nebula";
/// Binary settings file at the project root, preferred over the text file.
pub const PROJECT_BINARY_FILE: &str = "project.binary";
/// Optional text file whose settings are applied over the project's.
pub const OVERRIDE_FILE: &str = "override.cfg";

const CONFIG_VERSION_KEY: &str = "config_version";
const BINARY_EXTENSION: &str = ".binary";

impl ProjectSettings {
    /// Loads a text settings file and applies it.
    ///
    /// `path` may be a `res://` path or an OS path.
    pub fn load_settings_text(&self, path: &str) -> Result<(), SettingsError> {
        let text = self.fs().read_to_string(path)?;
        let entries = codec::parse_text(path, &text)?;
        self.apply_loaded(path, entries)
    }

    /// Loads a binary settings file and applies it.
    pub fn load_settings_binary(&self, path: &str) -> Result<(), SettingsError> {
        let data = self.fs().read(path)?;
        let entries = codec::parse_binary(&data)?;
        self.apply_loaded(path, entries)
    }

    /// Loads the binary file if present, otherwise the text file.
    ///
    /// A binary file that exists but cannot be decoded is reported and the
    /// text file is tried instead; if there is no text file either, the
    /// binary file's error is returned.
    pub fn load_settings_text_or_binary(
        &self,
        text_path: &str,
        binary_path: &str,
    ) -> Result<(), SettingsError> {
        let binary_error = match self.load_settings_binary(binary_path) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                log::error!("Couldn't load file '{binary_path}', attempting to load as text: {e}");
                Some(e)
            }
        };

        match self.load_settings_text(text_path) {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Err(binary_error.unwrap_or(e)),
            Err(e) => {
                log::error!("Couldn't load file '{text_path}': {e}");
                Err(e)
            }
        }
    }

    /// Loads `res://project.binary` or `res://project.nebula`.
    pub(crate) fn load_project_files(&self) -> Result<(), SettingsError> {
        self.load_settings_text_or_binary(
            &format!("res://{PROJECT_FILE}"),
            &format!("res://{PROJECT_BINARY_FILE}"),
        )
    }

    /// Applies an optional text override file. Returns `true` if it was applied.
    ///
    /// A missing file is skipped silently; a broken one is logged and skipped.
    pub fn apply_override_file(&self, path: &str) -> bool {
        match self.load_settings_text(path) {
            Ok(()) => {
                log::info!("Applied settings override file {path}");
                true
            }
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                log::error!("Ignoring settings override file '{path}': {e}");
                false
            }
        }
    }

    /// Applies `name=value` overrides, typically from the command line.
    pub fn apply_overrides(&self, overrides: &[(String, Value)]) {
        for (name, value) in overrides {
            log::debug!("Override {name}={value}");
            self.set(name, value.clone());
        }
    }

    fn apply_loaded(&self, path: &str, mut entries: Vec<(String, Value)>) -> Result<(), SettingsError> {
        let mut version = 0;
        entries.retain(|(name, value)| {
            if name == CONFIG_VERSION_KEY {
                version = value.as_int().unwrap_or(0);
                false
            } else {
                true
            }
        });

        migrate(version, &mut entries)?;

        let count = entries.len();
        for (name, value) in entries {
            self.set(&name, value);
        }
        log::debug!("Loaded {count} settings from {path}");
        Ok(())
    }

    /// Saves the settings that differ from their defaults.
    ///
    /// Paths ending in `.binary` are written in the binary format, anything
    /// else as text. `path` may be a `res://` path or an OS path.
    pub fn save(&self, path: &str) -> Result<(), SettingsError> {
        self.save_custom(path, &[])
    }

    /// Like [`Self::save`], with `extra` entries added or replacing stored ones.
    pub fn save_custom(&self, path: &str, extra: &[(String, Value)]) -> Result<(), SettingsError> {
        let mut entries = Vec::new();
        let features = self.custom_features();
        if !features.is_empty() {
            entries.push((CUSTOM_FEATURES_KEY.to_string(), Value::String(features.join(","))));
        }
        entries.extend(self.persisted_entries());

        for (name, value) in extra {
            match entries.iter_mut().find(|(n, _)| n == name) {
                Some(entry) => entry.1 = value.clone(),
                None => entries.push((name.clone(), value.clone())),
            }
        }

        let data = if path.ends_with(BINARY_EXTENSION) {
            codec::write_binary(CONFIG_VERSION, &entries)
        } else {
            codec::write_text(CONFIG_VERSION, &entries)?.into_bytes()
        };

        let target = self.globalize_path(path);
        std::fs::write(&target, data).map_err(SettingsError::Write)?;
        log::info!("Saved {} settings to {target}", entries.len());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::platform::StaticPlatform;

    fn store_at(dir: &std::path::Path) -> ProjectSettings {
        let settings = ProjectSettings::new(Arc::new(StaticPlatform::default()));
        settings.set_resource_path(&dir.to_string_lossy());
        settings
    }

    #[test]
    fn test_load_text_applies_settings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_FILE),
            "config_version=5\n[application]\nconfig/name=\"Demo\"\n",
        )
        .unwrap();

        let settings = store_at(dir.path());
        settings.load_project_files().unwrap();
        assert_eq!(settings.get("application/config/name"), Value::from("Demo"));
        assert!(!settings.has_setting("config_version"));
    }

    #[test]
    fn test_binary_preferred_over_text() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_FILE), "[a]\nsource=\"text\"\n").unwrap();
        let binary = codec::write_binary(5, &[("a/source".to_string(), Value::from("binary"))]);
        std::fs::write(dir.path().join(PROJECT_BINARY_FILE), binary).unwrap();

        let settings = store_at(dir.path());
        settings.load_project_files().unwrap();
        assert_eq!(settings.get("a/source"), Value::from("binary"));
    }

    #[test]
    fn test_corrupt_binary_falls_back_to_text() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_FILE), "[a]\nsource=\"text\"\n").unwrap();
        std::fs::write(dir.path().join(PROJECT_BINARY_FILE), b"NSET\xff").unwrap();

        let settings = store_at(dir.path());
        settings.load_project_files().unwrap();
        assert_eq!(settings.get("a/source"), Value::from("text"));
    }

    #[test]
    fn test_corrupt_binary_alone_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_BINARY_FILE), b"garbage").unwrap();

        let settings = store_at(dir.path());
        let err = settings.load_project_files().unwrap_err();
        assert!(matches!(err, SettingsError::InvalidBinary(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_missing_files_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let settings = store_at(dir.path());
        assert!(settings.load_project_files().unwrap_err().is_not_found());
    }

    #[test]
    fn test_legacy_file_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(PROJECT_FILE),
            "config_version=3\n[input]\nui_accept=[\"A\", \"B\"]\n",
        )
        .unwrap();

        let settings = store_at(dir.path());
        settings.load_project_files().unwrap();
        let action = settings.get("input/ui_accept");
        assert_eq!(action.as_map().unwrap()["deadzone"], Value::Float(0.5));
    }

    #[test]
    fn test_newer_version_applies_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PROJECT_FILE), "config_version=99\n[a]\nb=1\n").unwrap();

        let settings = store_at(dir.path());
        let err = settings.load_project_files().unwrap_err();
        assert!(matches!(err, SettingsError::NewerVersion { found: 99, .. }));
        assert!(!settings.has_setting("a/b"));
    }

    #[test]
    fn test_override_file_optional() {
        let dir = tempfile::tempdir().unwrap();
        let settings = store_at(dir.path());
        settings.set("a/b", 1);

        let path = dir.path().join(OVERRIDE_FILE);
        assert!(!settings.apply_override_file(&path.to_string_lossy()));

        std::fs::write(&path, "[a]\nb=2\n").unwrap();
        assert!(settings.apply_override_file(&path.to_string_lossy()));
        assert_eq!(settings.get("a/b"), Value::Int(2));

        std::fs::write(&path, "[a]\nb=\n").unwrap();
        assert!(!settings.apply_override_file(&path.to_string_lossy()));
        assert_eq!(settings.get("a/b"), Value::Int(2));
    }

    #[test]
    fn test_save_trims_defaults_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let settings = store_at(dir.path());
        settings.define("display/width", 1280);
        settings.define("display/height", 720);
        settings.set("display/height", 1080);
        settings.set("application/config/name", "Demo");
        settings.set(CUSTOM_FEATURES_KEY, "demo");

        settings.save(&format!("res://{PROJECT_FILE}")).unwrap();
        let text = std::fs::read_to_string(dir.path().join(PROJECT_FILE)).unwrap();
        assert!(text.contains("config_version=5"));
        assert!(text.contains("height=1080"));
        assert!(!text.contains("width"));

        let reloaded = store_at(dir.path());
        reloaded.load_project_files().unwrap();
        assert_eq!(reloaded.get("display/height"), Value::Int(1080));
        assert_eq!(reloaded.get("application/config/name"), Value::from("Demo"));
        assert!(reloaded.has_feature("demo"));
    }

    #[test]
    fn test_bracket_in_section_name_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let settings = store_at(dir.path());
        settings.set("we]ird/key", 7);
        settings.set("plain/key", 1);
        settings.save(&format!("res://{PROJECT_FILE}")).unwrap();

        let reloaded = store_at(dir.path());
        reloaded.load_project_files().unwrap();
        assert_eq!(reloaded.get("we]ird/key"), Value::Int(7));
        assert_eq!(reloaded.get("plain/key"), Value::Int(1));
        assert!(!reloaded.has_setting("we/key"));
    }

    #[test]
    fn test_save_binary_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let settings = store_at(dir.path());
        settings.set("a/b", true);
        settings
            .save_custom(
                &format!("res://{PROJECT_BINARY_FILE}"),
                &[("a/extra".to_string(), Value::Int(1))],
            )
            .unwrap();

        let data = std::fs::read(dir.path().join(PROJECT_BINARY_FILE)).unwrap();
        assert!(codec::is_binary(&data));

        let reloaded = store_at(dir.path());
        reloaded.load_project_files().unwrap();
        assert_eq!(reloaded.get("a/b"), Value::Bool(true));
        assert_eq!(reloaded.get("a/extra"), Value::Int(1));
    }

    #[test]
    fn test_hidden_settings_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let settings = store_at(dir.path());
        settings.set("a/secret", 1);
        settings.set_hidden_from_editor("a/secret", true).unwrap();
        settings.save(&format!("res://{PROJECT_FILE}")).unwrap();

        let text = std::fs::read_to_string(dir.path().join(PROJECT_FILE)).unwrap();
        assert!(!text.contains("secret"));
    }
}
