//! Subcommand implementations.

use std::path::Path;

use nebula_assets::{PackBuilder, PackError};
use nebula_config::{ProjectSettings, PropertyUsage, SettingsError};
use tracing::info;

/// Errors reported by the project tool.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Loading, querying or saving settings failed.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Building a pack failed.
    #[error(transparent)]
    Pack(#[from] PackError),

    /// Reading the pack source directory failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path being read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Prints `name = value [flags]` for every listed setting.
pub fn list(settings: &ProjectSettings, changed_only: bool) -> Result<(), CommandError> {
    let changed = settings.changed_settings();
    for info in settings.list() {
        if changed_only && !changed.contains(&info.name) {
            continue;
        }
        let value = settings.get(&info.name);
        println!("{} = {}{}", info.name, value, usage_suffix(info.usage));
    }
    Ok(())
}

fn usage_suffix(usage: PropertyUsage) -> String {
    let flags: Vec<&str> = [
        (PropertyUsage::INTERNAL, "internal"),
        (PropertyUsage::BASIC, "basic"),
        (PropertyUsage::RESTART_IF_CHANGED, "restart"),
    ]
    .into_iter()
    .filter(|(flag, _)| usage.contains(*flag))
    .map(|(_, label)| label)
    .collect();

    if flags.is_empty() {
        String::new()
    } else {
        format!("  [{}]", flags.join(", "))
    }
}

/// Prints one setting.
pub fn get(settings: &ProjectSettings, name: &str, exact: bool) -> Result<(), CommandError> {
    let value = if exact {
        settings.try_get(name)
    } else {
        settings.try_get_with_override(name)
    };
    match value {
        Some(value) => {
            println!("{value}");
            Ok(())
        }
        None => Err(SettingsError::NotFound(name.to_string()).into()),
    }
}

/// Packs every file under `source` and writes or appends the pack to `output`.
pub fn pack(source: &Path, output: &Path, embed: bool) -> Result<(), CommandError> {
    let mut builder = PackBuilder::new();
    add_dir(&mut builder, source, source)?;

    if embed {
        let start = builder.append_to(output)?;
        info!("Appended {} files to {} at offset {start}", builder.len(), output.display());
    } else {
        builder.write_to(output)?;
        info!("Wrote {} files to {}", builder.len(), output.display());
    }
    Ok(())
}

fn add_dir(builder: &mut PackBuilder, root: &Path, dir: &Path) -> Result<(), CommandError> {
    let io_error = |path: &Path| {
        let path = path.display().to_string();
        move |source: std::io::Error| CommandError::Io { path, source }
    };

    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(io_error(dir))?
        .collect::<Result<_, _>>()
        .map_err(io_error(dir))?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            add_dir(builder, root, &path)?;
            continue;
        }
        let data = std::fs::read(&path).map_err(io_error(&path))?;
        let relative = path.strip_prefix(root).unwrap_or(&path);
        builder.add_file(&relative.to_string_lossy().replace('\\', "/"), data)?;
    }
    Ok(())
}
