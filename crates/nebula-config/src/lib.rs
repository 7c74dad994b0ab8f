//! Project settings for Nebula Engine.
//!
//! [`ProjectSettings`] is the engine-wide key/value store behind
//! `project.nebula`: ordered settings with editor metadata, feature-tagged
//! overrides (`name.windows`, `name.mobile`), `res://` and `user://` path
//! mapping, text and binary settings files with version migration, and
//! project discovery across packs and directories at startup.
//!
//! ```no_run
//! use std::sync::Arc;
//! use nebula_config::{NativePlatform, ProjectSettings, SetupOptions};
//!
//! let settings = ProjectSettings::new(Arc::new(NativePlatform::new("demo")));
//! settings.setup(&SetupOptions { upwards: true, ..SetupOptions::default() })?;
//! let name = settings.get_with_override("application/config/name");
//! # Ok::<(), nebula_config::SettingsError>(())
//! ```

mod cli;
mod codec;
mod error;
mod events;
mod key;
mod loader;
mod migration;
mod paths;
mod platform;
mod property;
mod setup;
mod store;
mod value;

pub use cli::{CliArgs, LOG_LEVEL_KEY, parse_override};
pub use codec::BINARY_MAGIC;
pub use error::SettingsError;
pub use events::SettingsEvent;
pub use key::SettingKey;
pub use loader::{OVERRIDE_FILE, PROJECT_BINARY_FILE, PROJECT_FILE};
pub use migration::{ALL_DEVICES, CONFIG_VERSION, migrate};
pub use paths::{PathResolver, RES_SCHEME, USER_SCHEME, has_scheme, is_absolute_path, simplify_path};
pub use platform::{NativePlatform, Platform, StaticPlatform};
pub use property::{PropertyHint, PropertyInfo, PropertyUsage};
pub use setup::{HIDDEN_DATA_DIR_KEY, PACK_EXTENSION, PROJECT_SETTINGS_OVERRIDE_KEY, SetupOptions};
pub use store::{AutoloadInfo, CUSTOM_FEATURES_KEY, ProjectSettings};
pub use value::{Value, ValueType};
