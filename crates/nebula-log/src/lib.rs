//! Structured logging and tracing for Nebula Engine.
//!
//! Provides structured, span-based, filterable logging via the `tracing` ecosystem.
//! Supports console output with timestamps and module paths, plus JSON file logging
//! in debug builds for post-mortem analysis. The default level comes from the
//! `debug/settings/log_level` project setting, feature overrides included.
//! Records emitted through the `log` facade are forwarded to the subscriber.

use nebula_config::{LOG_LEVEL_KEY, ProjectSettings};
use std::path::Path;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

/// Filter used when no log level is configured.
pub const DEFAULT_FILTER: &str = "info";

/// Handle to the installed filter, used to apply the project's log level
/// once the project has been loaded.
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogHandle {
    /// Switches the filter to the level configured in `settings`.
    ///
    /// Does nothing when the filter came from `RUST_LOG`.
    pub fn apply_settings(&self, settings: &ProjectSettings) {
        if self.from_env {
            return;
        }
        let filter_str = filter_string(Some(settings));
        if let Err(e) = self.filter.reload(EnvFilter::new(&filter_str)) {
            tracing::warn!("Cannot change log filter to '{filter_str}': {e}");
        }
    }

    /// The active filter directives, if the subscriber is still alive.
    pub fn current_filter(&self) -> Option<String> {
        self.filter.with_current(|filter| filter.to_string()).ok()
    }
}

/// Initialize the tracing subscriber for the Nebula Engine.
///
/// Sets up structured logging with:
/// - Console output with timestamps, module paths, and severity levels
/// - JSON file logging in debug builds (optional)
/// - Environment-based filtering (respects RUST_LOG)
/// - The `debug/settings/log_level` project setting as the default filter
///
/// # Arguments
///
/// * `log_dir` - Optional directory for JSON log files (debug builds only)
/// * `debug_build` - Whether this is a debug build (enables file logging)
/// * `settings` - Optional project settings to read the log level from
///
/// Messages logged while the project is still being discovered use the
/// default level; call [`LogHandle::apply_settings`] after setup.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use nebula_log::init_logging;
/// use nebula_config::{ProjectSettings, StaticPlatform};
///
/// // Basic initialization
/// init_logging(None, false, None);
///
/// // With the level taken from project settings
/// let settings = ProjectSettings::new(Arc::new(StaticPlatform::default()));
/// settings.set("debug/settings/log_level", "debug");
/// init_logging(None, false, Some(&settings));
/// ```
pub fn init_logging(
    log_dir: Option<&Path>,
    debug_build: bool,
    settings: Option<&ProjectSettings>,
) -> LogHandle {
    // RUST_LOG wins over the configured level
    let (filter_layer, handle) = reloadable_filter(EnvFilter::try_from_default_env().ok(), settings);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer);

    // In debug builds, also log to a file for post-mortem analysis
    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join("nebula.log"))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return handle;
    }

    subscriber.init();
    handle
}

fn reloadable_filter(
    env_filter: Option<EnvFilter>,
    settings: Option<&ProjectSettings>,
) -> (reload::Layer<EnvFilter, Registry>, LogHandle) {
    let from_env = env_filter.is_some();
    let filter = env_filter.unwrap_or_else(|| EnvFilter::new(filter_string(settings)));
    let (layer, filter) = reload::Layer::new(filter);
    (layer, LogHandle { filter, from_env })
}

/// Returns the filter string configured in `settings`, or [`DEFAULT_FILTER`].
pub fn filter_string(settings: Option<&ProjectSettings>) -> String {
    settings
        .and_then(|s| s.try_get_with_override(LOG_LEVEL_KEY))
        .map(|level| level.to_text())
        .filter(|level| !level.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
