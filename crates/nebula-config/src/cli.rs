//! Command-line arguments that control project discovery and overrides.

use clap::Args;

use crate::setup::SetupOptions;
use crate::value::Value;

/// Setting that holds the default log filter level.
pub const LOG_LEVEL_KEY: &str = "debug/settings/log_level";

/// Project settings command-line arguments.
///
/// Flatten into an application's parser with `#[command(flatten)]`.
/// Values given here override settings loaded from project files.
#[derive(Args, Debug, Clone, Default)]
pub struct CliArgs {
    /// Directory containing the project (or one of its subdirectories with `--upwards`).
    #[arg(long, env = "NEBULA_PROJECT_PATH")]
    pub path: Option<String>,

    /// Resource pack to load the project from.
    #[arg(long, env = "NEBULA_MAIN_PACK")]
    pub main_pack: Option<String>,

    /// Search parent directories for the project.
    #[arg(long)]
    pub upwards: bool,

    /// Ignore override.cfg and the project settings override file.
    #[arg(long)]
    pub no_override: bool,

    /// Override a setting: `--set name=value`. The value is RON; anything
    /// that does not parse is taken as a plain string.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_override)]
    pub set: Vec<(String, Value)>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "NEBULA_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Builds setup options from the arguments.
    pub fn setup_options(&self) -> SetupOptions {
        let mut overrides = self.set.clone();
        if let Some(ref level) = self.log_level {
            overrides.push((LOG_LEVEL_KEY.to_string(), Value::String(level.clone())));
        }
        SetupOptions {
            path: self.path.clone().unwrap_or_default(),
            main_pack: self.main_pack.clone(),
            upwards: self.upwards,
            ignore_override: self.no_override,
            overrides,
        }
    }
}

/// Parses a `name=value` override.
pub fn parse_override(s: &str) -> Result<(String, Value), String> {
    let (name, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid name=value pair: no '=' found in '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Invalid name=value pair: empty name in '{s}'"));
    }
    Ok((name.to_string(), parse_override_value(raw)))
}

/// Bare words other than `true`/`false` stay strings so that `--set a=debug`
/// does not parse as a RON identifier.
fn parse_override_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    let bare_word = trimmed.starts_with(|c: char| c.is_alphabetic() || c == '_')
        && !matches!(trimmed, "true" | "false");
    if bare_word {
        return Value::String(raw.to_string());
    }
    Value::from_ron(trimmed).unwrap_or_else(|_| Value::String(raw.to_string()))
}
