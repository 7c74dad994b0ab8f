//! Command-line tool for Nebula Engine projects.
//!
//! Finds a project the same way the engine does at startup and lets you
//! inspect its settings, convert paths and build resource packs.
//!
//! Run with: `cargo run -p nebula-project -- --path <project> list`

mod commands;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use nebula_config::{CliArgs, NativePlatform, ProjectSettings};
use tracing::{error, info};

/// CLI arguments for the project tool.
#[derive(Parser, Debug)]
#[command(name = "nebula-project", about = "Inspect Nebula Engine project settings")]
struct ProjectArgs {
    #[command(flatten)]
    settings: CliArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List settings with their values and usage flags.
    List {
        /// Only settings that differ from their defaults.
        #[arg(long)]
        changed: bool,
    },
    /// Print a setting, resolving feature overrides.
    Get {
        /// Setting name, e.g. `application/config/name`.
        name: String,
        /// Skip feature override resolution.
        #[arg(long)]
        exact: bool,
    },
    /// Convert an OS path into a `res://` path.
    Localize {
        /// Path to convert.
        path: String,
    },
    /// Convert a `res://` or `user://` path into an OS path.
    Globalize {
        /// Path to convert.
        path: String,
    },
    /// Write the loaded settings (defaults trimmed) to a file.
    Save {
        /// Target path; `.binary` selects the binary format.
        #[arg(default_value = "res://project.nebula")]
        path: String,
    },
    /// Build a resource pack from a directory.
    Pack {
        /// Directory whose files are packed.
        source: std::path::PathBuf,
        /// Pack file to write, or executable to append to with `--embed`.
        output: std::path::PathBuf,
        /// Append the pack to an existing file instead of creating one.
        #[arg(long)]
        embed: bool,
    },
}

fn main() -> ExitCode {
    let args = ProjectArgs::parse();

    let logging = nebula_log::init_logging(None, cfg!(debug_assertions), None);

    if let Command::Pack { source, output, embed } = &args.command {
        return report(commands::pack(source, output, *embed));
    }

    let settings = ProjectSettings::new(Arc::new(NativePlatform::new("nebula-project")));
    if let Err(e) = settings.setup(&args.settings.setup_options()) {
        error!("Failed to load project: {e}");
        return ExitCode::FAILURE;
    }
    logging.apply_settings(&settings);
    info!("Project root: {}", settings.resource_path());

    let result = match args.command {
        Command::List { changed } => commands::list(&settings, changed),
        Command::Get { name, exact } => commands::get(&settings, &name, exact),
        Command::Localize { path } => {
            println!("{}", settings.localize_path(&path));
            Ok(())
        }
        Command::Globalize { path } => {
            println!("{}", settings.globalize_path(&path));
            Ok(())
        }
        Command::Save { path } => settings.save(&path).map_err(Into::into),
        Command::Pack { .. } => Ok(()),
    };
    report(result)
}

fn report(result: Result<(), commands::CommandError>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
