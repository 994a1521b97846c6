//! Configuration inspection commands.

use std::path::PathBuf;

use clap::Subcommand;
use geomodel::config::GeomodelConfig;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show {
        /// Read this file instead of the default location
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show { config } => run_show(config),
        ConfigCommands::Path => run_path(),
    }
}

fn run_show(path: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config(path.as_deref())?;
    let max_wait = match config.cache.max_wait {
        Some(wait) => format!("{} ms", wait.as_millis()),
        None => "unbounded".to_string(),
    };

    println!("[cache]");
    println!("  poll_interval_ms  = {}", config.cache.poll_interval.as_millis());
    println!("  max_wait          = {}", max_wait);
    println!("[animation]");
    println!("  frame_interval_ms = {}", config.frame_interval.as_millis());
    println!("[http]");
    println!("  timeout_secs      = {}", config.http.timeout.as_secs());
    println!("  user_agent        = {}", config.http.user_agent);
    Ok(())
}

fn run_path() -> Result<(), CliError> {
    match GeomodelConfig::default_path() {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => Err(CliError::Config(
            "No configuration directory on this platform".to_string(),
        )),
    }
}

/// Explicit path if given, otherwise the default location.
pub fn load_config(path: Option<&std::path::Path>) -> Result<GeomodelConfig, CliError> {
    let config = match path {
        Some(path) => GeomodelConfig::load_from(path)?,
        None => GeomodelConfig::load()?,
    };
    Ok(config)
}
