//! geomodel CLI - place glTF models on a headless georeferenced scene.

mod commands;
mod error;

use std::process;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::place::PlaceArgs;

#[derive(Parser)]
#[command(name = "geomodel")]
#[command(version, about = "Place glTF models at geographic positions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a model, place one or more copies and report the result
    Place(PlaceArgs),

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Place(args) => commands::place::run(args),
        Commands::Config(command) => commands::config::run(command),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
