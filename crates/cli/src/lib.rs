mod assemble;
mod languages;
mod scan;
mod view;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "smelter",
    version,
    about = "Classifies annotated source trees and materializes generated content",
    long_about = "Smelter walks a project tree, reads structured annotations from source \
                  comments, classifies every file and attaches routes. It then expands include \
                  directives, runs generator files and walks the tree a second time to pick up \
                  what they produced."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run discovery and materialization over a project tree
    #[command(
        long_about = "Runs both walks over PROJECT_PATH. Configuration is read from \
                            PROJECT_PATH/smelter.json unless --config is given."
    )]
    Assemble {
        /// Path to the project root directory
        #[arg(value_name = "PROJECT_PATH")]
        path: PathBuf,
        /// Report planned writes and generator runs without performing them
        #[arg(long)]
        dry_run: bool,
        /// Configuration file overriding PROJECT_PATH/smelter.json
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the annotation catalog of one file as JSON
    Scan {
        /// File to scan
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Language name, overriding detection
        #[arg(long)]
        language: Option<String>,
    },
    /// List registered languages
    Languages,
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let component = match &cli.command {
        Commands::Assemble { .. } => "assemble",
        _ => "cli",
    };
    let _guard = smelter_runtime::init_logging(component, false);

    let rt = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::Assemble {
            path,
            dry_run,
            config,
            json,
        } => rt.block_on(assemble::run(path, dry_run, config, json)),
        Commands::Scan { file, language } => rt.block_on(scan::run(file, language)),
        Commands::Languages => languages::run(),
    }
}
