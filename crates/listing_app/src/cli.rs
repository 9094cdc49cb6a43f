use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::logging::LogDestination;

/// Scrape property listings into CSV and JSON.
#[derive(Debug, Parser)]
#[command(name = "listing-harvester", version, about)]
pub struct Cli {
    /// RON configuration file; replaces the preset entirely.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Built-in configuration used when no file is given.
    #[arg(long, value_enum, default_value = "villa")]
    pub preset: Preset,

    /// Overrides the configured page count.
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Overrides the configured output directory.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Where log lines go.
    #[arg(long, value_enum, default_value = "both")]
    pub log: LogTarget,

    /// Log at debug level.
    #[arg(long, short)]
    pub verbose: bool,

    /// Print the effective configuration as RON and exit.
    #[arg(long)]
    pub print_config: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// House sales in Villa Los Jardines / Villa Los Presidentes.
    Villa,
    /// Apartment rentals across metropolitan Santiago.
    Rentals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    File,
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}
