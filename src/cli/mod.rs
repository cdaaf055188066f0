//! Command-line interface for the toolbox
//!
//! Every subcommand is a thin layer over the library: it resolves options
//! against the loaded [`ToolboxConfig`], calls into `prune`, `files` or
//! `parallel` and prints the result.

use crate::config::ToolboxConfig;
use crate::files::HashAlgorithm;
use crate::logging;
use crate::parallel::{ExecutionMode, TaskRegistry};
use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

mod commands;
mod output;

pub use commands::prune::DataFormat;
pub use output::Output;

/// Toolbox - pruning, parallel checksums and file helpers
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path, replaces user and project config files
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print results and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also write logs to a timestamped file in this directory
    #[arg(long, value_name = "DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Remove empty values from a JSON, YAML or TOML document
    Prune {
        /// Document to prune
        file: PathBuf,

        /// Input format, inferred from the file extension when omitted
        #[arg(long, value_enum)]
        format: Option<DataFormat>,

        /// Write the result here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Find files in a directory by glob or regex
    Find {
        /// Directory to search
        dir: PathBuf,

        /// Patterns, a file matching any of them is reported
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Treat patterns as regular expressions anchored at the start of the file name
        #[arg(long)]
        regex: bool,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Print the size of each file
        #[arg(long)]
        sizes: bool,
    },
    /// Format byte counts as human readable sizes
    Size {
        /// Byte counts
        #[arg(required = true)]
        bytes: Vec<u64>,

        /// Decimal places
        #[arg(long)]
        digits: Option<u32>,
    },
    /// Compute file checksums in parallel
    Checksum {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Hash algorithm
        #[arg(short, long, value_enum)]
        algorithm: Option<HashAlgorithm>,

        /// Run on worker processes or threads
        #[arg(long, value_enum)]
        mode: Option<ExecutionMode>,

        /// Maximum worker threads in thread mode
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration as JSON
    Show,
}

/// Tasks the binary can run when launched as a process pool worker
pub fn worker_registry() -> TaskRegistry {
    TaskRegistry::new().with_task(commands::checksum::checksum_task())
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let config = ToolboxConfig::load_with_custom_config(self.config.as_deref())?;

        let log_dir = self.log_dir.clone().or_else(|| config.logging.dir.clone());
        let logfile = logging::init(
            self.verbose,
            self.quiet,
            log_dir.as_deref(),
            logging::parse_level(&config.logging.level),
        )?;
        if let Some(logfile) = &logfile {
            debug!("Writing log file {}", logfile.display());
        }

        let output = Output::new(self.verbose > 0, self.quiet);

        match self.command {
            Some(Commands::Prune { file, format, output: target }) => {
                commands::prune::execute(&file, format, target.as_deref(), &output).await
            }
            Some(Commands::Find { dir, patterns, regex, recursive, sizes }) => {
                commands::find::execute(&dir, &patterns, regex, recursive, sizes, &config, &output).await
            }
            Some(Commands::Size { bytes, digits }) => commands::size::execute(&bytes, digits, &config, &output).await,
            Some(Commands::Checksum { files, algorithm, mode, threads }) => {
                let options = commands::checksum::ChecksumOptions::resolve(algorithm, mode, threads, &config);
                commands::checksum::execute(files, options, &output).await
            }
            Some(Commands::Config(cmd)) => commands::config::execute(cmd, &config, &output).await,
            None => {
                // Show help when no command is provided
                let mut cmd = Cli::command();
                cmd.print_help()?;
                Ok(())
            }
        }
    }
}
