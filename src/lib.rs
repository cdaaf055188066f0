//! # Toolbox - small utilities that keep showing up in scripts
//!
//! ## Features
//!
//! - **Pruning**: drop `null`, `""`, `[]` and `{}` from nested data ([`prune`])
//! - **Parallel execution**: one function over many argument tuples on a
//!   process pool or a thread pool, results in submission order ([`parallel`])
//! - **File helpers**: glob/regex search, human readable sizes, streaming
//!   checksums ([`files`])
//! - **Logging**: terminal and timestamped file layers for `tracing`
//!   ([`logging`]) and a closure timer ([`timer`])
//!
//! ## Quick Start
//!
//! ```bash
//! toolbox prune settings.json
//! toolbox checksum --algorithm blake3 *.iso
//! toolbox find ./assets '*.png' --recursive --sizes
//! ```

pub mod cli;
pub mod config;
pub mod files;
pub mod logging;
pub mod parallel;
pub mod prune;
pub mod timer;

pub use cli::{Cli, Output};
pub use config::ToolboxConfig;
