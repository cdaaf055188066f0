//! Configuration for the `toolbox` command line
//!
//! Values are layered with figment, see [`ToolboxConfig::load`]. The library
//! functions never read configuration themselves; the CLI resolves it once
//! and passes plain values down.

mod core;

use crate::files::{DEFAULT_BUFFER_SIZE, DEFAULT_DIGITS, HashAlgorithm};
use crate::parallel::{DEFAULT_MAX_THREADS, ExecutionMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ToolboxConfig {
    pub logging: LoggingConfig,
    pub parallel: ParallelConfig,
    pub checksum: ChecksumConfig,
    pub size: SizeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for the log file, e.g. `info` or `debug`
    pub level: String,

    /// Directory for log files; no file logging when unset
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    pub mode: ExecutionMode,

    /// Worker cap in thread mode
    pub max_threads: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            max_threads: DEFAULT_MAX_THREADS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksumConfig {
    pub algorithm: HashAlgorithm,

    /// Read buffer in bytes
    pub buffer_size: usize,
}

impl Default for ChecksumConfig {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeConfig {
    /// Decimal places printed by `toolbox size`
    pub digits: u32,
}

impl Default for SizeConfig {
    fn default() -> Self {
        Self { digits: DEFAULT_DIGITS }
    }
}
