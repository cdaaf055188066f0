//! Logging setup on top of `tracing-subscriber`
//!
//! Two layer factories, one for the terminal and one for a timestamped log
//! file, plus [`init`] which wires both into the global subscriber the way
//! the CLI wants them.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::{Filter, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Timestamp format shared by both layers
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// File name pattern of log files created by [`file_layer`]
pub const LOGFILE_NAME_FORMAT: &str = "%Y-%m-%d %H-%M-%S.log";

/// Colored, human readable layer writing to stderr.
///
/// `filter` is usually a [`LevelFilter`] or an [`EnvFilter`].
pub fn terminal_layer<S, F>(filter: F) -> impl Layer<S> + Send + Sync + 'static
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    F: Filter<S> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(false)
        .with_filter(filter)
}

/// Plain-text layer appending to a new file in `dir`.
///
/// `dir` is created if needed and the file is named after the current local
/// time. Returns the layer together with the path of the file.
pub fn file_layer<S>(level: LevelFilter, dir: &Path) -> Result<(impl Layer<S> + Send + Sync + 'static, PathBuf)>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let logfile = dir.join(chrono::Local::now().format(LOGFILE_NAME_FORMAT).to_string());
    let file = File::options()
        .create(true)
        .append(true)
        .open(&logfile)
        .with_context(|| format!("Failed to open log file: {}", logfile.display()))?;

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_filter(level);

    Ok((layer, logfile))
}

/// Terminal filter for a `-v` count, unless `RUST_LOG` says otherwise
pub fn verbosity_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info,globset=warn,walkdir=warn"),
        2 => EnvFilter::new("debug,globset=warn,walkdir=warn"),
        _ => EnvFilter::new("trace"),
    })
}

/// Map a config level name to a filter, defaulting to INFO for unknown names
pub fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::INFO)
}

/// Install the global subscriber.
///
/// The terminal gets `verbose`-driven output unless `quiet` is set. With a
/// `log_dir`, everything at `file_level` and above also goes to a new log
/// file there, whose path is returned. Calling this again after a subscriber
/// is installed does nothing.
pub fn init(verbose: u8, quiet: bool, log_dir: Option<&Path>, file_level: LevelFilter) -> Result<Option<PathBuf>> {
    let terminal = (!quiet).then(|| terminal_layer(verbosity_filter(verbose)));

    let (file, logfile) = match log_dir {
        Some(dir) => {
            let (layer, path) = file_layer(file_level, dir)?;
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    // Err only means a subscriber was already set
    let _ = tracing_subscriber::registry().with(terminal).with(file).try_init();

    Ok(logfile)
}
