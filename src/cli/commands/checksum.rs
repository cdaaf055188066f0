//! `toolbox checksum`
//!
//! Files are hashed through [`ParallelExecutor`], on worker processes by
//! default. The binary registers [`checksum_task`] in its worker registry so
//! process workers can run it.

use crate::cli::Output;
use crate::config::ToolboxConfig;
use crate::files::{HashAlgorithm, file_checksum};
use crate::parallel::{ExecutionMode, ParallelExecutor, Task};
use crate::timer;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Name the checksum task is registered under
pub const CHECKSUM_TASK: &str = "checksum";

/// Arguments of one checksum invocation: path, algorithm, buffer size
pub type ChecksumJob = (PathBuf, HashAlgorithm, usize);

pub fn checksum_task() -> Task<ChecksumJob, String> {
    Task::new(CHECKSUM_TASK, |(path, algorithm, buffer_size): ChecksumJob| {
        file_checksum(&path, algorithm, buffer_size)
    })
}

/// Command line flags merged over the configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ChecksumOptions {
    pub algorithm: HashAlgorithm,
    pub mode: ExecutionMode,
    pub max_threads: usize,
    pub buffer_size: usize,
}

impl ChecksumOptions {
    pub fn resolve(
        algorithm: Option<HashAlgorithm>,
        mode: Option<ExecutionMode>,
        threads: Option<usize>,
        config: &ToolboxConfig,
    ) -> Self {
        Self {
            algorithm: algorithm.unwrap_or(config.checksum.algorithm),
            mode: mode.unwrap_or(config.parallel.mode),
            max_threads: threads.unwrap_or(config.parallel.max_threads),
            buffer_size: config.checksum.buffer_size,
        }
    }
}

/// Hash `files` and return the digests in the same order
pub fn compute(files: &[PathBuf], options: &ChecksumOptions) -> Result<Vec<String>> {
    let mut executor = ParallelExecutor::new(checksum_task(), options.mode).max_threads(options.max_threads);
    for file in files {
        executor.submit((file.clone(), options.algorithm, options.buffer_size));
    }

    let label = format!("{} {} checksum(s) on {} pool", files.len(), options.algorithm, options.mode);
    let digests = timer::timed(&label, || executor.run())?;
    Ok(digests)
}

/// Print `<digest>  <path>` for every file, in argument order
pub async fn execute(files: Vec<PathBuf>, options: ChecksumOptions, output: &Output) -> Result<()> {
    output.verbose(&format!(
        "Hashing {} file(s) with {} on the {} pool",
        files.len(),
        options.algorithm,
        options.mode
    ));

    let (files, digests) = tokio::task::spawn_blocking(move || {
        let digests = compute(&files, &options);
        (files, digests)
    })
    .await
    .context("Checksum worker pool crashed")?;

    for (digest, file) in digests?.iter().zip(&files) {
        output.data(&format!("{digest}  {}", file.display()));
    }
    Ok(())
}
