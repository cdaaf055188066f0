//! `toolbox find`

use crate::cli::Output;
use crate::config::ToolboxConfig;
use crate::files::{MatchMode, glob, rglob, strfsize};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub async fn execute(
    dir: &Path,
    patterns: &[String],
    regex: bool,
    recursive: bool,
    sizes: bool,
    config: &ToolboxConfig,
    output: &Output,
) -> Result<()> {
    let mode = if regex { MatchMode::Regex } else { MatchMode::Glob };
    output.verbose(&format!(
        "Searching {} ({}, {mode:?})",
        dir.display(),
        if recursive { "recursive" } else { "top level" }
    ));

    let files = if recursive {
        rglob(dir, patterns, mode)?
    } else {
        glob(dir, patterns, mode)?
    };

    if files.is_empty() {
        output.warning("No matching files");
        return Ok(());
    }

    for file in &files {
        if sizes {
            let len = fs::metadata(file)
                .with_context(|| format!("Failed to read metadata of {}", file.display()))?
                .len();
            output.data(&format!("{}\t{}", strfsize(len, config.size.digits), file.display()));
        } else {
            output.data(&file.display().to_string());
        }
    }

    output.count("🔍", "Matching files", files.len());
    Ok(())
}
