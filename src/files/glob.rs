//! Glob and regex file search
//!
//! This module finds files under a directory by name pattern, either only
//! directly inside it ([`glob`]) or at any depth ([`rglob`]).

use anyhow::{Context, Result, bail};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// How search patterns are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Shell-style globs such as `*.png` or `img/**/*.jpg`
    #[default]
    Glob,
    /// Regular expressions matched from the start of the file name.
    ///
    /// Only names with an extension (containing a `.`) are candidates, so
    /// `Makefile` is never reported in this mode.
    Regex,
}

/// Files directly inside `dir` whose name matches any of `patterns`
pub fn glob<P: AsRef<Path>, S: AsRef<str>>(dir: P, patterns: &[S], mode: MatchMode) -> Result<Vec<PathBuf>> {
    search(dir.as_ref(), patterns, mode, false)
}

/// Files anywhere below `dir` matching any of `patterns`.
///
/// Glob patterns are matched against the path relative to `dir`, with an
/// implicit `**/` in front, so `*.png` finds PNGs at any depth while
/// `img/*.png` only finds them in `img` directories. Regex patterns are
/// matched against the file name.
pub fn rglob<P: AsRef<Path>, S: AsRef<str>>(dir: P, patterns: &[S], mode: MatchMode) -> Result<Vec<PathBuf>> {
    search(dir.as_ref(), patterns, mode, true)
}

enum Matcher {
    Glob(GlobSet),
    Regex(RegexSet),
}

impl Matcher {
    fn build<S: AsRef<str>>(patterns: &[S], mode: MatchMode, recursive: bool) -> Result<Self> {
        match mode {
            MatchMode::Glob => {
                let mut builder = GlobSetBuilder::new();
                for pattern in patterns {
                    let pattern = pattern.as_ref();
                    let full = if recursive {
                        format!("**/{pattern}")
                    } else {
                        pattern.to_string()
                    };
                    let glob = GlobBuilder::new(&full)
                        .literal_separator(true)
                        .build()
                        .with_context(|| format!("Invalid glob pattern: {pattern}"))?;
                    builder.add(glob);
                }
                Ok(Matcher::Glob(builder.build()?))
            }
            MatchMode::Regex => {
                for pattern in patterns {
                    // Validate individually for a useful error message
                    Regex::new(pattern.as_ref())
                        .with_context(|| format!("Invalid regex pattern: {}", pattern.as_ref()))?;
                }
                let anchored = patterns.iter().map(|p| format!("^(?:{})", p.as_ref()));
                Ok(Matcher::Regex(RegexSet::new(anchored)?))
            }
        }
    }

    fn is_match(&self, relative: &Path) -> bool {
        match self {
            Matcher::Glob(set) => set.is_match(relative),
            Matcher::Regex(set) => relative
                .file_name()
                .map(|name| name.to_string_lossy())
                .is_some_and(|name| name.contains('.') && set.is_match(&name)),
        }
    }
}

fn search<S: AsRef<str>>(dir: &Path, patterns: &[S], mode: MatchMode, recursive: bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Not a directory: {}", dir.display());
    }

    let matcher = Matcher::build(patterns, mode, recursive)?;
    let max_depth = if recursive { usize::MAX } else { 1 };

    let mut matching_paths = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        if matcher.is_match(relative) {
            matching_paths.push(path.to_path_buf());
        }
    }

    debug!(
        dir = %dir.display(),
        recursive,
        matches = matching_paths.len(),
        "file search finished"
    );
    Ok(matching_paths)
}
