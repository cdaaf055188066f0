//! `toolbox prune`

use crate::cli::Output;
use crate::prune::remove_empty;
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Document formats understood by `toolbox prune`
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DataFormat {
    Json,
    Yaml,
    Toml,
}

impl DataFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    pub fn parse(self, content: &str) -> Result<Value> {
        let value = match self {
            Self::Json => serde_json::from_str(content)?,
            Self::Yaml => serde_yml::from_str(content)?,
            Self::Toml => toml::from_str(content)?,
        };
        Ok(value)
    }

    pub fn render(self, value: &Value) -> Result<String> {
        let rendered = match (self, value) {
            (Self::Json, _) => {
                let mut json = serde_json::to_string_pretty(value)?;
                json.push('\n');
                json
            }
            (Self::Yaml, _) => serde_yml::to_string(value)?,
            // A fully pruned document is an empty TOML file
            (Self::Toml, Value::Null) => String::new(),
            (Self::Toml, Value::Object(_)) => toml::to_string_pretty(value)?,
            (Self::Toml, _) => bail!("TOML output needs a table at the top level"),
        };
        Ok(rendered)
    }
}

/// Prune `file` and print the result, or write it to `target`
pub async fn execute(file: &Path, format: Option<DataFormat>, target: Option<&Path>, output: &Output) -> Result<()> {
    let format = match format.or_else(|| DataFormat::from_path(file)) {
        Some(format) => format,
        None => bail!("Cannot infer the format of {}, pass --format", file.display()),
    };

    let content = fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let document = format
        .parse(&content)
        .with_context(|| format!("Failed to parse {} as {format:?}", file.display()))?;

    let pruned = remove_empty(document);
    debug!(?format, "pruned {}", file.display());
    let rendered = format.render(&pruned)?;

    match target {
        Some(target) => {
            fs::write(target, rendered).with_context(|| format!("Failed to write {}", target.display()))?;
            output.success(&format!("Pruned document written to {}", target.display()));
        }
        None => print!("{rendered}"),
    }

    Ok(())
}
