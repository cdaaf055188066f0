//! Configuration command implementations

use crate::cli::{ConfigCommands, Output};
use crate::config::ToolboxConfig;
use crate::prune::remove_empty;
use anyhow::Result;

/// Execute config commands
pub async fn execute(cmd: ConfigCommands, config: &ToolboxConfig, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(config, output).await,
    }
}

async fn show(config: &ToolboxConfig, output: &Output) -> Result<()> {
    // Unset options such as `logging.dir` are left out
    let value = remove_empty(serde_json::to_value(config)?);
    output.data(&serde_json::to_string_pretty(&value)?);
    Ok(())
}
