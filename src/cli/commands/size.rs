//! `toolbox size`

use crate::cli::Output;
use crate::config::ToolboxConfig;
use crate::files::strfsize;
use anyhow::Result;

pub async fn execute(bytes: &[u64], digits: Option<u32>, config: &ToolboxConfig, output: &Output) -> Result<()> {
    let digits = digits.unwrap_or(config.size.digits);
    for &size in bytes {
        output.data(&strfsize(size, digits));
    }
    Ok(())
}
