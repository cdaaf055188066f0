use anyhow::Result;
use clap::Parser;
use toolbox::cli::{Cli, worker_registry};
use toolbox::parallel;

fn main() -> Result<()> {
    // Process pool workers re-launch this binary; they never reach the CLI
    if parallel::serve_if_requested(&worker_registry())? {
        return Ok(());
    }
    run()
}

#[tokio::main]
async fn run() -> Result<()> {
    let cli = Cli::parse();
    cli.run().await
}
