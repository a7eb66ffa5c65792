//! operatorcert — operator certification pipeline steps.
//!
//! Each subcommand is one pipeline step: create catalog image records,
//! publish bundles to index images, comment on pull requests and notify the
//! marketplace mirror.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
