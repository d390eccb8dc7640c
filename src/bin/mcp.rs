//! qbank MCP server binary.
//!
//! Builds the HTTP job backend from settings and serves the tools over
//! stdin/stdout. Logs go to stderr.

use clap::Parser;
use miette::Diagnostic;
use qbank::config::{ConfigError, Settings, SettingsArgs};
use qbank::logging::init_tracing;
use qbank::mcp::{self, ServeError};
use thiserror::Error;
use tracing::info;

#[derive(Error, Diagnostic, Debug)]
enum BinaryError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Serve(#[from] ServeError),
}

#[derive(Parser)]
#[command(name = "qbank-mcp")]
#[command(author, version, about = "qbank MCP server (stdio)", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    init_tracing("qbank=info");
    run(Cli::parse()).await?;
    Ok(())
}

async fn run(cli: Cli) -> Result<(), BinaryError> {
    let settings = Settings::resolve(&cli.settings)?;
    info!(api_url = %settings.api_url, output_dir = %settings.output_dir.display(), "resolved settings");

    let server = mcp::build_server(&settings)?;
    mcp::serve_stdio(server).await?;
    Ok(())
}
