use clap::Parser;
use miette::Result;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Compact format on stderr, no timestamps, no targets; stdout is reserved for output
    let default_filter = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();

    cli.run().await
}
