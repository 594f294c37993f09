use anyhow::Result;
use clap::Parser;
use zdot::cli::Cli;
use zdot::commands;

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing; logs go to stderr so stdout stays parseable
    let default_filter = if cli.verbose { "zdot=debug,warn" } else { "zdot=info,warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    commands::execute(cli)
}
