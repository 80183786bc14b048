//! `rp66` binary entry point
//!
//! Parses arguments, installs the log subscriber and runs the command. Logs
//! go to stderr so reports on stdout stay machine readable.

use anyhow::Result;
use clap::Parser;
use rp66_cli::{Cli, run};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let stdout = std::io::stdout();
    run(&cli, &mut stdout.lock())
}
