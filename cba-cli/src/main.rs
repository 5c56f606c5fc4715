//! CBA CLI Entry Point
//!
//! `cba ingest` → `cba build` → `cba search` / `cba ask`.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cba_cli::Cli;

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_filter = if cli.verbose {
        "cba=debug,cba_cli=debug,cba_retrieval=debug"
    } else {
        "cba=info,cba_cli=info,cba_retrieval=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = cba_cli::run(cli) {
        tracing::debug!("Command failed: {:?}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
