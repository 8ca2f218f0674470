#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod launch;
mod shutdown;
mod telemetry;

use std::process;

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "strata_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "strata_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "strata_cli::config";
pub const TRACING_TARGET_LAUNCH: &str = "strata_cli::launch";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = format!("{error:#}"),
            "Pipeline terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();

    telemetry::init_tracing()?;
    cli.log();

    launch::launch(&cli).await
}
