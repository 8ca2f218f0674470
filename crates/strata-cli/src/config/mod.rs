//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── job: JobConfig              # Bundle location, job name, event log
//! └── engine: LocalEngineConfig   # Master URL, streaming batch limit
//! ```
//!
//! All configuration can be provided via CLI arguments or environment
//! variables. Use `--help` to see all available options.
//!
//! ```bash
//! strata --bundle-dir ./STRATA-PIPELINE --base-job-name wordcount
//!
//! # Or via environment variables
//! STRATA_BUNDLE_DIR=./STRATA-PIPELINE strata
//! ```

mod job;

use std::process;

use clap::Parser;
pub use job::JobConfig;
use strata_runtime::local::LocalEngineConfig;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "strata")]
#[command(about = "Runs a bundled Strata pipeline")]
#[command(version)]
pub struct Cli {
    /// Bundle and job selection.
    #[clap(flatten)]
    pub job: JobConfig,

    /// Local engine configuration.
    #[clap(flatten)]
    pub engine: LocalEngineConfig,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses
    /// CLI arguments.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Logs build information and configuration.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            "Starting strata"
        );

        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );

        self.job.log();
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            master = %self.engine.master,
            max_batches = ?self.engine.max_batches,
            "Engine configuration"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}
