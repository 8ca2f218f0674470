//! Bundle and job selection.

use std::path::PathBuf;

use clap::{ArgAction, Args};
use strata_runtime::{DEFAULT_EVENT_LOG_DIR, PipelineOptions};

use crate::TRACING_TARGET_CONFIG;

/// Default location of the pipeline bundle.
const DEFAULT_BUNDLE_DIR: &str = "./STRATA-PIPELINE";

/// Selects the bundled job to run and the options the command line overrides.
#[derive(Debug, Clone, Args)]
pub struct JobConfig {
    /// Whether to record an event log for the job
    #[arg(
        long = "event-log-enabled",
        env = "STRATA_EVENT_LOG_ENABLED",
        action = ArgAction::Set,
        default_value_t = false
    )]
    pub event_log_enabled: bool,

    /// Job to run; required when the bundle declares no default job
    #[arg(long = "base-job-name", env = "STRATA_BASE_JOB_NAME")]
    pub base_job_name: Option<String>,

    /// Event log directory, as a path or file:// URI
    #[arg(
        long = "spark-history-dir",
        env = "STRATA_HISTORY_DIR",
        default_value = DEFAULT_EVENT_LOG_DIR
    )]
    pub spark_history_dir: String,

    /// Directory containing the pipeline bundle
    #[arg(
        long = "bundle-dir",
        env = "STRATA_BUNDLE_DIR",
        default_value = DEFAULT_BUNDLE_DIR
    )]
    pub bundle_dir: PathBuf,
}

impl JobConfig {
    /// Applies the command-line overrides to the bundled options.
    pub fn apply(&self, options: &mut PipelineOptions, job_name: &str) {
        options.job_name = job_name.to_owned();
        options.event_log_enabled = self.event_log_enabled;
        options.event_log_dir = self.spark_history_dir.clone();
    }

    /// Logs the job configuration.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            bundle_dir = %self.bundle_dir.display(),
            base_job_name = ?self.base_job_name,
            event_log_enabled = self.event_log_enabled,
            spark_history_dir = %self.spark_history_dir,
            "Job configuration"
        );
    }
}
