//! Tracing initialization.

use std::io::IsTerminal;

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Directives used when `RUST_LOG` is unset.
const DEFAULT_DIRECTIVES: &str = "warn,strata_cli=info,strata_runtime=info";

/// Installs a stderr subscriber filtered by `RUST_LOG`.
///
/// ```bash
/// RUST_LOG=strata_runtime::graph=trace,strata_cli=debug strata
/// ```
pub fn init_tracing() -> anyhow::Result<()> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let stderr = std::io::stderr();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(stderr.is_terminal()),
        )
        .with(env_filter(directives.as_deref())?)
        .try_init()
        .context("failed to install tracing subscriber")
}

/// Parses `directives`, falling back to [`DEFAULT_DIRECTIVES`] when absent
/// or blank.
fn env_filter(directives: Option<&str>) -> anyhow::Result<EnvFilter> {
    let directives = directives
        .map(str::trim)
        .filter(|directives| !directives.is_empty())
        .unwrap_or(DEFAULT_DIRECTIVES);
    EnvFilter::try_new(directives).with_context(|| {
        format!("invalid {} directives: {directives}", EnvFilter::DEFAULT_ENV)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_directives_use_defaults() {
        let defaults = env_filter(Some(DEFAULT_DIRECTIVES)).unwrap().to_string();
        for directives in [None, Some(""), Some("  ")] {
            assert_eq!(env_filter(directives).unwrap().to_string(), defaults);
        }
    }

    #[test]
    fn invalid_directives_are_reported() {
        let error = env_filter(Some("strata_runtime=loud")).unwrap_err();
        assert!(error.to_string().contains("RUST_LOG"));
        assert!(env_filter(Some("strata_runtime::graph=trace")).is_ok());
    }
}
