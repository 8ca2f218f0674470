//! Local engine handle.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use derive_builder::Builder;

use super::{LocalStreamingContext, TRACING_TARGET};
use crate::engine::{Engine, EngineInfo, StreamingContext};
use crate::error::Result;

/// Configuration for the local engine.
#[derive(Debug, Clone, Builder)]
#[cfg_attr(feature = "config", derive(Args))]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct LocalEngineConfig {
    /// Reported master URL.
    #[builder(default = "String::from(\"local[*]\")")]
    #[cfg_attr(
        feature = "config",
        arg(long = "master", env = "STRATA_MASTER", default_value = "local[*]")
    )]
    pub master: String,

    /// Streaming contexts terminate by themselves after this many batches.
    #[builder(default, setter(strip_option))]
    #[cfg_attr(
        feature = "config",
        arg(
            long = "max-batches",
            env = "STRATA_MAX_BATCHES",
            value_parser = clap::value_parser!(u64).range(1..)
        )
    )]
    pub max_batches: Option<u64>,
}

impl LocalEngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.max_batches == Some(Some(0)) {
            return Err("max_batches must be at least 1".into());
        }
        Ok(())
    }
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        Self {
            master: String::from("local[*]"),
            max_batches: None,
        }
    }
}

/// In-process engine.
///
/// Keeps every streaming context it created so callers can inspect them.
#[derive(Debug, Default)]
pub struct LocalEngine {
    config: LocalEngineConfig,
    contexts: Mutex<Vec<Arc<LocalStreamingContext>>>,
}

impl LocalEngine {
    /// Creates a local engine.
    pub fn new(config: LocalEngineConfig) -> Self {
        tracing::debug!(
            target: TRACING_TARGET,
            master = %config.master,
            max_batches = ?config.max_batches,
            "Local engine initialized"
        );

        Self {
            config,
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &LocalEngineConfig {
        &self.config
    }

    /// Returns the streaming contexts created so far.
    pub fn streaming_contexts(&self) -> Vec<Arc<LocalStreamingContext>> {
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Engine for LocalEngine {
    fn info(&self) -> EngineInfo {
        EngineInfo {
            master: self.config.master.clone(),
            executor_id: String::from("driver"),
            user: std::env::var("USER").unwrap_or_else(|_| String::from("unknown")),
        }
    }

    fn create_streaming_context(
        &self,
        batch_interval: Duration,
    ) -> Result<Arc<dyn StreamingContext>> {
        let context = Arc::new(LocalStreamingContext::new(
            batch_interval,
            self.config.max_batches,
        ));
        self.contexts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&context));
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_applies_defaults() {
        let config = LocalEngineConfigBuilder::default()
            .max_batches(3u64)
            .build()
            .unwrap();

        assert_eq!(config.master, "local[*]");
        assert_eq!(config.max_batches, Some(3));
    }

    #[test]
    fn builder_rejects_zero_batches() {
        assert!(
            LocalEngineConfigBuilder::default()
                .max_batches(0u64)
                .build()
                .is_err()
        );
    }

    #[test]
    fn records_created_contexts() {
        let engine = LocalEngine::default();
        engine
            .create_streaming_context(Duration::from_millis(10))
            .unwrap();

        assert_eq!(engine.streaming_contexts().len(), 1);
        assert_eq!(engine.info().master, "local[*]");
    }
}
