//! Runner error types.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;

use crate::job::JobInfo;

/// Boxed error used as the source of translation and execution failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for runner operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while preparing, submitting, or running a job.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The submitted graph is malformed or cyclic.
    #[error("invalid graph: {0}")]
    InvalidGraph(Cow<'static, str>),

    /// No job name was given and the bundle does not declare a default.
    #[error("no default job name found, job name must be set using --base-job-name")]
    MissingJobName,

    /// Pipeline options are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(Cow<'static, str>),

    /// Event logging is enabled but the target directory cannot be used.
    #[error("event log directory {} does not exist or is not writable", .path.display())]
    EventLogUnavailable {
        /// Resolved event log directory.
        path: PathBuf,
    },

    /// The translator failed to map the graph onto the engine.
    #[error("translation failed: {message}")]
    Translation {
        message: Cow<'static, str>,
        #[source]
        source: Option<BoxError>,
    },

    /// Output computation or the streaming run failed.
    #[error("execution failed: {message}")]
    Execution {
        message: Cow<'static, str>,
        #[source]
        source: Option<BoxError>,
    },

    /// The underlying engine reported a failure.
    #[error("engine error: {0}")]
    Engine(Cow<'static, str>),

    /// A submitted job failed; carries the job identity and the original error.
    #[error("job {job_id} ({job_name}) failed: {source}")]
    JobFailed {
        job_id: String,
        job_name: String,
        #[source]
        source: Arc<Error>,
    },

    /// Filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(Cow<'static, str>),
}

impl Error {
    /// Creates an invalid graph error.
    pub fn invalid_graph(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidGraph(message.into())
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Creates a translation error with a message.
    pub fn translation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Translation {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a translation error with a message and source.
    pub fn translation_with_source(
        message: impl Into<Cow<'static, str>>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Translation {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an execution error with a message.
    pub fn execution(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Execution {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an execution error with a message and source.
    pub fn execution_with_source(
        message: impl Into<Cow<'static, str>>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Execution {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an engine error.
    pub fn engine(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Engine(message.into())
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal(message.into())
    }

    /// Wraps a worker failure with the identity of the job it belongs to.
    pub fn job_failed(job: &JobInfo, source: Arc<Error>) -> Self {
        Self::JobFailed {
            job_id: job.job_id().to_owned(),
            job_name: job.job_name().to_owned(),
            source,
        }
    }

    /// Returns a stable error code for this error type.
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidGraph(_) => "E001",
            Self::MissingJobName => "E002",
            Self::InvalidConfig(_) => "E003",
            Self::EventLogUnavailable { .. } => "E004",
            Self::Translation { .. } => "E005",
            Self::Execution { .. } => "E006",
            Self::Engine(_) => "E007",
            Self::JobFailed { .. } => "E008",
            Self::Io(_) => "E009",
            Self::Serialization(_) => "E010",
            Self::Internal(_) => "E011",
        }
    }

    /// Returns true for failures raised before any worker was submitted.
    pub fn is_submission_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidGraph(_)
                | Self::MissingJobName
                | Self::InvalidConfig(_)
                | Self::EventLogUnavailable { .. }
        )
    }

    /// Determines if resubmitting the same job might succeed.
    ///
    /// Engine and filesystem failures depend on the environment; graph and
    /// configuration errors need the input to change.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Engine(_) | Self::Io(_) => true,
            Self::JobFailed { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_unique() {
        let errors = [
            Error::invalid_graph("test"),
            Error::MissingJobName,
            Error::invalid_config("test"),
            Error::EventLogUnavailable {
                path: PathBuf::from("/missing"),
            },
            Error::translation("test"),
            Error::execution("test"),
            Error::engine("test"),
            Error::Io(std::io::Error::other("test")),
            Error::internal("test"),
        ];

        let codes: Vec<_> = errors.iter().map(Error::error_code).collect();
        for i in 0..codes.len() {
            for j in i + 1..codes.len() {
                assert_ne!(codes[i], codes[j], "error codes must be unique");
            }
        }
    }

    #[test]
    fn job_failure_keeps_identity_and_source() {
        let job = JobInfo::new("wordcount_1", "wordcount", "token", serde_json::Value::Null);
        let error = Error::job_failed(&job, Arc::new(Error::engine("executor lost")));

        let message = error.to_string();
        assert!(message.contains("wordcount_1"));
        assert!(message.contains("executor lost"));
        assert!(std::error::Error::source(&error).is_some());
        assert!(error.is_retryable());
    }

    #[test]
    fn submission_errors_are_classified() {
        assert!(Error::MissingJobName.is_submission_error());
        assert!(Error::invalid_graph("cycle").is_submission_error());
        assert!(!Error::execution("boom").is_submission_error());
        assert!(!Error::invalid_config("bad").is_retryable());
    }
}
