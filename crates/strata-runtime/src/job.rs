//! Job identity.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::options::PipelineOptions;

/// Retrieval token used when no artifacts were staged for the job.
///
/// The token is only meaningful to legacy artifact services; the runner
/// never dereferences it.
pub const NO_ARTIFACTS_STAGED_TOKEN: &str = "__no_artifacts_staged__";

/// Returns a fresh invocation id of the form `<job_name>_<uuid>`.
pub fn invocation_id(job_name: &str) -> String {
    format!("{job_name}_{}", Uuid::new_v4())
}

/// Identity of a submitted job.
///
/// Assigned once at submission and immutable afterwards. The serialized
/// options are carried verbatim so that translators and event logs can
/// report exactly what the job was started with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    job_id: String,
    job_name: String,
    retrieval_token: String,
    pipeline_options: serde_json::Value,
}

impl JobInfo {
    /// Creates a job identity from its parts.
    pub fn new(
        job_id: impl Into<String>,
        job_name: impl Into<String>,
        retrieval_token: impl Into<String>,
        pipeline_options: serde_json::Value,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            job_name: job_name.into(),
            retrieval_token: retrieval_token.into(),
            pipeline_options,
        }
    }

    /// Creates a job identity with a fresh invocation id for the given options.
    pub fn for_options(job_name: &str, options: &PipelineOptions) -> Result<Self> {
        Ok(Self::new(
            invocation_id(job_name),
            job_name,
            NO_ARTIFACTS_STAGED_TOKEN,
            serde_json::to_value(options)?,
        ))
    }

    /// Returns the unique job id.
    #[inline]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Returns the user-facing job name.
    #[inline]
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Returns the artifact retrieval token.
    #[inline]
    pub fn retrieval_token(&self) -> &str {
        &self.retrieval_token
    }

    /// Returns the serialized pipeline options.
    #[inline]
    pub fn pipeline_options(&self) -> &serde_json::Value {
        &self.pipeline_options
    }
}
