//! Packaged pipelines.
//!
//! A bundle is a directory holding one or more pipelines keyed by job name:
//!
//! ```text
//! <bundle>/pipeline-manifest.json     {"defaultJobName": "wordcount"}
//! <bundle>/<job>/pipeline.json        the dataflow graph
//! <bundle>/<job>/pipeline-options.json
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::DataflowGraph;
use crate::options::PipelineOptions;

/// Manifest file name at the bundle root.
pub const MANIFEST_FILE: &str = "pipeline-manifest.json";

/// Graph file name inside a job directory.
pub const PIPELINE_FILE: &str = "pipeline.json";

/// Options file name inside a job directory.
pub const OPTIONS_FILE: &str = "pipeline-options.json";

/// Bundle-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    /// Job run when no job name is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_job_name: Option<String>,
}

/// A directory of packaged pipelines.
#[derive(Debug, Clone)]
pub struct PipelineBundle {
    root: PathBuf,
    manifest: BundleManifest,
}

impl PipelineBundle {
    /// Opens a bundle directory.
    ///
    /// A missing manifest is treated as an empty one.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::invalid_config(format!(
                "pipeline bundle {} is not a directory",
                root.display()
            )));
        }

        let manifest = match read_optional(&root.join(MANIFEST_FILE))? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => BundleManifest::default(),
        };

        Ok(Self { root, manifest })
    }

    /// Returns the bundle root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the bundle manifest.
    pub fn manifest(&self) -> &BundleManifest {
        &self.manifest
    }

    /// Returns the default job: the manifest's, or the only packaged job.
    pub fn default_job_name(&self) -> Option<String> {
        if let Some(name) = &self.manifest.default_job_name {
            return Some(name.clone());
        }

        let mut jobs = self.job_names().ok()?;
        match jobs.len() {
            1 => jobs.pop(),
            _ => None,
        }
    }

    /// Returns the names of all packaged jobs, sorted.
    pub fn job_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().join(PIPELINE_FILE).is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Picks the job to run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingJobName`] if no name is given and the bundle
    /// has no default job.
    pub fn resolve_job_name(&self, explicit: Option<&str>) -> Result<String> {
        let name = match explicit {
            Some(name) => name.to_owned(),
            None => self.default_job_name().ok_or(Error::MissingJobName)?,
        };
        validate_job_name(&name)?;
        Ok(name)
    }

    /// Loads the graph of a job.
    pub fn load_graph(&self, job_name: &str) -> Result<DataflowGraph> {
        validate_job_name(job_name)?;
        let path = self.root.join(job_name).join(PIPELINE_FILE);
        let bytes = read_optional(&path)?.ok_or_else(|| {
            Error::invalid_config(format!("job {job_name} not found in bundle"))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Loads the options of a job; a missing options file yields defaults.
    pub fn load_options(&self, job_name: &str) -> Result<PipelineOptions> {
        validate_job_name(job_name)?;
        let path = self.root.join(job_name).join(OPTIONS_FILE);
        match read_optional(&path)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(PipelineOptions::default()),
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn validate_job_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(Error::invalid_config(format!("invalid job name {name:?}")));
    }
    Ok(())
}
