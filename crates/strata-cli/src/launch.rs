//! Loads the bundled job and runs it to completion.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use strata_runtime::bundle::PipelineBundle;
use strata_runtime::local::{LocalEngine, LocalTranslator};
use strata_runtime::{JobInfo, NO_ARTIFACTS_STAGED_TOKEN, PipelineResult, Runner, invocation_id};

use crate::TRACING_TARGET_LAUNCH;
use crate::config::Cli;
use crate::shutdown::{StopSignal, stop_signal};

/// Runs the job selected by `cli` and waits for it to finish.
///
/// Ctrl+C or SIGTERM requests a graceful stop; the job's outcome is still
/// awaited before returning.
pub async fn launch(cli: &Cli) -> anyhow::Result<()> {
    let bundle = PipelineBundle::open(&cli.job.bundle_dir).with_context(|| {
        format!(
            "failed to open pipeline bundle {}",
            cli.job.bundle_dir.display()
        )
    })?;
    let job_name = bundle.resolve_job_name(cli.job.base_job_name.as_deref())?;

    let graph = bundle
        .load_graph(&job_name)
        .with_context(|| format!("failed to load pipeline of job {job_name}"))?;
    let mut options = bundle
        .load_options(&job_name)
        .with_context(|| format!("failed to load options of job {job_name}"))?;
    cli.job.apply(&mut options, &job_name);

    let job_id = invocation_id(&job_name);
    options.app_name.get_or_insert_with(|| job_id.clone());
    let job = JobInfo::new(
        job_id,
        job_name,
        NO_ARTIFACTS_STAGED_TOKEN,
        serde_json::to_value(&options)?,
    );

    tracing::info!(
        target: TRACING_TARGET_LAUNCH,
        job_id = %job.job_id(),
        job_name = %job.job_name(),
        nodes = graph.node_count(),
        "Launching job"
    );

    let runner = Runner::new(
        options,
        Arc::new(LocalEngine::new(cli.engine.clone())),
        Arc::new(LocalTranslator::batch()),
        Arc::new(LocalTranslator::streaming()),
    );
    let result = runner
        .run(graph, job.clone())
        .with_context(|| format!("Job {} failed.", job.job_id()))?;

    wait_or_interrupt(&result, stop_signal()).await;
    let status = result
        .wait_until_finish()
        .await
        .with_context(|| format!("Job {} failed.", job.job_id()))?;

    tracing::info!(
        target: TRACING_TARGET_LAUNCH,
        job_id = %job.job_id(),
        status = %status,
        "Job finished successfully"
    );
    Ok(())
}

/// Returns once the job finished or `signal` requested its stop.
///
/// A stop request cancels the job and is returned; the caller still awaits
/// the job's outcome.
async fn wait_or_interrupt(
    result: &PipelineResult,
    signal: impl Future<Output = StopSignal>,
) -> Option<StopSignal> {
    tokio::select! {
        _ = result.wait_until_finish() => None,
        signal = signal => {
            tracing::info!(
                target: TRACING_TARGET_LAUNCH,
                job_id = %result.job().job_id(),
                %signal,
                "Stop requested, cancelling job"
            );
            result.cancel();
            Some(signal)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use clap::Parser;
    use strata_runtime::{DataflowGraph, PipelineOptions, TerminalStatus};
    use strata_runtime::bundle::{MANIFEST_FILE, PIPELINE_FILE};
    use strata_runtime::graph::{Collection, TransformNode, urns};

    use super::*;

    fn graph() -> DataflowGraph {
        let mut graph = DataflowGraph::new();
        graph
            .add_collection("create.out", Collection::bounded())
            .add_collection("format.out", Collection::bounded())
            .add_root(
                "create",
                TransformNode::new("Create", urns::PAR_DO).with_output("out", "create.out"),
            )
            .add_root(
                "format",
                TransformNode::new("Format", urns::PAR_DO)
                    .with_input("in", "create.out")
                    .with_output("out", "format.out"),
            );
        graph
    }

    fn write_bundle(root: &Path, default_job: Option<&str>) {
        if let Some(name) = default_job {
            let manifest = serde_json::json!({ "defaultJobName": name });
            fs::write(root.join(MANIFEST_FILE), manifest.to_string()).unwrap();
        }
        for name in ["wordcount", "clicks"] {
            let dir = root.join(name);
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join(PIPELINE_FILE), serde_json::to_vec(&graph()).unwrap()).unwrap();
        }
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(["strata"].iter().chain(args)).unwrap()
    }

    #[tokio::test]
    async fn runs_the_default_job() {
        let dir = tempfile::tempdir().unwrap();
        write_bundle(dir.path(), Some("wordcount"));
        let bundle_dir = dir.path().to_string_lossy().into_owned();

        launch(&cli(&["--bundle-dir", &bundle_dir])).await.unwrap();
    }

    #[tokio::test]
    async fn requires_a_job_name_without_default() {
        let dir = tempfile::tempdir().unwrap();
        write_bundle(dir.path(), None);
        let bundle_dir = dir.path().to_string_lossy().into_owned();

        let error = launch(&cli(&["--bundle-dir", &bundle_dir]))
            .await
            .unwrap_err();
        assert!(error.to_string().contains("--base-job-name"));

        launch(&cli(&["--bundle-dir", &bundle_dir, "--base-job-name", "clicks"]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_event_log_directory_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        write_bundle(dir.path(), Some("wordcount"));
        let bundle_dir = dir.path().to_string_lossy().into_owned();
        let history_dir = dir.path().join("missing").to_string_lossy().into_owned();

        let error = launch(&cli(&[
            "--bundle-dir",
            &bundle_dir,
            "--event-log-enabled",
            "true",
            "--spark-history-dir",
            &history_dir,
        ]))
        .await
        .unwrap_err();
        assert!(error.to_string().starts_with("Job wordcount_"));
    }

    fn submit(graph: DataflowGraph, dir: &Path) -> PipelineResult {
        let options = PipelineOptions {
            job_name: "clicks".to_owned(),
            batch_interval_ms: 10,
            checkpoint_dir: Some(dir.join("checkpoint").to_string_lossy().into_owned()),
            ..Default::default()
        };
        let job = JobInfo::for_options("clicks", &options).unwrap();
        Runner::new(
            options,
            Arc::new(LocalEngine::default()),
            Arc::new(LocalTranslator::batch()),
            Arc::new(LocalTranslator::streaming()),
        )
        .run(graph, job)
        .unwrap()
    }

    #[tokio::test]
    async fn stop_signal_cancels_a_streaming_job() {
        let mut graph = DataflowGraph::new();
        graph.add_collection("read.out", Collection::unbounded()).add_root(
            "read",
            TransformNode::new("ReadTopic", urns::READ).with_output("out", "read.out"),
        );
        let dir = tempfile::tempdir().unwrap();
        let result = submit(graph, dir.path());

        let signal = wait_or_interrupt(&result, async { StopSignal::Terminate }).await;
        assert_eq!(signal, Some(StopSignal::Terminate));
        assert_eq!(
            result.wait_until_finish().await.unwrap(),
            TerminalStatus::StoppedOnInterrupt
        );
    }

    #[tokio::test]
    async fn finished_jobs_ignore_pending_signals() {
        let dir = tempfile::tempdir().unwrap();
        let result = submit(graph(), dir.path());

        let signal = wait_or_interrupt(&result, std::future::pending()).await;
        assert_eq!(signal, None);
        assert_eq!(result.wait_until_finish().await.unwrap(), TerminalStatus::Done);
    }
}
