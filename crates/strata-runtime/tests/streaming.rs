mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use strata_runtime::local::ELEMENTS_METRIC;
use strata_runtime::metrics::{MetricKey, MetricsAccumulator, MetricsCheckpoint, MetricsSnapshot};
use strata_runtime::side_channel::{CheckpointingListener, WatermarkAdvancingListener};
use strata_runtime::{ExecutionMode, JobInfo, JobState, PipelineOptions, TerminalStatus};

use self::common::{
    CountingListener, bounded_chain, bounded_engine, endless_engine, options_in, runner,
    unbounded_source,
};

#[tokio::test]
async fn streaming_job_stops_on_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let options = PipelineOptions {
        streaming_timeout_ms: Some(500),
        ..options_in(dir.path())
    };
    let job = JobInfo::for_options("clicks", &options).unwrap();
    let engine = endless_engine();

    let started = Instant::now();
    let result = runner(options, Arc::clone(&engine))
        .run(unbounded_source(), job)
        .unwrap();
    assert_eq!(result.mode(), ExecutionMode::Streaming);

    let status = result.wait_until_finish().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(status, TerminalStatus::StoppedOnTimeout);
    assert!(elapsed >= Duration::from_millis(500));
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
    assert_eq!(result.state(), JobState::Finished);

    let contexts = engine.streaming_contexts();
    assert_eq!(contexts.len(), 1);
    assert_eq!(contexts[0].stop_count(), 1);
    assert!(contexts[0].is_terminated());
}

#[tokio::test]
async fn streaming_job_finishes_when_the_stream_terminates() {
    let dir = tempfile::tempdir().unwrap();
    let options = options_in(dir.path());
    let job = JobInfo::for_options("clicks", &options).unwrap();
    let engine = bounded_engine(3);

    let result = runner(options, Arc::clone(&engine))
        .run(unbounded_source(), job)
        .unwrap();

    assert_eq!(result.wait_until_finish().await.unwrap(), TerminalStatus::Done);

    let contexts = engine.streaming_contexts();
    assert_eq!(contexts[0].completed_batches(), 3);
    assert_eq!(contexts[0].stop_count(), 1);

    // Every batch reports one element for the source and one for the map stage.
    assert_eq!(result.metrics().counter_total(ELEMENTS_METRIC), 6);
}

#[tokio::test]
async fn cancel_stops_a_streaming_job() {
    let dir = tempfile::tempdir().unwrap();
    let options = options_in(dir.path());
    let job = JobInfo::for_options("clicks", &options).unwrap();
    let engine = endless_engine();

    let result = runner(options, Arc::clone(&engine))
        .run(unbounded_source(), job)
        .unwrap();

    assert!(
        result
            .wait_until_finish_timeout(Duration::from_millis(100))
            .await
            .is_none()
    );
    result.cancel();

    let status = result.wait_until_finish().await.unwrap();
    assert_eq!(status, TerminalStatus::StoppedOnInterrupt);
    assert_eq!(engine.streaming_contexts()[0].stop_count(), 1);
}

#[tokio::test]
async fn metrics_are_readable_while_the_job_runs() {
    let dir = tempfile::tempdir().unwrap();
    let options = options_in(dir.path());
    let job = JobInfo::for_options("clicks", &options).unwrap();

    let result = runner(options, endless_engine())
        .run(unbounded_source(), job)
        .unwrap();

    let mut previous = 0;
    let deadline = Instant::now() + Duration::from_secs(3);
    while previous < 4 {
        assert!(Instant::now() < deadline, "metrics stalled at {previous}");
        let started = Instant::now();
        let total = result.metrics().counter_total(ELEMENTS_METRIC);
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(total >= previous);
        previous = total;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(result.state(), JobState::Executing);

    result.cancel();
    assert_eq!(
        result.wait_until_finish().await.unwrap(),
        TerminalStatus::StoppedOnInterrupt
    );
    assert!(result.metrics().counter_total(ELEMENTS_METRIC) >= previous);
}

#[tokio::test]
async fn forced_streaming_runs_bounded_graphs_as_streams() {
    let dir = tempfile::tempdir().unwrap();
    let options = PipelineOptions {
        streaming: true,
        ..options_in(dir.path())
    };
    let job = JobInfo::for_options("chain", &options).unwrap();

    let result = runner(options, bounded_engine(1))
        .run(bounded_chain(), job)
        .unwrap();

    assert_eq!(result.mode(), ExecutionMode::Streaming);
    assert!(result.streaming_context().is_some());
    assert_eq!(result.wait_until_finish().await.unwrap(), TerminalStatus::Done);
}

#[tokio::test]
async fn listeners_are_registered_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let options = options_in(dir.path());
    let job = JobInfo::for_options("clicks", &options).unwrap();
    let engine = bounded_engine(2);
    let counting = Arc::new(CountingListener::default());

    let result = runner(options, Arc::clone(&engine))
        .with_listener(counting.clone())
        .run(unbounded_source(), job)
        .unwrap();
    result.wait_until_finish().await.unwrap();

    assert_eq!(
        engine.streaming_contexts()[0].listener_names(),
        [
            CheckpointingListener::NAME,
            "counting",
            WatermarkAdvancingListener::NAME,
        ]
    );
    assert_eq!(counting.batches(), 2);
}

#[tokio::test]
async fn watermarks_advance_after_batches() {
    let dir = tempfile::tempdir().unwrap();
    let options = options_in(dir.path());
    let job = JobInfo::for_options("clicks", &options).unwrap();

    let result = runner(options, bounded_engine(2))
        .run(unbounded_source(), job)
        .unwrap();
    result.wait_until_finish().await.unwrap();

    let watermarks = result.watermarks().snapshot();
    assert!(!watermarks.is_empty());
    for marks in watermarks.values() {
        assert!(marks.low <= marks.high);
    }
}

#[tokio::test]
async fn disabled_watermarks_skip_the_bridge() {
    let dir = tempfile::tempdir().unwrap();
    let options = PipelineOptions {
        watermarks_enabled: false,
        metrics_enabled: false,
        ..options_in(dir.path())
    };
    let job = JobInfo::for_options("clicks", &options).unwrap();
    let engine = bounded_engine(1);

    let result = runner(options, Arc::clone(&engine))
        .run(unbounded_source(), job)
        .unwrap();
    result.wait_until_finish().await.unwrap();

    assert!(engine.streaming_contexts()[0].listener_names().is_empty());
}

#[tokio::test]
async fn metrics_are_recovered_from_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let options = options_in(dir.path());
    let checkpoint = MetricsCheckpoint::in_dir(options.checkpoint_dir());

    let recovered = MetricsAccumulator::new();
    recovered.inc_counter(MetricKey::new("app", "restarts"), 4);
    checkpoint.store(&recovered.snapshot()).unwrap();

    let job = JobInfo::for_options("clicks", &options).unwrap();
    let result = runner(options, bounded_engine(1))
        .run(unbounded_source(), job)
        .unwrap();
    result.wait_until_finish().await.unwrap();

    let metrics = result.metrics();
    assert_eq!(metrics.counter_total("restarts"), 4);
    assert_eq!(metrics.counter_total(ELEMENTS_METRIC), 2);

    // The checkpoint now carries both the recovered and the new metrics.
    let stored: MetricsSnapshot = checkpoint.load().unwrap().unwrap();
    assert_eq!(stored.counter_total("restarts"), 4);
    assert_eq!(stored.counter_total(ELEMENTS_METRIC), 2);
}

#[tokio::test]
async fn cancel_is_ignored_for_batch_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let options = options_in(dir.path());
    let job = JobInfo::for_options("chain", &options).unwrap();

    let result = runner(options, endless_engine())
        .run(bounded_chain(), job)
        .unwrap();
    result.cancel();

    assert_eq!(result.wait_until_finish().await.unwrap(), TerminalStatus::Done);
}
