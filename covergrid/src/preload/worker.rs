//! Background preload worker.
//!
//! A single long-running task drains the preload queue at its own pace,
//! computing grids nobody has requested yet so they are warm before they
//! are asked for. The loop is woken by an enqueue notification or an idle
//! timer and shuts down through a cancellation token, observed at iteration
//! boundaries: stopping never waits for an in-flight computation.
//!
//! Every failure inside the loop is logged and swallowed: background work
//! must never take down the process, and a dropped task simply means a
//! future real request recomputes synchronously.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::GridStore;
use crate::pipeline::GridPipeline;
use crate::preload::queue::PreloadQueue;
use crate::preload::task::PreloadTask;

/// Worker scheduling intervals.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Delay between computations, bounding engine load.
    pub pacing: Duration,
    /// Fallback wait when the queue is empty and no notification arrives.
    pub idle: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pacing: Duration::from_secs(2),
            idle: Duration::from_secs(10),
        }
    }
}

/// Handle to the running preload worker.
pub struct PreloadWorker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PreloadWorker {
    /// Spawn the worker onto the current Tokio runtime.
    pub fn spawn(
        queue: Arc<PreloadQueue>,
        store: Arc<GridStore>,
        pipeline: Arc<GridPipeline>,
        config: WorkerConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            run_loop(queue, store, pipeline, config, loop_cancel).await;
        });

        info!("preload worker started");
        Self { cancel, handle }
    }

    /// Signal shutdown. Non-blocking: the loop observes the token at its
    /// next iteration boundary and does not wait for in-flight work.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for PreloadWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_loop(
    queue: Arc<PreloadQueue>,
    store: Arc<GridStore>,
    pipeline: Arc<GridPipeline>,
    config: WorkerConfig,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }

        match queue.dequeue() {
            Some(task) => {
                preload_task(&store, &pipeline, task).await;

                // Pace between computations regardless of outcome.
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(config.pacing) => {}
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = queue.notified() => {}
                    _ = tokio::time::sleep(config.idle) => {}
                }
            }
        }
    }

    info!("preload worker stopped");
}

/// Compute one queued task and write it to the persistent tier.
///
/// The memory tier is deliberately left alone: it fills lazily from reads,
/// and pre-warming it here would evict entries real requests are using.
async fn preload_task(store: &Arc<GridStore>, pipeline: &Arc<GridPipeline>, task: PreloadTask) {
    let key = task.fingerprint();

    // Another path may have filled this since the task was enqueued.
    if store.contains(&key) {
        debug!(key = key.short(), "already cached, skipping preload");
        return;
    }

    let store = Arc::clone(store);
    let pipeline = Arc::clone(pipeline);
    let city = task.query.city.clone();

    let outcome = tokio::task::spawn_blocking(move || {
        let grid = pipeline.produce(&task.query)?;
        match store.store_grid(&key, &task.query, &grid) {
            Ok(()) => {
                info!(key = key.short(), points = grid.len(), "preloaded coverage grid")
            }
            Err(e) => warn!(key = key.short(), error = %e, "failed to store preloaded grid"),
        }
        Ok::<(), crate::engine::EngineError>(())
    })
    .await;

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(city = %city, error = %e, "preload computation failed"),
        Err(e) => warn!(city = %city, error = %e, "preload task aborted"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        CoverageEngine, CoverageSummary, EngineError, NullAreaResolver, ScoredPoint,
    };
    use crate::fingerprint::Fingerprint;
    use crate::query::{GridQuery, VendorFilters};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Engine stub that counts calls and fails for the city "broken".
    struct CountingEngine {
        calls: AtomicUsize,
    }

    impl CountingEngine {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl CoverageEngine for CountingEngine {
        fn compute(&self, query: &GridQuery) -> Result<Vec<ScoredPoint>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if query.city == "broken" {
                return Err(EngineError::Scoring("synthetic failure".to_string()));
            }
            Ok(vec![ScoredPoint {
                lat: 35.7,
                lng: 51.4,
                coverage: CoverageSummary {
                    total_vendors: 3,
                    by_business_line: BTreeMap::from([("restaurant".to_string(), 3)]),
                },
            }])
        }
    }

    fn harness() -> (
        Arc<PreloadQueue>,
        Arc<GridStore>,
        Arc<GridPipeline>,
        Arc<CountingEngine>,
        TempDir,
    ) {
        let temp = TempDir::new().unwrap();
        let engine = Arc::new(CountingEngine::new());
        let pipeline = Arc::new(GridPipeline::new(
            engine.clone(),
            Arc::new(NullAreaResolver),
            None,
            "tehran",
        ));
        let store = Arc::new(GridStore::open(temp.path()).unwrap());
        (Arc::new(PreloadQueue::new()), store, pipeline, engine, temp)
    }

    fn task(city: &str) -> PreloadTask {
        PreloadTask::new(
            GridQuery::new(city, vec!["restaurant".to_string()], VendorFilters::default()),
            1,
        )
    }

    fn fast_config() -> WorkerConfig {
        WorkerConfig {
            pacing: Duration::from_millis(10),
            idle: Duration::from_millis(20),
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("condition not reached within timeout");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_drains_queue_into_store() {
        let (queue, store, pipeline, engine, _temp) = harness();
        let key = task("tehran").fingerprint();

        queue.enqueue(task("tehran"));
        let worker = PreloadWorker::spawn(
            queue.clone(),
            store.clone(),
            pipeline.clone(),
            fast_config(),
        );

        let store_probe = store.clone();
        wait_until(move || store_probe.contains(&key)).await;

        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        assert!(queue.is_empty());
        worker.stop();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_wakes_on_enqueue() {
        let (queue, store, pipeline, _engine, _temp) = harness();
        // Long idle interval: only the enqueue notification can wake it.
        let config = WorkerConfig {
            pacing: Duration::from_millis(10),
            idle: Duration::from_secs(60),
        };
        let worker = PreloadWorker::spawn(queue.clone(), store.clone(), pipeline, config);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let key = task("tehran").fingerprint();
        queue.enqueue(task("tehran"));

        let store_probe = store.clone();
        wait_until(move || store_probe.contains(&key)).await;
        worker.stop();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_skips_already_cached() {
        let (queue, store, pipeline, engine, _temp) = harness();

        // Fill the store through the pipeline first.
        let query = task("tehran").query;
        let key = Fingerprint::derive(&query);
        let grid = pipeline.produce(&query).unwrap();
        store.store_grid(&key, &query, &grid).unwrap();
        let calls_before = engine.calls.load(Ordering::SeqCst);

        queue.enqueue(task("tehran"));
        let worker = PreloadWorker::spawn(queue.clone(), store, pipeline, fast_config());

        let queue_probe = queue.clone();
        wait_until(move || queue_probe.is_empty()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            engine.calls.load(Ordering::SeqCst),
            calls_before,
            "cached task must not recompute"
        );
        worker.stop();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_dropped_and_loop_continues() {
        let (queue, store, pipeline, engine, _temp) = harness();

        queue.enqueue(task("broken"));
        queue.enqueue(task("tehran"));
        let worker = PreloadWorker::spawn(queue, store.clone(), pipeline, fast_config());

        let good_key = task("tehran").fingerprint();
        let store_probe = store.clone();
        wait_until(move || store_probe.contains(&good_key)).await;

        // Both tasks computed; the failed one left nothing behind.
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        assert!(!store.contains(&task("broken").fingerprint()));
        assert!(worker.is_running(), "failures must not kill the loop");
        worker.stop();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_is_nonblocking_and_idempotent() {
        let (queue, store, pipeline, _engine, _temp) = harness();
        let worker = PreloadWorker::spawn(queue, store, pipeline, fast_config());
        assert!(worker.is_running());

        worker.stop();
        worker.stop();

        wait_until(|| !worker.is_running()).await;
    }
}
