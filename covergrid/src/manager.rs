//! Coverage-grid cache manager.
//!
//! The orchestrator tying the tiers together: serves `get_or_calculate`,
//! seeds and drives the preload worker, and exposes the warm-up, clear,
//! cleanup, and stats operations. Constructed explicitly by the process's
//! composition root and passed where needed: there is no global instance.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{
    CleanupReport, GridStore, MemoryCache, StoreError, StoreSummary, TierStats,
};
use crate::config::CovergridConfig;
use crate::engine::{AreaResolver, CoverageEngine, CoverageGrid, EngineError, TargetSource};
use crate::fingerprint::Fingerprint;
use crate::pipeline::GridPipeline;
use crate::preload::{
    score_priority, seed_combinations, PreloadQueue, PreloadTask, PreloadWorker, SeedCombination,
    WorkerConfig,
};
use crate::query::GridQuery;

/// Failures surfaced by manager operations.
///
/// A cache miss is not an error: it is the normal path into computation.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The computation engine failed; nothing was cached. The caller
    /// decides how to present this.
    #[error("coverage computation failed: {0}")]
    Compute(#[from] EngineError),

    /// A persistent-store operation requested explicitly (clear) failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which cache tiers a clear operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    Memory,
    Persistent,
    All,
}

/// Snapshot of cache, queue, and worker state.
#[derive(Debug, Clone)]
pub struct ManagerStats {
    pub memory_entries: usize,
    pub memory_capacity: usize,
    pub memory_keys: Vec<String>,
    pub memory: TierStats,
    pub store: TierStats,
    pub store_summary: StoreSummary,
    pub queue_depth: usize,
    pub preloading: bool,
}

/// Orchestrates the two cache tiers, the preload queue, and the worker.
pub struct CoverageGridManager {
    config: CovergridConfig,
    memory: MemoryCache,
    store: Arc<GridStore>,
    queue: Arc<PreloadQueue>,
    pipeline: Arc<GridPipeline>,
    seeds: Vec<SeedCombination>,
    worker: Mutex<Option<PreloadWorker>>,
}

impl CoverageGridManager {
    /// Build a manager over the given collaborators.
    ///
    /// Opens (or creates) the persistent store under the configured
    /// directory and precomputes the seed combinations.
    pub fn new(
        config: CovergridConfig,
        engine: Arc<dyn CoverageEngine>,
        areas: Arc<dyn AreaResolver>,
        targets: Option<Arc<dyn TargetSource>>,
    ) -> Result<Self, StoreError> {
        let store = Arc::new(GridStore::open(&config.store_dir)?);
        let pipeline = Arc::new(GridPipeline::new(
            engine,
            areas,
            targets,
            config.target_city.clone(),
        ));
        let seeds = seed_combinations(&config);

        Ok(Self {
            memory: MemoryCache::new(config.memory_capacity),
            store,
            queue: Arc::new(PreloadQueue::new()),
            pipeline,
            seeds,
            config,
            worker: Mutex::new(None),
        })
    }

    /// Serve a coverage grid from cache, computing it on a miss.
    ///
    /// Lookup order: memory tier, then persistent tier (promoting the hit
    /// into memory). On a full miss the request is also queued for
    /// background reuse, then computed synchronously for this caller -
    /// request latency never depends on the worker. Empty results are
    /// cached like any other so repeated no-data queries skip the engine.
    /// A persistent-store failure degrades to "proceed without caching".
    pub fn get_or_calculate(
        &self,
        query: &GridQuery,
        force: bool,
    ) -> Result<CoverageGrid, CacheError> {
        let key = Fingerprint::derive(query);

        if !force {
            if let Some(grid) = self.memory.get(&key) {
                debug!(key = key.short(), "memory cache hit");
                return Ok(grid);
            }

            match self.store.lookup(&key) {
                Ok(Some(grid)) => {
                    debug!(key = key.short(), "persistent cache hit");
                    self.memory.put(key, grid.clone());
                    return Ok(grid);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(key = key.short(), error = %e, "persistent lookup failed")
                }
            }
        }

        let priority = score_priority(&self.config, query);
        self.queue.enqueue(PreloadTask::new(query.clone(), priority));

        info!(
            city = %query.city,
            lines = %query.business_line_csv(),
            "computing coverage grid"
        );
        let grid = self.pipeline.produce(query)?;

        if let Err(e) = self.store.store_grid(&key, query, &grid) {
            warn!(key = key.short(), error = %e, "skipping persistent cache write");
        }
        self.memory.put(key, grid.clone());

        Ok(grid)
    }

    /// Seed the queue with the common combinations and start the worker.
    ///
    /// Idempotent: calling while a worker is already running logs a warning
    /// and changes nothing. Must be called within a Tokio runtime.
    pub fn start_preloading(&self) {
        let mut slot = self.worker.lock().unwrap();
        if slot.as_ref().is_some_and(|worker| worker.is_running()) {
            warn!("preloading already in progress");
            return;
        }

        let mut queued = 0;
        for seed in &self.seeds {
            if self
                .queue
                .enqueue(PreloadTask::new(seed.query.clone(), seed.priority))
            {
                queued += 1;
            }
        }

        *slot = Some(PreloadWorker::spawn(
            Arc::clone(&self.queue),
            Arc::clone(&self.store),
            Arc::clone(&self.pipeline),
            WorkerConfig {
                pacing: self.config.worker_pacing,
                idle: self.config.worker_idle,
            },
        ));
        info!(tasks = queued, "started coverage grid preloading");
    }

    /// Stop the worker without waiting for in-flight work. Idempotent.
    pub fn stop_preloading(&self) {
        if let Some(worker) = self.worker.lock().unwrap().take() {
            worker.stop();
            info!("stopping preload worker");
        }
    }

    /// Synchronously compute the high-priority seed combinations for the
    /// given cities. Intended for startup; failures are logged and skipped.
    ///
    /// Returns the number of combinations successfully warmed.
    pub fn warm_up(&self, cities: &[&str]) -> usize {
        let combos: Vec<&SeedCombination> = self
            .seeds
            .iter()
            .filter(|seed| seed.priority <= 2 && cities.contains(&seed.query.city.as_str()))
            .collect();
        info!(combos = combos.len(), "warming up cache");

        let mut warmed = 0;
        for seed in combos {
            match self.get_or_calculate(&seed.query, false) {
                Ok(_) => warmed += 1,
                Err(e) => {
                    warn!(city = %seed.query.city, error = %e, "warm-up computation failed")
                }
            }
        }
        warmed
    }

    /// Clear one or both cache tiers.
    pub fn clear(&self, scope: ClearScope) -> Result<(), CacheError> {
        if matches!(scope, ClearScope::Memory | ClearScope::All) {
            self.memory.clear();
            info!("cleared memory cache");
        }
        if matches!(scope, ClearScope::Persistent | ClearScope::All) {
            self.store.clear_all()?;
            info!("cleared persistent cache");
        }
        Ok(())
    }

    /// Sweep expired persistent records per the configured retention.
    pub fn cleanup(&self) -> CleanupReport {
        self.store
            .cleanup(chrono::Duration::days(self.config.retention_days))
    }

    /// Aggregate statistics across tiers, queue, and worker.
    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            memory_entries: self.memory.len(),
            memory_capacity: self.memory.capacity(),
            memory_keys: self
                .memory
                .keys()
                .into_iter()
                .map(|key| key.as_str().to_string())
                .collect(),
            memory: self.memory.stats(),
            store: self.store.tier_stats(),
            store_summary: self.store.summary(),
            queue_depth: self.queue.len(),
            preloading: self
                .worker
                .lock()
                .unwrap()
                .as_ref()
                .is_some_and(|worker| worker.is_running()),
        }
    }

    /// Direct access to the persistent store, e.g. for heatmap records.
    pub fn store(&self) -> &GridStore {
        &self.store
    }
}
