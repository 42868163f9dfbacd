//! Persistent cache tier.
//!
//! Durable key→result storage that survives process restarts. Each record is
//! one JSON envelope file under the store directory; a startup scan rebuilds
//! the in-memory index. The tier is not size-bounded by eviction: records
//! age out through [`GridStore::cleanup`], which sweeps coverage grids by
//! last access and heatmaps by creation time.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::stats::TierStats;
use crate::engine::CoverageGrid;
use crate::fingerprint::Fingerprint;
use crate::query::{GridQuery, VendorFilters};

/// Persistent-store failures.
///
/// These are reported to the caller, never raised as fatal: the request path
/// treats a store failure as "proceed without caching".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable envelope for one cached coverage grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GridRecord {
    key: String,
    city: String,
    business_lines: String,
    vendor_filters: VendorFilters,
    point_count: usize,
    created_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
    grid: CoverageGrid,
}

/// One weighted point of a cached heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPoint {
    pub lat: f64,
    pub lng: f64,
    pub weight: f64,
}

/// Durable envelope for one cached heatmap.
///
/// Heatmaps have no access-recency tracking; they expire by `created_at`
/// because their inputs (order date ranges) go stale regardless of use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapRecord {
    pub key: Fingerprint,
    pub kind: String,
    pub city: String,
    pub date_range: String,
    pub business_line: String,
    pub zoom_level: u32,
    pub created_at: DateTime<Utc>,
    pub points: Vec<HeatmapPoint>,
}

impl HeatmapRecord {
    pub fn new(
        key: Fingerprint,
        kind: impl Into<String>,
        city: impl Into<String>,
        date_range: impl Into<String>,
        business_line: impl Into<String>,
        zoom_level: u32,
        points: Vec<HeatmapPoint>,
    ) -> Self {
        Self {
            key,
            kind: kind.into(),
            city: city.into(),
            date_range: date_range.into(),
            business_line: business_line.into(),
            zoom_level,
            created_at: Utc::now(),
            points,
        }
    }
}

#[derive(Debug, Clone)]
struct GridIndexEntry {
    path: PathBuf,
    point_count: usize,
    last_accessed: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct HeatmapIndexEntry {
    path: PathBuf,
    created_at: DateTime<Utc>,
}

/// Counts of records removed by one cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub grids_removed: usize,
    pub heatmaps_removed: usize,
}

/// Aggregate store statistics for the operator surface.
#[derive(Debug, Clone, Default)]
pub struct StoreSummary {
    pub grid_count: usize,
    pub avg_point_count: f64,
    pub heatmap_count: usize,
}

/// Persistent key/value store for computed grids and heatmaps.
pub struct GridStore {
    grids_dir: PathBuf,
    heatmaps_dir: PathBuf,
    grids: Mutex<HashMap<String, GridIndexEntry>>,
    heatmaps: Mutex<HashMap<String, HeatmapIndexEntry>>,
    stats: Mutex<TierStats>,
}

impl GridStore {
    /// Open (or create) a store rooted at `root`.
    ///
    /// Scans existing record files to rebuild the index; unreadable files
    /// are skipped with a warning rather than failing the open.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        let grids_dir = root.join("grids");
        let heatmaps_dir = root.join("heatmaps");
        fs::create_dir_all(&grids_dir)?;
        fs::create_dir_all(&heatmaps_dir)?;

        let store = Self {
            grids_dir,
            heatmaps_dir,
            grids: Mutex::new(HashMap::new()),
            heatmaps: Mutex::new(HashMap::new()),
            stats: Mutex::new(TierStats::new()),
        };
        store.scan()?;
        Ok(store)
    }

    /// Rebuild both indexes from the record files on disk.
    fn scan(&self) -> Result<(), StoreError> {
        let mut grids = self.grids.lock().unwrap();
        for path in json_files(&self.grids_dir)? {
            match read_grid_record(&path) {
                Ok(record) => {
                    grids.insert(
                        record.key.clone(),
                        GridIndexEntry {
                            path,
                            point_count: record.point_count,
                            last_accessed: record.last_accessed,
                        },
                    );
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable grid record"),
            }
        }
        drop(grids);

        let mut heatmaps = self.heatmaps.lock().unwrap();
        for path in json_files(&self.heatmaps_dir)? {
            match read_heatmap_record(&path) {
                Ok(record) => {
                    heatmaps.insert(
                        record.key.as_str().to_string(),
                        HeatmapIndexEntry {
                            path,
                            created_at: record.created_at,
                        },
                    );
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable heatmap record"),
            }
        }
        Ok(())
    }

    /// Look up a cached grid, bumping its access recency.
    ///
    /// The recency bump is persisted by rewriting the envelope; a rewrite
    /// failure downgrades to a warning and the payload is still returned.
    pub fn lookup(&self, key: &Fingerprint) -> Result<Option<CoverageGrid>, StoreError> {
        let path = {
            let grids = self.grids.lock().unwrap();
            grids.get(key.as_str()).map(|entry| entry.path.clone())
        };

        let Some(path) = path else {
            self.stats.lock().unwrap().record_miss();
            return Ok(None);
        };

        let mut record = match read_grid_record(&path) {
            Ok(record) => record,
            Err(StoreError::Io(_)) => {
                // File vanished underneath us; prune the index entry.
                self.grids.lock().unwrap().remove(key.as_str());
                self.stats.lock().unwrap().record_miss();
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        record.last_accessed = now;
        if let Err(e) = write_json(&path, &record) {
            warn!(key = key.short(), error = %e, "failed to persist access-recency bump");
        }
        if let Some(entry) = self.grids.lock().unwrap().get_mut(key.as_str()) {
            entry.last_accessed = now;
        }

        self.stats.lock().unwrap().record_hit();
        Ok(Some(record.grid))
    }

    /// Upsert a computed grid.
    ///
    /// A write for an existing key replaces its payload and refreshes both
    /// timestamps.
    pub fn store_grid(
        &self,
        key: &Fingerprint,
        query: &GridQuery,
        grid: &CoverageGrid,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        let record = GridRecord {
            key: key.as_str().to_string(),
            city: query.city.clone(),
            business_lines: query.business_line_csv(),
            vendor_filters: query.vendor_filters.clone(),
            point_count: grid.len(),
            created_at: now,
            last_accessed: now,
            grid: grid.clone(),
        };

        let path = self.grids_dir.join(format!("{}.json", key));
        if let Err(e) = write_json(&path, &record) {
            self.stats.lock().unwrap().record_write_failure();
            return Err(e);
        }

        self.grids.lock().unwrap().insert(
            key.as_str().to_string(),
            GridIndexEntry {
                path,
                point_count: record.point_count,
                last_accessed: now,
            },
        );
        self.stats.lock().unwrap().record_write();
        debug!(key = key.short(), points = record.point_count, "stored coverage grid");
        Ok(())
    }

    /// Whether a grid record exists, without bumping its recency.
    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.grids.lock().unwrap().contains_key(key.as_str())
    }

    /// Upsert a heatmap record.
    pub fn store_heatmap(&self, record: &HeatmapRecord) -> Result<(), StoreError> {
        let path = self.heatmaps_dir.join(format!("{}.json", record.key));
        if let Err(e) = write_json(&path, record) {
            self.stats.lock().unwrap().record_write_failure();
            return Err(e);
        }

        self.heatmaps.lock().unwrap().insert(
            record.key.as_str().to_string(),
            HeatmapIndexEntry {
                path,
                created_at: record.created_at,
            },
        );
        self.stats.lock().unwrap().record_write();
        Ok(())
    }

    /// Look up a cached heatmap. No recency bump; heatmaps age by creation.
    pub fn lookup_heatmap(&self, key: &Fingerprint) -> Result<Option<Vec<HeatmapPoint>>, StoreError> {
        let path = {
            let heatmaps = self.heatmaps.lock().unwrap();
            heatmaps.get(key.as_str()).map(|entry| entry.path.clone())
        };

        let Some(path) = path else {
            return Ok(None);
        };

        match read_heatmap_record(&path) {
            Ok(record) => Ok(Some(record.points)),
            Err(StoreError::Io(_)) => {
                self.heatmaps.lock().unwrap().remove(key.as_str());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete records older than `max_age`.
    ///
    /// Grids are judged by `last_accessed`, heatmaps by `created_at`.
    pub fn cleanup(&self, max_age: Duration) -> CleanupReport {
        let cutoff = Utc::now() - max_age;

        let expired_grids: Vec<(String, PathBuf)> = {
            let grids = self.grids.lock().unwrap();
            grids
                .iter()
                .filter(|(_, entry)| entry.last_accessed < cutoff)
                .map(|(key, entry)| (key.clone(), entry.path.clone()))
                .collect()
        };
        for (key, path) in &expired_grids {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(key = &key[..8.min(key.len())], error = %e, "failed to delete expired grid record");
                }
            }
            self.grids.lock().unwrap().remove(key);
        }

        let expired_heatmaps: Vec<(String, PathBuf)> = {
            let heatmaps = self.heatmaps.lock().unwrap();
            heatmaps
                .iter()
                .filter(|(_, entry)| entry.created_at < cutoff)
                .map(|(key, entry)| (key.clone(), entry.path.clone()))
                .collect()
        };
        for (key, path) in &expired_heatmaps {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(error = %e, "failed to delete expired heatmap record");
                }
            }
            self.heatmaps.lock().unwrap().remove(key);
        }

        let report = CleanupReport {
            grids_removed: expired_grids.len(),
            heatmaps_removed: expired_heatmaps.len(),
        };
        if report.grids_removed > 0 || report.heatmaps_removed > 0 {
            debug!(
                grids = report.grids_removed,
                heatmaps = report.heatmaps_removed,
                "cleaned up expired cache records"
            );
        }
        report
    }

    /// Delete every record in the store.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        let mut grids = self.grids.lock().unwrap();
        for entry in grids.values() {
            let _ = fs::remove_file(&entry.path);
        }
        grids.clear();
        drop(grids);

        let mut heatmaps = self.heatmaps.lock().unwrap();
        for entry in heatmaps.values() {
            let _ = fs::remove_file(&entry.path);
        }
        heatmaps.clear();
        Ok(())
    }

    /// Record counts and average grid size for stats reporting.
    pub fn summary(&self) -> StoreSummary {
        let grids = self.grids.lock().unwrap();
        let grid_count = grids.len();
        let avg_point_count = if grid_count == 0 {
            0.0
        } else {
            grids.values().map(|e| e.point_count as f64).sum::<f64>() / grid_count as f64
        };
        drop(grids);

        StoreSummary {
            grid_count,
            avg_point_count,
            heatmap_count: self.heatmaps.lock().unwrap().len(),
        }
    }

    pub fn tier_stats(&self) -> TierStats {
        self.stats.lock().unwrap().clone()
    }
}

/// List `.json` files directly under `dir`.
fn json_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
            files.push(path);
        }
    }
    Ok(files)
}

fn read_grid_record(path: &Path) -> Result<GridRecord, StoreError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn read_heatmap_record(path: &Path) -> Result<HeatmapRecord, StoreError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    fs::write(path, serde_json::to_string(value)?)?;
    Ok(())
}
