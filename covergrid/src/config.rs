//! Engine configuration.
//!
//! Groups the tunables for both cache tiers, the preload worker, and seed
//! combination generation into one builder-style struct.

use std::path::PathBuf;
use std::time::Duration;

use crate::query::VendorFilters;

/// Default bound on in-memory cache entries.
pub const DEFAULT_MEMORY_CAPACITY: usize = 50;

/// Default persistent-record retention in days.
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Complete configuration for the coverage-grid cache engine.
#[derive(Debug, Clone)]
pub struct CovergridConfig {
    /// Root directory of the persistent store.
    pub store_dir: PathBuf,
    /// Maximum entries held by the in-memory tier.
    pub memory_capacity: usize,
    /// Age after which cleanup removes persistent records.
    pub retention_days: i64,
    /// Delay between background computations, bounding engine load.
    pub worker_pacing: Duration,
    /// How long the worker waits for new tasks before re-checking.
    pub worker_idle: Duration,
    /// The busiest market; its queries preload first.
    pub primary_city: String,
    /// The highest-traffic business line; boosts preload priority.
    pub hot_business_line: String,
    /// The city for which per-area target analysis applies.
    pub target_city: String,
    /// Cities seeded into the preload queue.
    pub seed_cities: Vec<String>,
    /// Business-line combinations seeded into the preload queue.
    pub seed_business_lines: Vec<Vec<String>>,
    /// Vendor-filter presets seeded into the preload queue.
    pub seed_filters: Vec<VendorFilters>,
}

impl Default for CovergridConfig {
    fn default() -> Self {
        let store_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("covergrid");
        Self::new(store_dir)
    }
}

impl CovergridConfig {
    /// Create a configuration with defaults for everything but the store
    /// directory.
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            retention_days: DEFAULT_RETENTION_DAYS,
            worker_pacing: Duration::from_secs(2),
            worker_idle: Duration::from_secs(10),
            primary_city: "tehran".to_string(),
            hot_business_line: "restaurant".to_string(),
            target_city: "tehran".to_string(),
            seed_cities: vec![
                "tehran".to_string(),
                "mashhad".to_string(),
                "shiraz".to_string(),
            ],
            seed_business_lines: vec![
                vec!["restaurant".to_string()],
                vec!["coffee".to_string()],
                vec!["bakery".to_string()],
                vec!["supermarket".to_string()],
                vec!["restaurant".to_string(), "coffee".to_string()],
                vec!["restaurant".to_string(), "bakery".to_string()],
            ],
            seed_filters: default_seed_filters(),
        }
    }

    pub fn with_memory_capacity(mut self, capacity: usize) -> Self {
        self.memory_capacity = capacity;
        self
    }

    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }

    pub fn with_worker_pacing(mut self, pacing: Duration) -> Self {
        self.worker_pacing = pacing;
        self
    }

    pub fn with_worker_idle(mut self, idle: Duration) -> Self {
        self.worker_idle = idle;
        self
    }

    pub fn with_primary_city(mut self, city: impl Into<String>) -> Self {
        self.primary_city = city.into();
        self
    }

    pub fn with_seed_cities(mut self, cities: Vec<String>) -> Self {
        self.seed_cities = cities;
        self
    }
}

/// Filter presets covering the combinations users actually request.
fn default_seed_filters() -> Vec<VendorFilters> {
    vec![
        // High-quality vendors, open or not.
        VendorFilters {
            status_ids: vec![5],
            grades: vec!["A".to_string(), "A+".to_string()],
            visible: Some(1),
            is_open: None,
        },
        // Premium vendors currently open.
        VendorFilters {
            status_ids: vec![5],
            grades: vec!["A+".to_string()],
            visible: Some(1),
            is_open: Some(1),
        },
        // Broad active set.
        VendorFilters {
            status_ids: vec![4, 5],
            grades: vec!["A".to_string(), "A+".to_string(), "B".to_string()],
            visible: Some(1),
            is_open: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CovergridConfig::new("/tmp/covergrid-test");
        assert_eq!(config.memory_capacity, DEFAULT_MEMORY_CAPACITY);
        assert_eq!(config.retention_days, DEFAULT_RETENTION_DAYS);
        assert_eq!(config.worker_pacing, Duration::from_secs(2));
        assert_eq!(config.worker_idle, Duration::from_secs(10));
        assert_eq!(config.primary_city, "tehran");
        assert_eq!(config.seed_cities.len(), 3);
        assert_eq!(config.seed_business_lines.len(), 6);
        assert_eq!(config.seed_filters.len(), 3);
    }

    #[test]
    fn test_builder() {
        let config = CovergridConfig::new("/tmp/covergrid-test")
            .with_memory_capacity(10)
            .with_retention_days(30)
            .with_worker_pacing(Duration::from_millis(100))
            .with_primary_city("mashhad");

        assert_eq!(config.memory_capacity, 10);
        assert_eq!(config.retention_days, 30);
        assert_eq!(config.worker_pacing, Duration::from_millis(100));
        assert_eq!(config.primary_city, "mashhad");
    }

    #[test]
    fn test_exactly_one_premium_preset() {
        let premium: Vec<_> = default_seed_filters()
            .into_iter()
            .filter(|f| f.is_premium())
            .collect();
        assert_eq!(premium.len(), 1);
        assert_eq!(premium[0].is_open, Some(1));
    }
}
