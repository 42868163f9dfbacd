//! Covergrid - coverage-grid cache and preload engine
//!
//! This library backs a geospatial analytics dashboard that answers
//! coverage queries (which map points are served by which vendors, under a
//! filter combination) over a large, slowly-changing vendor dataset.
//! Computing a grid is expensive, so the engine's job is deciding when a
//! result can be served from cache, keeping the cache warm for the
//! combinations users actually request, and never blocking request latency
//! on background work.
//!
//! # High-Level API
//!
//! ```ignore
//! use covergrid::{CovergridConfig, CoverageGridManager, GridQuery, VendorFilters};
//! use covergrid::engine::NullAreaResolver;
//! use std::sync::Arc;
//!
//! let config = CovergridConfig::new("/var/cache/covergrid");
//! let manager = CoverageGridManager::new(config, engine, Arc::new(NullAreaResolver), None)?;
//!
//! let query = GridQuery::new("tehran", vec!["restaurant".into()], VendorFilters::default());
//! let grid = manager.get_or_calculate(&query, false)?;
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod fingerprint;
pub mod logging;
pub mod manager;
pub mod pipeline;
pub mod preload;
pub mod query;

pub use cache::{CleanupReport, GridStore, MemoryCache, StoreError, StoreSummary};
pub use config::CovergridConfig;
pub use engine::{CoverageEngine, CoverageGrid, EngineError};
pub use fingerprint::Fingerprint;
pub use manager::{CacheError, ClearScope, CoverageGridManager, ManagerStats};
pub use query::{GridQuery, VendorFilters};

/// Version of the covergrid library and CLI.
///
/// Synchronized across all workspace components; defined in `Cargo.toml`
/// and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
