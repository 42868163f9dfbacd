//! Interfaces to the external computation engine and lookup services.
//!
//! The actual coverage computation (grid generation, vectorized
//! vendor-distance scoring) lives outside this crate and is consumed behind
//! the [`CoverageEngine`] trait. The same applies to marketing-area
//! resolution ([`AreaResolver`]) and per-area target values
//! ([`TargetSource`]). Keeping these behind traits lets the cache and
//! preload machinery be tested with counting stubs and lets deployments swap
//! the scoring backend without touching cache behavior.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::GridQuery;

/// Errors surfaced by the computation engine.
///
/// These propagate to the caller of the synchronous request path; the
/// background preload worker logs and drops them instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The vendor/order dataset backing the computation was unavailable.
    #[error("vendor dataset unavailable: {0}")]
    DataUnavailable(String),

    /// Grid generation or vendor scoring failed.
    #[error("coverage scoring failed: {0}")]
    Scoring(String),
}

/// Per-point vendor coverage metrics produced by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Total vendors whose delivery radius covers this point.
    pub total_vendors: u32,
    /// Covering-vendor count broken down by business line.
    pub by_business_line: BTreeMap<String, u32>,
}

impl CoverageSummary {
    /// Covering-vendor count for one business line (0 if absent).
    pub fn line_count(&self, business_line: &str) -> u32 {
        self.by_business_line
            .get(business_line)
            .copied()
            .unwrap_or(0)
    }
}

/// One raw grid point as scored by the engine, before post-processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub lat: f64,
    pub lng: f64,
    pub coverage: CoverageSummary,
}

/// A marketing area containing a grid point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketingArea {
    pub id: String,
    pub name: String,
}

/// Target-vs-actual metrics attached to a point when target analysis
/// applies (single business line in the designated target city).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPerformance {
    pub business_line: String,
    pub target_value: f64,
    pub actual_value: f64,
    /// `actual / target` when the target is positive; `2.0` when no
    /// positive baseline exists. The sentinel means "exceeds target with
    /// no baseline" and is deliberate, not a division-by-zero artifact.
    pub performance_ratio: f64,
}

/// One fully processed grid point as served and cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoveragePoint {
    pub lat: f64,
    pub lng: f64,
    pub coverage: CoverageSummary,
    pub marketing_area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<TargetPerformance>,
}

/// The cacheable payload: every covered point of one computed grid.
pub type CoverageGrid = Vec<CoveragePoint>;

/// The external coverage computation engine.
///
/// Implementations are assumed blocking and potentially slow (spatial join
/// plus vectorized scoring over thousands of points); callers must not
/// assume any latency bound. Returning an empty vector is a valid result
/// meaning "no vendors matched the filters", not a failure.
pub trait CoverageEngine: Send + Sync {
    fn compute(&self, query: &GridQuery) -> Result<Vec<ScoredPoint>, EngineError>;
}

/// Resolves the marketing area containing each grid point.
///
/// The returned vector is aligned positionally with the input slice; a
/// `None` entry means the point falls outside every known area.
pub trait AreaResolver: Send + Sync {
    fn resolve(&self, points: &[ScoredPoint], city: &str) -> Vec<Option<MarketingArea>>;
}

/// Supplies per-(area, business line) target values for target analysis.
pub trait TargetSource: Send + Sync {
    fn target(&self, area_id: &str, business_line: &str) -> Option<f64>;
}

/// Resolver that maps every point to no area.
///
/// Useful for deployments without marketing-area polygons and for tests.
pub struct NullAreaResolver;

impl AreaResolver for NullAreaResolver {
    fn resolve(&self, points: &[ScoredPoint], _city: &str) -> Vec<Option<MarketingArea>> {
        vec![None; points.len()]
    }
}
