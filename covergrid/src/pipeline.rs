//! Grid production pipeline: engine invocation plus result post-processing.
//!
//! Both the synchronous request path and the background preload worker
//! produce grids through this pipeline so that cached payloads are identical
//! regardless of which path computed them.

use std::sync::Arc;

use tracing::debug;

use crate::engine::{
    AreaResolver, CoverageEngine, CoverageGrid, CoveragePoint, EngineError, MarketingArea,
    ScoredPoint, TargetPerformance, TargetSource,
};
use crate::query::GridQuery;

/// Sentinel ratio meaning "exceeds target with no positive baseline".
const NO_BASELINE_RATIO: f64 = 2.0;

/// Computes and post-processes coverage grids.
pub struct GridPipeline {
    engine: Arc<dyn CoverageEngine>,
    areas: Arc<dyn AreaResolver>,
    targets: Option<Arc<dyn TargetSource>>,
    target_city: String,
}

impl GridPipeline {
    pub fn new(
        engine: Arc<dyn CoverageEngine>,
        areas: Arc<dyn AreaResolver>,
        targets: Option<Arc<dyn TargetSource>>,
        target_city: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            areas,
            targets,
            target_city: target_city.into(),
        }
    }

    /// Compute a grid for `query` and post-process it for serving.
    ///
    /// An empty result means no vendors matched the filters; callers cache
    /// it like any other result so repeated no-data queries skip the engine.
    pub fn produce(&self, query: &GridQuery) -> Result<CoverageGrid, EngineError> {
        let scored = self.engine.compute(query)?;
        if scored.is_empty() {
            debug!(city = %query.city, "no coverage for query");
            return Ok(Vec::new());
        }

        let areas = self.areas.resolve(&scored, &query.city);
        Ok(self.process(scored, areas, query))
    }

    /// Post-process scored points into the served payload.
    ///
    /// Points with zero covering vendors are dropped, not emitted as
    /// zero-coverage entries. Target analysis applies only to single-line
    /// queries in the designated target city.
    fn process(
        &self,
        scored: Vec<ScoredPoint>,
        areas: Vec<Option<MarketingArea>>,
        query: &GridQuery,
    ) -> CoverageGrid {
        let target_line = if query.city == self.target_city && query.business_lines.len() == 1 {
            self.targets
                .as_ref()
                .map(|source| (source, query.business_lines[0].as_str()))
        } else {
            None
        };

        let mut processed = Vec::with_capacity(scored.len());
        for (i, point) in scored.into_iter().enumerate() {
            if point.coverage.total_vendors == 0 {
                continue;
            }

            let area = areas.get(i).cloned().flatten();
            let performance = match (&target_line, &area) {
                (Some((source, line)), Some(area)) => {
                    source.target(&area.id, line).map(|target| {
                        let actual = f64::from(point.coverage.line_count(line));
                        TargetPerformance {
                            business_line: line.to_string(),
                            target_value: target,
                            actual_value: actual,
                            performance_ratio: if target > 0.0 {
                                actual / target
                            } else {
                                NO_BASELINE_RATIO
                            },
                        }
                    })
                }
                _ => None,
            };

            processed.push(CoveragePoint {
                lat: point.lat,
                lng: point.lng,
                marketing_area: area.map(|a| a.name),
                performance,
                coverage: point.coverage,
            });
        }
        processed
    }
}
