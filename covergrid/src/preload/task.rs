//! Preload tasks and priority scoring.

use chrono::{DateTime, Utc};

use crate::config::CovergridConfig;
use crate::fingerprint::Fingerprint;
use crate::query::GridQuery;

/// A pending background computation request.
///
/// Created on a cache miss or when seeding common combinations; consumed
/// exactly once by the worker; never mutated after creation.
#[derive(Debug, Clone)]
pub struct PreloadTask {
    pub query: GridQuery,
    /// 1 = serve first, 5 = serve last.
    pub priority: u8,
    pub created_at: DateTime<Utc>,
}

impl PreloadTask {
    pub fn new(query: GridQuery, priority: u8) -> Self {
        Self {
            query,
            priority,
            created_at: Utc::now(),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::derive(&self.query)
    }
}

/// Heuristic preload priority for a query (1 = highest, 5 = lowest).
///
/// Base 3, with a bonus for the primary city, the high-traffic business
/// line, single-line queries (the common case), and the premium filter
/// tier. Mis-ranking only affects warm-up order, never correctness.
pub fn score_priority(config: &CovergridConfig, query: &GridQuery) -> u8 {
    let mut priority: i8 = 3;

    if query.city == config.primary_city {
        priority -= 1;
    }
    if query
        .business_lines
        .iter()
        .any(|line| line == &config.hot_business_line)
    {
        priority -= 1;
    }
    if query.business_lines.len() == 1 {
        priority -= 1;
    }
    if query.vendor_filters.is_premium() {
        priority -= 1;
    }

    priority.clamp(1, 5) as u8
}
