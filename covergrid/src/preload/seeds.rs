//! Seed combinations: the filter combinations users actually request,
//! enumerated so the preload worker can warm them before they are asked for.

use crate::config::CovergridConfig;
use crate::preload::task::score_priority;
use crate::query::GridQuery;

/// One well-known combination with its preload priority.
#[derive(Debug, Clone)]
pub struct SeedCombination {
    pub query: GridQuery,
    pub priority: u8,
}

/// Enumerate the cartesian product of configured seed cities, business-line
/// sets, and filter presets, scoring each for preload ordering.
pub fn seed_combinations(config: &CovergridConfig) -> Vec<SeedCombination> {
    let mut combinations = Vec::with_capacity(
        config.seed_cities.len() * config.seed_business_lines.len() * config.seed_filters.len(),
    );

    for city in &config.seed_cities {
        for lines in &config.seed_business_lines {
            for filters in &config.seed_filters {
                let query = GridQuery::new(city.clone(), lines.clone(), filters.clone());
                let priority = score_priority(config, &query);
                combinations.push(SeedCombination { query, priority });
            }
        }
    }

    combinations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CovergridConfig {
        CovergridConfig::new("/tmp/covergrid-test")
    }

    #[test]
    fn test_full_cartesian_product() {
        let config = config();
        let combos = seed_combinations(&config);
        assert_eq!(
            combos.len(),
            config.seed_cities.len()
                * config.seed_business_lines.len()
                * config.seed_filters.len()
        );
    }

    #[test]
    fn test_priorities_within_range() {
        for combo in seed_combinations(&config()) {
            assert!((1..=5).contains(&combo.priority));
        }
    }

    #[test]
    fn test_primary_city_premium_single_line_hits_floor() {
        let combos = seed_combinations(&config());
        let floor = combos.iter().find(|c| {
            c.query.city == "tehran"
                && c.query.business_lines == vec!["restaurant".to_string()]
                && c.query.vendor_filters.is_premium()
        });
        assert_eq!(floor.expect("seed set includes the premium combo").priority, 1);
    }

    #[test]
    fn test_high_priority_subset_nonempty() {
        // Warm-up targets priority <= 2; the default seed set must include
        // some for the primary city.
        let count = seed_combinations(&config())
            .iter()
            .filter(|c| c.query.city == "tehran" && c.priority <= 2)
            .count();
        assert!(count > 0);
    }
}
