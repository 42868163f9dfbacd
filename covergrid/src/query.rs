//! Query parameter types shared across the cache tiers and preload system.

use serde::{Deserialize, Serialize};

/// Vendor filter set applied before scoring a coverage grid.
///
/// Field semantics mirror the vendor store: `status_ids` and `grades` are
/// inclusion lists (empty = no filtering on that column), `visible` and
/// `is_open` are tri-state flags where `None` means "don't care".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorFilters {
    /// Vendor status ids to include (e.g., 5 = active).
    #[serde(default)]
    pub status_ids: Vec<i32>,
    /// Vendor grades to include (e.g., "A", "A+").
    #[serde(default)]
    pub grades: Vec<String>,
    /// Visibility flag filter (1 = visible only), `None` = unfiltered.
    pub visible: Option<i32>,
    /// Open-now flag filter (1 = open only), `None` = unfiltered.
    pub is_open: Option<i32>,
}

impl VendorFilters {
    /// Whether this filter set selects the premium tier only.
    ///
    /// The premium tier is the most selective grade filter: exactly
    /// `["A+"]`. Used by preload priority scoring.
    pub fn is_premium(&self) -> bool {
        self.grades.len() == 1 && self.grades[0] == "A+"
    }
}

/// One cacheable coverage-grid request: a city, the business lines to
/// score, and the vendor filters to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridQuery {
    pub city: String,
    pub business_lines: Vec<String>,
    pub vendor_filters: VendorFilters,
}

impl GridQuery {
    pub fn new(
        city: impl Into<String>,
        business_lines: Vec<String>,
        vendor_filters: VendorFilters,
    ) -> Self {
        Self {
            city: city.into(),
            business_lines,
            vendor_filters,
        }
    }

    /// Business lines joined for persistent-record metadata.
    pub fn business_line_csv(&self) -> String {
        self.business_lines.join(",")
    }
}
