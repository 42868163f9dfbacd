//! Cache-key derivation.
//!
//! Every cacheable result is identified by a fingerprint: a Sha256 digest of
//! the canonical serialization of its query parameters. Two logically
//! identical parameter sets always produce the same fingerprint regardless of
//! business-line ordering or map key ordering; any semantic difference
//! produces a different fingerprint with overwhelming probability.
//!
//! Callers treat the fingerprint as an opaque fixed-width string; it is never
//! parsed back into its inputs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::query::GridQuery;

/// Hex length of a fingerprint (Sha256 → 32 bytes → 64 hex chars).
pub const FINGERPRINT_LEN: usize = 64;

/// Opaque identifier for one cacheable coverage-grid result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive the fingerprint for a query with no extra parameters.
    pub fn derive(query: &GridQuery) -> Self {
        Self::derive_with(query, None)
    }

    /// Derive the fingerprint for a query plus optional extra parameters.
    ///
    /// Canonicalization rules:
    /// - `business_lines` are sorted, so input order never matters;
    /// - the JSON object representation sorts keys, so map key order never
    ///   matters;
    /// - `None` extra parameters normalize to an empty map, so `None` and
    ///   `Some(&BTreeMap::new())` hash identically.
    pub fn derive_with(query: &GridQuery, extra: Option<&BTreeMap<String, Value>>) -> Self {
        let mut lines = query.business_lines.clone();
        lines.sort();

        let payload = json!({
            "city": query.city,
            "business_lines": lines,
            "vendor_filters": query.vendor_filters,
            "extra": extra.cloned().unwrap_or_default(),
        });

        // Serializing a `Value` cannot fail: all keys are strings.
        let canonical =
            serde_json::to_string(&payload).expect("JSON value serialization cannot fail");

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
