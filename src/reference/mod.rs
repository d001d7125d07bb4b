//! Reference data store for the impact engine.
//!
//! Holds the four reference datasets the engine reconciles: material
//! lifecycle factors, clothing type profiles, calculation parameter sets
//! and brand sustainability profiles.
//!
//! # Snapshots
//!
//! The store is shared and may be updated while calculations are in
//! flight. Every calculation therefore pins one [`ReferenceSnapshot`]: an
//! immutable, generation-tagged view that answers all of its lookups.
//! Two backends are provided:
//!
//! - [`InMemoryReferenceStore`]: generations are swapped atomically on publish
//! - [`SqliteReferenceStore`]: each snapshot is materialised inside one read
//!   transaction and cached until the stored generation changes

mod dataset;
mod memory;
mod snapshot;
mod sqlite;
pub mod types;
mod validation;

use std::sync::Arc;

use crate::error::ImpactError;

pub use dataset::{default_dataset, load_dataset, ParameterSetRecord, ReferenceDataset};
pub use memory::InMemoryReferenceStore;
pub use snapshot::ReferenceSnapshot;
pub use sqlite::SqliteReferenceStore;
pub use types::*;
pub use validation::{validate_dataset, DataWarning};

/// Read access to a reference data store.
pub trait ReferenceStore: Send + Sync {
    /// Pin a consistent view of the reference data.
    fn snapshot(&self) -> Result<Arc<ReferenceSnapshot>, ImpactError>;
}

impl<S: ReferenceStore + ?Sized> ReferenceStore for Arc<S> {
    fn snapshot(&self) -> Result<Arc<ReferenceSnapshot>, ImpactError> {
        (**self).snapshot()
    }
}

/// Normalize a material or clothing type key: trim, lowercase, and join
/// whitespace-separated words with `_`.
pub fn normalize_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join("_")
}

/// Normalize a brand name for matching: lowercase with spaces, `&` and `.`
/// removed.
pub fn normalize_brand_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '&' && *c != '.')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  Cotton  Conventional "), "cotton_conventional");
        assert_eq!(normalize_key("POLYESTER"), "polyester");
        assert_eq!(normalize_key("t-shirt"), "t-shirt");
    }

    #[test]
    fn test_normalize_brand_name() {
        assert_eq!(normalize_brand_name("H&M"), "hm");
        assert_eq!(normalize_brand_name("Levi Strauss & Co."), "levistraussco");
    }
}
