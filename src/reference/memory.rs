use std::sync::{Arc, RwLock};

use tracing::info;

use super::dataset::ReferenceDataset;
use super::snapshot::ReferenceSnapshot;
use super::ReferenceStore;
use crate::error::ImpactError;

/// In-process reference store holding one immutable generation at a time.
///
/// `publish` swaps in a whole new generation; snapshots already handed out
/// keep pointing at the generation they pinned.
pub struct InMemoryReferenceStore {
    current: RwLock<Arc<ReferenceSnapshot>>,
}

impl InMemoryReferenceStore {
    /// Create a store whose first generation is `dataset`.
    pub fn new(dataset: ReferenceDataset) -> Self {
        Self {
            current: RwLock::new(Arc::new(ReferenceSnapshot::from_dataset(dataset, 1))),
        }
    }

    /// Replace the reference data. Returns the new generation number.
    pub fn publish(&self, dataset: ReferenceDataset) -> Result<u64, ImpactError> {
        let mut current = self
            .current
            .write()
            .map_err(|_| ImpactError::Store("reference store lock poisoned".to_string()))?;

        let generation = current.generation() + 1;
        *current = Arc::new(ReferenceSnapshot::from_dataset(dataset, generation));
        info!("Published reference data generation {}", generation);
        Ok(generation)
    }
}

impl ReferenceStore for InMemoryReferenceStore {
    fn snapshot(&self) -> Result<Arc<ReferenceSnapshot>, ImpactError> {
        let current = self
            .current
            .read()
            .map_err(|_| ImpactError::Store("reference store lock poisoned".to_string()))?;
        Ok(Arc::clone(&current))
    }
}
