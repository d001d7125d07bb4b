//! Engine configuration loaded from TOML.
//!
//! Every key is optional; a missing file yields the defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::reference::{
    default_dataset, load_dataset, InMemoryReferenceStore, ReferenceDataset, ReferenceStore,
    SqliteReferenceStore,
};

fn default_composition_tolerance() -> f64 {
    2.0
}

fn default_brand_stale_after_days() -> i64 {
    30
}

/// Upper bound for `brand_stale_after_days` (one hundred years).
pub const MAX_BRAND_STALE_AFTER_DAYS: i64 = 36_500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Allowed deviation of a composition total from 100, in percentage points
    #[serde(default = "default_composition_tolerance")]
    pub composition_tolerance: f64,
    /// Parameter set used when a request names none (else the store's active set)
    #[serde(default)]
    pub parameter_set_version: Option<String>,
    /// Brand records older than this many days are logged as stale
    #[serde(default = "default_brand_stale_after_days")]
    pub brand_stale_after_days: i64,
    /// TOML reference dataset (else the embedded default)
    #[serde(default)]
    pub reference_data: Option<PathBuf>,
    /// SQLite reference database; takes precedence over `reference_data`
    #[serde(default)]
    pub reference_db: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            composition_tolerance: default_composition_tolerance(),
            parameter_set_version: None,
            brand_stale_after_days: default_brand_stale_after_days(),
            reference_data: None,
            reference_db: None,
        }
    }
}

impl EngineConfig {
    /// Load a config file. Relative data paths resolve against the file's
    /// directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let mut config: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {:?}", path))?;

        if !config.composition_tolerance.is_finite() || config.composition_tolerance < 0.0 {
            anyhow::bail!(
                "composition_tolerance must be a non-negative number, got {}",
                config.composition_tolerance
            );
        }
        if !(0..=MAX_BRAND_STALE_AFTER_DAYS).contains(&config.brand_stale_after_days) {
            anyhow::bail!(
                "brand_stale_after_days must be between 0 and {}, got {}",
                MAX_BRAND_STALE_AFTER_DAYS,
                config.brand_stale_after_days
            );
        }

        if let Some(dir) = path.parent() {
            config.reference_data = config.reference_data.map(|p| dir.join(p));
            config.reference_db = config.reference_db.map(|p| dir.join(p));
        }
        debug!("Loaded engine config from {:?}", path);
        Ok(config)
    }

    /// Platform config location, e.g. `~/.config/swap-impact/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("swap-impact").join("config.toml"))
    }

    /// Load from [`default_path`](Self::default_path) when that file exists,
    /// otherwise use the defaults.
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Open the reference store this config points at.
    ///
    /// An empty SQLite database is seeded from `reference_data` (or the
    /// embedded dataset) before first use.
    pub fn open_store(&self) -> Result<Arc<dyn ReferenceStore>> {
        if let Some(db_path) = &self.reference_db {
            let store = SqliteReferenceStore::new(db_path)
                .with_context(|| format!("Failed to open reference database {:?}", db_path))?;
            if store.snapshot()?.generation() == 0 {
                let dataset = self.dataset()?;
                let generation = store.import_dataset(&dataset)?;
                info!(
                    "Seeded empty reference database {:?} (generation {})",
                    db_path, generation
                );
            }
            return Ok(Arc::new(store));
        }

        Ok(Arc::new(InMemoryReferenceStore::new(self.dataset()?)))
    }

    fn dataset(&self) -> Result<ReferenceDataset> {
        match &self.reference_data {
            Some(path) => load_dataset(path),
            None => Ok(default_dataset()),
        }
    }
}
