//! TOML reference dataset loading.
//!
//! Provides two loading methods:
//! - `default_dataset()` - Loads the dataset compiled into the binary
//! - `load_dataset(path)` - Loads a dataset from a file path

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::types::{
    BrandSustainabilityProfile, CalculationParameter, ClothingTypeProfile, MaterialImpactFactor,
};

/// Default reference data embedded at compile time.
const DEFAULT_DATASET: &str = include_str!("../../data/reference.toml");

/// A parameter set as written in the dataset file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSetRecord {
    pub version: String,
    pub parameters: Vec<CalculationParameter>,
}

/// Root of a reference dataset file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceDataset {
    /// Factor used when neither the material nor its category is known
    #[serde(default)]
    pub default_material: Option<MaterialImpactFactor>,
    #[serde(default)]
    pub materials: Vec<MaterialImpactFactor>,
    /// Material name (or family prefix) to category
    #[serde(default)]
    pub category_hints: BTreeMap<String, String>,
    #[serde(default)]
    pub clothing_types: Vec<ClothingTypeProfile>,
    /// Version used when a request names none; falls back to the highest version
    #[serde(default)]
    pub active_parameter_set: Option<String>,
    #[serde(default)]
    pub parameter_sets: Vec<ParameterSetRecord>,
    #[serde(default)]
    pub brands: Vec<BrandSustainabilityProfile>,
}

/// Load a reference dataset from a TOML file.
pub fn load_dataset(path: &Path) -> Result<ReferenceDataset> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read reference dataset {:?}", path))?;
    let dataset: ReferenceDataset = toml::from_str(&content)
        .with_context(|| format!("Failed to parse reference dataset {:?}", path))?;
    Ok(dataset)
}

/// Get the reference dataset embedded in the binary.
///
/// # Panics
/// Panics if the embedded TOML is invalid (this would be a compile-time bug).
pub fn default_dataset() -> ReferenceDataset {
    toml::from_str(DEFAULT_DATASET).expect("embedded reference.toml must be valid TOML")
}
