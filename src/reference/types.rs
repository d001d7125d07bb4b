//! Record types held by the reference data store.
//!
//! These types deserialize from the TOML reference dataset and serialize
//! to JSON for CLI output. All of them are read-only from the engine's
//! point of view.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

// =============================================================================
// DATA QUALITY
// =============================================================================

/// Confidence tier attached to reference records and to estimates.
///
/// Ordered so that `Low < Medium < High`; the worst tier of a set of inputs
/// is therefore their minimum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Low,
    Medium,
    High,
}

impl DataQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataQuality::Low => "low",
            DataQuality::Medium => "medium",
            DataQuality::High => "high",
        }
    }

    /// The worse of two tiers.
    pub fn worst(self, other: DataQuality) -> DataQuality {
        self.min(other)
    }

    /// Cap this tier at `ceiling` (used when a fallback answered a lookup).
    pub fn capped_at(self, ceiling: DataQuality) -> DataQuality {
        self.min(ceiling)
    }
}

impl fmt::Display for DataQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(DataQuality::High),
            "medium" => Ok(DataQuality::Medium),
            "low" => Ok(DataQuality::Low),
            other => Err(format!("unknown data quality tier '{}'", other)),
        }
    }
}

// =============================================================================
// MATERIALS
// =============================================================================

/// Manufacturing stages with a per-material impact multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStage {
    Spinning,
    Weaving,
    Dyeing,
    Finishing,
}

impl ProcessingStage {
    pub const ALL: [ProcessingStage; 4] = [
        ProcessingStage::Spinning,
        ProcessingStage::Weaving,
        ProcessingStage::Dyeing,
        ProcessingStage::Finishing,
    ];
}

/// Fractions applied additively to a material's base impact, one per stage.
/// A stage missing from the source data counts as `0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageMultipliers {
    #[serde(default)]
    pub spinning: f64,
    #[serde(default)]
    pub weaving: f64,
    #[serde(default)]
    pub dyeing: f64,
    #[serde(default)]
    pub finishing: f64,
}

impl StageMultipliers {
    pub fn get(&self, stage: ProcessingStage) -> f64 {
        match stage {
            ProcessingStage::Spinning => self.spinning,
            ProcessingStage::Weaving => self.weaving,
            ProcessingStage::Dyeing => self.dyeing,
            ProcessingStage::Finishing => self.finishing,
        }
    }

    /// Sum over all stages, in `ProcessingStage::ALL` order.
    pub fn total(&self) -> f64 {
        ProcessingStage::ALL.iter().map(|s| self.get(*s)).sum()
    }
}

/// Lifecycle impact factors for one material, per kilogram of fibre.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialImpactFactor {
    /// Material name (e.g., "cotton_conventional")
    pub name: String,
    /// Category (natural, synthetic, cellulosic, ...)
    pub category: String,
    pub co2_per_kg: f64,
    #[serde(default)]
    pub water_liters_per_kg: f64,
    #[serde(default)]
    pub energy_mj_per_kg: f64,
    #[serde(default)]
    pub multipliers: StageMultipliers,
    pub data_quality: DataQuality,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub last_updated: Option<NaiveDate>,
}

// =============================================================================
// CLOTHING TYPES
// =============================================================================

fn default_typical_wears() -> u32 {
    50
}

fn default_wash_frequency() -> f64 {
    0.25
}

/// Physical and usage profile of a clothing type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClothingTypeProfile {
    /// Clothing type label (e.g., "t-shirt")
    pub label: String,
    pub category: String,
    pub typical_weight_grams: u32,
    pub weight_range_min: u32,
    pub weight_range_max: u32,
    /// Typical number of wears over the garment's lifetime
    #[serde(default = "default_typical_wears")]
    pub typical_wears: u32,
    /// Washes per wear (0-1)
    #[serde(default = "default_wash_frequency")]
    pub wash_frequency: f64,
}

impl ClothingTypeProfile {
    pub fn weight_in_range(&self, weight_grams: u32) -> bool {
        (self.weight_range_min..=self.weight_range_max).contains(&weight_grams)
    }
}

// =============================================================================
// CALCULATION PARAMETERS
// =============================================================================

/// Share of a new purchase avoided by one reuse (0-1).
pub const REPLACEMENT_FACTOR: &str = "replacement_factor";
/// Flat CO2 cost of enabling one swap (collection, sorting, transport, platform).
pub const REUSE_OVERHEAD_CO2: &str = "reuse_overhead_co2";
/// Kilometres driven per kilogram of CO2.
pub const KM_PER_KG_CO2: &str = "km_per_kg_co2";
/// Kilograms of CO2 one tree absorbs per year.
pub const TREES_ANNUAL_ABSORPTION: &str = "trees_annual_absorption";

/// Parameters every calculation must resolve.
pub const REQUIRED_PARAMETERS: [&str; 4] = [
    REPLACEMENT_FACTOR,
    REUSE_OVERHEAD_CO2,
    KM_PER_KG_CO2,
    TREES_ANNUAL_ABSORPTION,
];

/// A single named calculation constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationParameter {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
}

/// A versioned set of calculation constants, keyed by parameter name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationParameterSet {
    pub version: String,
    pub parameters: BTreeMap<String, CalculationParameter>,
}

impl CalculationParameterSet {
    pub fn new(version: impl Into<String>, parameters: Vec<CalculationParameter>) -> Self {
        Self {
            version: version.into(),
            parameters: parameters
                .into_iter()
                .map(|p| (p.name.trim().to_string(), p))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CalculationParameter> {
        self.parameters.get(name)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).map(|p| p.value)
    }
}

// =============================================================================
// BRANDS
// =============================================================================

/// Brand transparency signals. Only ever used to annotate an estimate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BrandSustainabilityProfile {
    pub name: String,
    /// Transparency index score (0-100)
    #[serde(default)]
    pub transparency_score: Option<u8>,
    #[serde(default)]
    pub transparency_year: Option<i32>,
    #[serde(default)]
    pub publishes_supplier_list: bool,
    #[serde(default)]
    pub discloses_ghg_emissions: bool,
    #[serde(default)]
    pub discloses_water_usage: bool,
    #[serde(default)]
    pub discloses_waste_data: bool,
    #[serde(default)]
    pub has_living_wage_commitment: bool,
    #[serde(default)]
    pub has_climate_targets: bool,
    #[serde(default)]
    pub last_updated: Option<NaiveDate>,
}

impl BrandSustainabilityProfile {
    /// Number of disclosure/commitment flags that are set.
    pub fn disclosure_count(&self) -> usize {
        [
            self.publishes_supplier_list,
            self.discloses_ghg_emissions,
            self.discloses_water_usage,
            self.discloses_waste_data,
            self.has_living_wage_commitment,
            self.has_climate_targets,
        ]
        .iter()
        .filter(|flag| **flag)
        .count()
    }

    /// True when the record has no update date or is older than `ttl_days`.
    /// A window too large for `TimeDelta` never expires.
    pub fn is_data_stale(&self, today: NaiveDate, ttl_days: i64) -> bool {
        match (self.last_updated, TimeDelta::try_days(ttl_days)) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(updated), Some(ttl)) => today - updated > ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_ordering() {
        assert!(DataQuality::Low < DataQuality::Medium);
        assert!(DataQuality::Medium < DataQuality::High);
        assert_eq!(DataQuality::High.worst(DataQuality::Low), DataQuality::Low);
        assert_eq!(
            DataQuality::High.capped_at(DataQuality::Medium),
            DataQuality::Medium
        );
        assert_eq!(
            DataQuality::Low.capped_at(DataQuality::Medium),
            DataQuality::Low
        );
    }

    #[test]
    fn test_quality_parse() {
        assert_eq!(" High ".parse::<DataQuality>(), Ok(DataQuality::High));
        assert!("excellent".parse::<DataQuality>().is_err());
    }

    #[test]
    fn test_missing_stage_multiplier_defaults_to_zero() {
        let toml = r#"
            name = "hemp"
            category = "natural"
            co2_per_kg = 2.1
            data_quality = "medium"
            multipliers = { spinning = 0.05, dyeing = 0.2 }
        "#;
        let material: MaterialImpactFactor = toml::from_str(toml).unwrap();
        assert_eq!(material.multipliers.weaving, 0.0);
        assert_eq!(material.multipliers.finishing, 0.0);
        assert!((material.multipliers.total() - 0.25).abs() < 1e-12);
        assert_eq!(material.water_liters_per_kg, 0.0);
    }

    #[test]
    fn test_weight_in_range_is_inclusive() {
        let profile = ClothingTypeProfile {
            label: "t-shirt".to_string(),
            category: "tops".to_string(),
            typical_weight_grams: 175,
            weight_range_min: 120,
            weight_range_max: 250,
            typical_wears: 50,
            wash_frequency: 1.0,
        };
        assert!(profile.weight_in_range(120));
        assert!(profile.weight_in_range(250));
        assert!(!profile.weight_in_range(119));
        assert!(!profile.weight_in_range(251));
    }

    #[test]
    fn test_brand_staleness() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let mut brand = BrandSustainabilityProfile {
            name: "Acme".to_string(),
            last_updated: NaiveDate::from_ymd_opt(2025, 2, 20),
            ..Default::default()
        };
        assert!(!brand.is_data_stale(today, 30));

        brand.last_updated = NaiveDate::from_ymd_opt(2024, 12, 1);
        assert!(brand.is_data_stale(today, 30));

        brand.last_updated = None;
        assert!(brand.is_data_stale(today, 30));
    }

    #[test]
    fn test_brand_staleness_window_beyond_time_range() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let brand = BrandSustainabilityProfile {
            name: "Acme".to_string(),
            last_updated: NaiveDate::from_ymd_opt(1990, 1, 1),
            ..Default::default()
        };
        assert!(!brand.is_data_stale(today, i64::MAX));
        assert!(brand.is_data_stale(today, 3650));
    }

    #[test]
    fn test_disclosure_count() {
        let brand = BrandSustainabilityProfile {
            name: "Acme".to_string(),
            publishes_supplier_list: true,
            has_climate_targets: true,
            ..Default::default()
        };
        assert_eq!(brand.disclosure_count(), 2);
    }
}
