//! Type definitions for the impact engine.
//!
//! Requests deserialize from JSON (the CRUD layer's wire format); estimates
//! serialize back to JSON. Intermediate types (resolved factors, figures)
//! are plain data passed between the engine's stages.

use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::reference::{ClothingTypeProfile, DataQuality, MaterialImpactFactor};

/// Version tag stamped on every estimate.
pub const CALCULATION_VERSION: &str = "1.0";

// =============================================================================
// INPUT TYPES
// =============================================================================

/// Material name to percentage by mass.
pub type GarmentComposition = BTreeMap<String, f64>;

/// A request to estimate the impact avoided by swapping one garment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactRequest {
    /// Registered clothing type label (e.g., "t-shirt")
    pub clothing_type: String,
    pub composition: GarmentComposition,
    /// Measured weight; must lie within the clothing type's weight range.
    /// Signed so that a negative weight is reported as a validation error.
    #[serde(default)]
    pub override_weight_grams: Option<i64>,
    #[serde(default)]
    pub brand_name: Option<String>,
    /// Parameter set to calculate with (defaults to the configured/active set)
    #[serde(default)]
    pub parameter_set_version: Option<String>,
}

impl ImpactRequest {
    pub fn new(clothing_type: impl Into<String>, composition: GarmentComposition) -> Self {
        Self {
            clothing_type: clothing_type.into(),
            composition,
            override_weight_grams: None,
            brand_name: None,
            parameter_set_version: None,
        }
    }
}

/// One entry of a validated composition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialShare {
    /// Normalized material name
    pub material: String,
    /// Share rescaled so that all shares sum to 100
    pub percentage: f64,
}

/// A composition that passed validation, ordered by material name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedComposition {
    pub shares: Vec<MaterialShare>,
    /// Sum of the percentages as submitted
    pub submitted_total: f64,
}

// =============================================================================
// IMPACT VECTOR
// =============================================================================

/// A value for each of the three impact dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactVector {
    pub co2_kg: f64,
    pub water_liters: f64,
    pub energy_mj: f64,
}

impl ImpactVector {
    pub fn new(co2_kg: f64, water_liters: f64, energy_mj: f64) -> Self {
        Self {
            co2_kg,
            water_liters,
            energy_mj,
        }
    }

    /// Base impact per kilogram of a material.
    pub fn per_kg(material: &MaterialImpactFactor) -> Self {
        Self::new(
            material.co2_per_kg,
            material.water_liters_per_kg,
            material.energy_mj_per_kg,
        )
    }

    pub fn scale(self, factor: f64) -> Self {
        self.map(|v| v * factor)
    }

    pub fn map(self, f: impl Fn(f64) -> f64) -> Self {
        Self::new(f(self.co2_kg), f(self.water_liters), f(self.energy_mj))
    }
}

impl Add for ImpactVector {
    type Output = ImpactVector;

    fn add(self, rhs: ImpactVector) -> ImpactVector {
        ImpactVector::new(
            self.co2_kg + rhs.co2_kg,
            self.water_liters + rhs.water_liters,
            self.energy_mj + rhs.energy_mj,
        )
    }
}

impl AddAssign for ImpactVector {
    fn add_assign(&mut self, rhs: ImpactVector) {
        *self = *self + rhs;
    }
}

impl Sum for ImpactVector {
    fn sum<I: Iterator<Item = ImpactVector>>(iter: I) -> Self {
        iter.fold(ImpactVector::default(), |acc, v| acc + v)
    }
}

// =============================================================================
// RESOLVED FACTORS
// =============================================================================

/// Which lookup strategy produced a material factor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FactorSource {
    Exact,
    CategoryAverage { category: String },
    GlobalDefault,
}

/// A composition entry together with the factor resolved for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMaterial {
    /// Normalized material name as requested
    pub material: String,
    pub percentage: f64,
    pub factor: MaterialImpactFactor,
    pub source: FactorSource,
    pub quality: DataQuality,
}

impl ResolvedMaterial {
    /// Mass fraction (0-1).
    pub fn fraction(&self) -> f64 {
        self.percentage / 100.0
    }
}

/// The required calculation constants, read from one parameter set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedParameters {
    pub version: String,
    pub replacement_factor: f64,
    pub reuse_overhead_co2: f64,
    pub km_per_kg_co2: f64,
    pub trees_annual_absorption: f64,
}

/// How far a brand's published data can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrandConfidence {
    Established,
    Partial,
    Limited,
    Unknown,
}

/// Annotation derived from a brand profile. Never alters the figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrandAssessment {
    pub brand_name: String,
    pub transparency_score: Option<u8>,
    pub disclosures: usize,
    pub confidence: BrandConfidence,
    pub note: String,
}

/// Everything the calculator needs, all read from one reference snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedFactorBundle {
    pub snapshot_generation: u64,
    pub materials: Vec<ResolvedMaterial>,
    pub clothing_type: ClothingTypeProfile,
    pub parameters: ResolvedParameters,
    pub override_weight_grams: Option<i64>,
    pub brand: Option<BrandAssessment>,
    /// Worst quality tier among the resolved materials
    pub quality: DataQuality,
}

// =============================================================================
// CALCULATED FIGURES
// =============================================================================

/// Embodied impact of one new garment split by manufacturing stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageBreakdown {
    pub raw_material: ImpactVector,
    pub spinning: ImpactVector,
    pub weaving: ImpactVector,
    pub dyeing: ImpactVector,
    pub finishing: ImpactVector,
}

impl StageBreakdown {
    pub fn total(&self) -> ImpactVector {
        [
            self.raw_material,
            self.spinning,
            self.weaving,
            self.dyeing,
            self.finishing,
        ]
        .into_iter()
        .sum()
    }
}

/// Output of the calculator, before assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactFigures {
    pub weight_grams: u32,
    pub weight_is_override: bool,
    pub base_per_kg: ImpactVector,
    pub processing_multiplier: f64,
    pub embodied: ImpactVector,
    pub avoided: ImpactVector,
    /// Avoided minus overhead, floored at zero
    pub net: ImpactVector,
    pub below_overhead_threshold: bool,
    pub stages: StageBreakdown,
    pub km_equivalent: f64,
    pub trees_equivalent: f64,
    pub impact_reduction_pct: f64,
}

// =============================================================================
// OUTPUT TYPES
// =============================================================================

/// Per-material contribution to the weighted factors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialBreakdown {
    pub material: String,
    /// Name of the factor actually used (differs from `material` on fallback)
    pub resolved_as: String,
    pub source: FactorSource,
    pub quality: DataQuality,
    pub percentage: f64,
    pub base_per_kg: ImpactVector,
    /// Sum of the material's stage multipliers
    pub processing_multiplier: f64,
    /// `percentage / 100 * base_per_kg`
    pub weighted_base_per_kg: ImpactVector,
    /// `percentage / 100 * processing_multiplier`
    pub weighted_multiplier: f64,
}

/// Uncertainty band implied by the quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Uncertainty {
    pub co2_pct: f64,
    pub water_pct: f64,
}

impl Uncertainty {
    pub fn for_quality(quality: DataQuality) -> Self {
        match quality {
            DataQuality::High => Self {
                co2_pct: 10.0,
                water_pct: 15.0,
            },
            DataQuality::Medium => Self {
                co2_pct: 25.0,
                water_pct: 30.0,
            },
            DataQuality::Low => Self {
                co2_pct: 40.0,
                water_pct: 50.0,
            },
        }
    }
}

/// Usage assumptions taken from the clothing type profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LifecycleAssumptions {
    pub assumed_wears: u32,
    pub assumed_washes: u32,
}

/// The final result for one garment.
///
/// All impact and equivalent fields are additive across estimates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactEstimate {
    pub co2_kg_avoided: f64,
    pub water_l_avoided: f64,
    pub energy_mj_avoided: f64,
    pub energy_kwh_avoided: f64,
    pub km_equivalent: f64,
    pub trees_equivalent: f64,
    pub days_drinking_water: f64,
    pub smartphone_charges: u64,
    pub below_overhead_threshold: bool,
    pub data_quality: DataQuality,
    pub uncertainty: Uncertainty,
    /// Embodied impact of one new garment
    pub embodied: ImpactVector,
    /// Avoided impact before overhead
    pub gross_avoided: ImpactVector,
    pub impact_reduction_pct: f64,
    pub breakdown: Vec<MaterialBreakdown>,
    pub stage_breakdown: StageBreakdown,
    pub primary_material: String,
    pub clothing_type: String,
    pub weight_grams: u32,
    pub weight_is_override: bool,
    pub lifecycle: LifecycleAssumptions,
    pub brand: Option<BrandAssessment>,
    pub parameter_set_version: String,
    pub snapshot_generation: u64,
    pub calculation_version: String,
}

/// Combined impact of the two garments exchanged in one swap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapImpact {
    pub first: ImpactEstimate,
    pub second: ImpactEstimate,
    pub total_avoided: ImpactVector,
    pub km_equivalent: f64,
    pub trees_equivalent: f64,
    pub data_quality: DataQuality,
}

impl SwapImpact {
    pub fn combine(first: ImpactEstimate, second: ImpactEstimate) -> Self {
        let avoided = |e: &ImpactEstimate| {
            ImpactVector::new(e.co2_kg_avoided, e.water_l_avoided, e.energy_mj_avoided)
        };
        Self {
            total_avoided: avoided(&first) + avoided(&second),
            km_equivalent: first.km_equivalent + second.km_equivalent,
            trees_equivalent: first.trees_equivalent + second.trees_equivalent,
            data_quality: first.data_quality.worst(second.data_quality),
            first,
            second,
        }
    }
}
