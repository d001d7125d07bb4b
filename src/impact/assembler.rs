use std::cmp::Ordering;

use super::types::{
    ImpactEstimate, ImpactFigures, ImpactVector, LifecycleAssumptions, MaterialBreakdown,
    ResolvedFactorBundle, Uncertainty, CALCULATION_VERSION,
};

const MJ_PER_KWH: f64 = 3.6;
/// Litres of drinking water per person per day.
const DRINKING_WATER_LITERS_PER_DAY: f64 = 2.0;
const SMARTPHONE_CHARGES_PER_KWH: f64 = 125.0;

/// Package the calculator's figures with the breakdown and quality metadata.
pub fn assemble(bundle: &ResolvedFactorBundle, figures: ImpactFigures) -> ImpactEstimate {
    let breakdown: Vec<MaterialBreakdown> = bundle
        .materials
        .iter()
        .map(|m| {
            let base_per_kg = ImpactVector::per_kg(&m.factor);
            let processing_multiplier = m.factor.multipliers.total();
            MaterialBreakdown {
                material: m.material.clone(),
                resolved_as: m.factor.name.clone(),
                source: m.source.clone(),
                quality: m.quality,
                percentage: m.percentage,
                base_per_kg,
                processing_multiplier,
                weighted_base_per_kg: base_per_kg.scale(m.fraction()),
                weighted_multiplier: processing_multiplier * m.fraction(),
            }
        })
        .collect();

    // Highest share wins; ties go to the alphabetically first name
    let primary_material = bundle
        .materials
        .iter()
        .max_by(|a, b| {
            a.percentage
                .partial_cmp(&b.percentage)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.material.cmp(&a.material))
        })
        .map(|m| m.material.clone())
        .unwrap_or_default();

    let profile = &bundle.clothing_type;
    let lifecycle = LifecycleAssumptions {
        assumed_wears: profile.typical_wears,
        assumed_washes: (f64::from(profile.typical_wears) * profile.wash_frequency).round() as u32,
    };

    let energy_kwh_avoided = figures.net.energy_mj / MJ_PER_KWH;

    ImpactEstimate {
        co2_kg_avoided: figures.net.co2_kg,
        water_l_avoided: figures.net.water_liters,
        energy_mj_avoided: figures.net.energy_mj,
        energy_kwh_avoided,
        km_equivalent: figures.km_equivalent,
        trees_equivalent: figures.trees_equivalent,
        days_drinking_water: figures.net.water_liters / DRINKING_WATER_LITERS_PER_DAY,
        smartphone_charges: (energy_kwh_avoided * SMARTPHONE_CHARGES_PER_KWH).floor() as u64,
        below_overhead_threshold: figures.below_overhead_threshold,
        data_quality: bundle.quality,
        uncertainty: Uncertainty::for_quality(bundle.quality),
        embodied: figures.embodied,
        gross_avoided: figures.avoided,
        impact_reduction_pct: figures.impact_reduction_pct,
        breakdown,
        stage_breakdown: figures.stages,
        primary_material,
        clothing_type: profile.label.clone(),
        weight_grams: figures.weight_grams,
        weight_is_override: figures.weight_is_override,
        lifecycle,
        brand: bundle.brand.clone(),
        parameter_set_version: bundle.parameters.version.clone(),
        snapshot_generation: bundle.snapshot_generation,
        calculation_version: CALCULATION_VERSION.to_string(),
    }
}
