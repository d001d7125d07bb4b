//! Numeric core: resolved factors in, impact figures out.
//!
//! Every dimension (CO2, water, energy) follows the same steps:
//!
//! 1. `base = Σ share × base_per_kg`
//! 2. `mult = Σ share × Σ_stage multiplier`
//! 3. `embodied_per_kg = base × (1 + mult)`
//! 4. `weight_kg` from the override or the clothing type's typical weight
//! 5. `embodied = embodied_per_kg × weight_kg`
//! 6. `avoided = embodied × replacement_factor`
//! 7. `net = avoided - reuse_overhead_co2` for CO2, `net = avoided` otherwise,
//!    floored at zero
//! 8. `km = net_co2 × km_per_kg_co2`, `trees = net_co2 / trees_annual_absorption`
//!
//! Only the per-material stage multipliers enter step 2. The global
//! multipliers a parameter set may carry are not applied.

use tracing::debug;

use crate::error::ImpactError;
use crate::reference::{ProcessingStage, TREES_ANNUAL_ABSORPTION};

use super::types::{ImpactFigures, ImpactVector, ResolvedFactorBundle, StageBreakdown};

/// Compute the impact figures for a resolved bundle.
///
/// Fails with `Validation` when an override weight lies outside the
/// clothing type's range and with `Computation` when the tree absorption
/// constant is not positive or a result is not finite.
pub fn calculate(bundle: &ResolvedFactorBundle) -> Result<ImpactFigures, ImpactError> {
    let profile = &bundle.clothing_type;
    let (weight_grams, weight_is_override) = match bundle.override_weight_grams {
        Some(grams) => {
            let in_range = u32::try_from(grams)
                .ok()
                .filter(|g| profile.weight_in_range(*g));
            match in_range {
                Some(g) => (g, true),
                None => {
                    return Err(ImpactError::validation(
                        "override_weight_grams",
                        format!(
                            "{}g is outside the {} range ({}-{}g)",
                            grams,
                            profile.label,
                            profile.weight_range_min,
                            profile.weight_range_max
                        ),
                    ));
                }
            }
        }
        None => (profile.typical_weight_grams, false),
    };
    let weight_kg = f64::from(weight_grams) / 1000.0;

    let base_per_kg: ImpactVector = bundle
        .materials
        .iter()
        .map(|m| ImpactVector::per_kg(&m.factor).scale(m.fraction()))
        .sum();

    let stage_multiplier = |stage: ProcessingStage| -> f64 {
        bundle
            .materials
            .iter()
            .map(|m| m.fraction() * m.factor.multipliers.get(stage))
            .sum()
    };
    let processing_multiplier: f64 = ProcessingStage::ALL
        .iter()
        .map(|s| stage_multiplier(*s))
        .sum();

    let embodied = base_per_kg.scale(1.0 + processing_multiplier).scale(weight_kg);
    let avoided = embodied.scale(bundle.parameters.replacement_factor);

    let raw_net = ImpactVector {
        co2_kg: avoided.co2_kg - bundle.parameters.reuse_overhead_co2,
        ..avoided
    };
    let below_overhead_threshold =
        raw_net.co2_kg < 0.0 || raw_net.water_liters < 0.0 || raw_net.energy_mj < 0.0;
    let net = raw_net.map(|v| v.max(0.0));
    if below_overhead_threshold {
        debug!(
            "Net CO2 {:.4} kg below reuse overhead, reporting zero",
            raw_net.co2_kg
        );
    }

    let absorption = bundle.parameters.trees_annual_absorption;
    if !absorption.is_finite() || absorption <= 0.0 {
        return Err(ImpactError::Computation(format!(
            "{} must be positive, got {}",
            TREES_ANNUAL_ABSORPTION, absorption
        )));
    }
    let km_equivalent = net.co2_kg * bundle.parameters.km_per_kg_co2;
    let trees_equivalent = net.co2_kg / absorption;

    let raw_material = base_per_kg.scale(weight_kg);
    let stage = |s: ProcessingStage| raw_material.scale(stage_multiplier(s));
    let stages = StageBreakdown {
        raw_material,
        spinning: stage(ProcessingStage::Spinning),
        weaving: stage(ProcessingStage::Weaving),
        dyeing: stage(ProcessingStage::Dyeing),
        finishing: stage(ProcessingStage::Finishing),
    };

    let impact_reduction_pct = if embodied.co2_kg > 0.0 {
        net.co2_kg / embodied.co2_kg * 100.0
    } else {
        0.0
    };

    let figures = ImpactFigures {
        weight_grams,
        weight_is_override,
        base_per_kg,
        processing_multiplier,
        embodied,
        avoided,
        net,
        below_overhead_threshold,
        stages,
        km_equivalent,
        trees_equivalent,
        impact_reduction_pct,
    };
    check_finite(&figures)?;
    Ok(figures)
}

fn check_finite(figures: &ImpactFigures) -> Result<(), ImpactError> {
    let values = [
        ("embodied co2", figures.embodied.co2_kg),
        ("embodied water", figures.embodied.water_liters),
        ("embodied energy", figures.embodied.energy_mj),
        ("net co2", figures.net.co2_kg),
        ("net water", figures.net.water_liters),
        ("net energy", figures.net.energy_mj),
        ("km equivalent", figures.km_equivalent),
        ("trees equivalent", figures.trees_equivalent),
    ];
    match values.iter().find(|(_, v)| !v.is_finite()) {
        Some((name, value)) => Err(ImpactError::Computation(format!(
            "{} is not finite ({})",
            name, value
        ))),
        None => Ok(()),
    }
}
