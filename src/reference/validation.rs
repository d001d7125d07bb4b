use std::collections::HashSet;

use serde::Serialize;

use super::dataset::ReferenceDataset;
use super::types::{MaterialImpactFactor, TREES_ANNUAL_ABSORPTION, REQUIRED_PARAMETERS};
use super::{normalize_brand_name, normalize_key};

/// Categories a material may belong to.
const KNOWN_CATEGORIES: [&str; 5] = ["natural", "synthetic", "cellulosic", "animal", "blend"];

/// Typical CO2 band for textile fibres in kg CO2 per kg.
const TYPICAL_CO2_RANGE: (f64, f64) = (0.1, 50.0);

/// A problem found in a reference dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataWarning {
    pub field: String,
    pub message: String,
    pub value: String,
}

impl DataWarning {
    fn new(field: impl Into<String>, message: impl Into<String>, value: impl ToString) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: value.to_string(),
        }
    }
}

/// Check a reference dataset for values the engine would misuse.
/// Returns one warning per problem; an empty list means the data is clean.
pub fn validate_dataset(dataset: &ReferenceDataset) -> Vec<DataWarning> {
    let mut warnings = Vec::new();

    match &dataset.default_material {
        Some(default) => check_material(default, "default_material", &mut warnings),
        None => warnings.push(DataWarning::new(
            "default_material",
            "No global default material; unknown materials of unknown category will fail",
            "",
        )),
    }

    let mut seen = HashSet::new();
    for material in &dataset.materials {
        let field = format!("materials.{}", material.name);
        if !seen.insert(normalize_key(&material.name)) {
            warnings.push(DataWarning::new(&field, "Duplicate material name", &material.name));
        }
        check_material(material, &field, &mut warnings);
    }

    for (name, category) in &dataset.category_hints {
        if !KNOWN_CATEGORIES.contains(&normalize_key(category).as_str()) {
            warnings.push(DataWarning::new(
                format!("category_hints.{}", name),
                format!("Unknown category, expected one of {:?}", KNOWN_CATEGORIES),
                category,
            ));
        }
    }

    let mut seen = HashSet::new();
    for profile in &dataset.clothing_types {
        let field = format!("clothing_types.{}", profile.label);
        if !seen.insert(normalize_key(&profile.label)) {
            warnings.push(DataWarning::new(&field, "Duplicate clothing type", &profile.label));
        }
        if profile.weight_range_min > profile.typical_weight_grams
            || profile.typical_weight_grams > profile.weight_range_max
        {
            warnings.push(DataWarning::new(
                &field,
                format!(
                    "Typical weight outside range ({}-{}g)",
                    profile.weight_range_min, profile.weight_range_max
                ),
                profile.typical_weight_grams,
            ));
        }
        if profile.typical_weight_grams == 0 {
            warnings.push(DataWarning::new(&field, "Typical weight must be positive", 0));
        }
        if !(profile.wash_frequency > 0.0 && profile.wash_frequency <= 1.0) {
            warnings.push(DataWarning::new(
                &field,
                "Wash frequency must be in (0, 1]",
                profile.wash_frequency,
            ));
        }
    }

    if let Some(active) = &dataset.active_parameter_set {
        let defined = dataset
            .parameter_sets
            .iter()
            .any(|s| s.version.trim() == active.trim());
        if !defined {
            warnings.push(DataWarning::new(
                "active_parameter_set",
                "Active parameter set is not defined",
                active,
            ));
        }
    }
    if dataset.parameter_sets.is_empty() {
        warnings.push(DataWarning::new("parameter_sets", "No parameter sets defined", ""));
    }

    for set in &dataset.parameter_sets {
        for name in REQUIRED_PARAMETERS {
            if !set.parameters.iter().any(|p| p.name.trim() == name) {
                warnings.push(DataWarning::new(
                    format!("parameter_sets.{}", set.version),
                    format!("Missing required parameter '{}'", name),
                    "",
                ));
            }
        }
        for param in &set.parameters {
            let field = format!("parameter_sets.{}.{}", set.version, param.name);
            if !param.value.is_finite() {
                warnings.push(DataWarning::new(&field, "Value must be finite", param.value));
            } else if param.name == TREES_ANNUAL_ABSORPTION && param.value <= 0.0 {
                warnings.push(DataWarning::new(&field, "Absorption must be positive", param.value));
            } else if param.name == "replacement_factor" && !(0.0..=1.0).contains(&param.value) {
                warnings.push(DataWarning::new(&field, "Must be between 0 and 1", param.value));
            } else if param.value < 0.0 {
                warnings.push(DataWarning::new(&field, "Value cannot be negative", param.value));
            }
        }
    }

    let mut seen = HashSet::new();
    for brand in &dataset.brands {
        let field = format!("brands.{}", brand.name);
        if !seen.insert(normalize_brand_name(&brand.name)) {
            warnings.push(DataWarning::new(&field, "Duplicate brand name", &brand.name));
        }
        if let Some(score) = brand.transparency_score {
            if score > 100 {
                warnings.push(DataWarning::new(
                    &field,
                    "Transparency score out of range (0-100)",
                    score,
                ));
            }
        }
    }

    warnings
}

fn check_material(material: &MaterialImpactFactor, field: &str, warnings: &mut Vec<DataWarning>) {
    if !KNOWN_CATEGORIES.contains(&normalize_key(&material.category).as_str()) {
        warnings.push(DataWarning::new(
            field,
            format!("Unknown category, expected one of {:?}", KNOWN_CATEGORIES),
            &material.category,
        ));
    }

    let bases = [
        ("co2_per_kg", material.co2_per_kg),
        ("water_liters_per_kg", material.water_liters_per_kg),
        ("energy_mj_per_kg", material.energy_mj_per_kg),
    ];
    for (name, value) in bases {
        if !value.is_finite() || value < 0.0 {
            warnings.push(DataWarning::new(
                format!("{}.{}", field, name),
                "Must be a non-negative number",
                value,
            ));
        }
    }

    let (low, high) = TYPICAL_CO2_RANGE;
    if material.co2_per_kg.is_finite() && !(low..=high).contains(&material.co2_per_kg) {
        warnings.push(DataWarning::new(
            format!("{}.co2_per_kg", field),
            format!("Unusual value (typical range {}-{})", low, high),
            material.co2_per_kg,
        ));
    }

    let m = &material.multipliers;
    for (name, value) in [
        ("spinning", m.spinning),
        ("weaving", m.weaving),
        ("dyeing", m.dyeing),
        ("finishing", m.finishing),
    ] {
        if !value.is_finite() || value < 0.0 {
            warnings.push(DataWarning::new(
                format!("{}.multipliers.{}", field, name),
                "Stage multiplier must be non-negative",
                value,
            ));
        }
    }
}
