use std::collections::BTreeMap;

use super::dataset::ReferenceDataset;
use super::types::{
    BrandSustainabilityProfile, CalculationParameterSet, ClothingTypeProfile, DataQuality,
    MaterialImpactFactor, StageMultipliers,
};
use super::{normalize_brand_name, normalize_key};

/// An immutable, generation-tagged view of the reference data.
///
/// Keys are stored normalized; lookups normalize their argument the same
/// way. Maps are ordered so that any iteration (and therefore any derived
/// value such as a category average) is deterministic.
#[derive(Debug, Clone)]
pub struct ReferenceSnapshot {
    generation: u64,
    materials: BTreeMap<String, MaterialImpactFactor>,
    category_hints: BTreeMap<String, String>,
    default_material: Option<MaterialImpactFactor>,
    clothing_types: BTreeMap<String, ClothingTypeProfile>,
    parameter_sets: BTreeMap<String, CalculationParameterSet>,
    active_parameter_set: Option<String>,
    brands: BTreeMap<String, BrandSustainabilityProfile>,
}

impl ReferenceSnapshot {
    /// Build a snapshot from a dataset. Later records win over earlier
    /// records with the same normalized key.
    pub fn from_dataset(dataset: ReferenceDataset, generation: u64) -> Self {
        let materials = dataset
            .materials
            .into_iter()
            .map(|m| (normalize_key(&m.name), m))
            .collect();

        let category_hints = dataset
            .category_hints
            .into_iter()
            .map(|(name, category)| (normalize_key(&name), normalize_key(&category)))
            .collect();

        let clothing_types = dataset
            .clothing_types
            .into_iter()
            .map(|c| (normalize_key(&c.label), c))
            .collect();

        let parameter_sets = dataset
            .parameter_sets
            .into_iter()
            .map(|record| {
                let set = CalculationParameterSet::new(record.version.trim(), record.parameters);
                (set.version.clone(), set)
            })
            .collect();

        let brands = dataset
            .brands
            .into_iter()
            .map(|b| (normalize_brand_name(&b.name), b))
            .collect();

        Self {
            generation,
            materials,
            category_hints,
            default_material: dataset.default_material,
            clothing_types,
            parameter_sets,
            active_parameter_set: dataset.active_parameter_set.map(|v| v.trim().to_string()),
            brands,
        }
    }

    /// Generation tag of the store state this snapshot was taken from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// All known materials, ordered by normalized name.
    pub fn materials(&self) -> impl Iterator<Item = &MaterialImpactFactor> {
        self.materials.values()
    }

    pub fn get_material(&self, name: &str) -> Option<&MaterialImpactFactor> {
        self.materials.get(&normalize_key(name))
    }

    /// Infer the category of a material name.
    ///
    /// Tries, in order: a known material with that name, an explicit hint
    /// for the name, a hint for its family (text before the first `_`), and
    /// the category of a known material from the same family.
    pub fn category_of(&self, name: &str) -> Option<String> {
        let key = normalize_key(name);
        if let Some(material) = self.materials.get(&key) {
            return Some(normalize_key(&material.category));
        }
        if let Some(category) = self.category_hints.get(&key) {
            return Some(category.clone());
        }

        let family = key.split('_').next().unwrap_or(&key);
        if family.is_empty() {
            return None;
        }
        if let Some(category) = self.category_hints.get(family) {
            return Some(category.clone());
        }
        self.materials
            .iter()
            .find(|(known, _)| known.split('_').next() == Some(family))
            .map(|(_, material)| normalize_key(&material.category))
    }

    /// Average factor over all known materials of `category`.
    ///
    /// Base values and each stage multiplier are arithmetic means. The
    /// quality is the worst member tier, capped at `medium`. Returns `None`
    /// when no material belongs to the category.
    pub fn get_category_average(&self, category: &str) -> Option<MaterialImpactFactor> {
        let category = normalize_key(category);
        let members: Vec<&MaterialImpactFactor> = self
            .materials
            .values()
            .filter(|m| normalize_key(&m.category) == category)
            .collect();

        if members.is_empty() {
            return None;
        }

        let n = members.len() as f64;
        let mean = |f: fn(&MaterialImpactFactor) -> f64| {
            members.iter().map(|m| f(m)).sum::<f64>() / n
        };

        let quality = members
            .iter()
            .map(|m| m.data_quality)
            .fold(DataQuality::High, DataQuality::worst)
            .capped_at(DataQuality::Medium);

        Some(MaterialImpactFactor {
            name: format!("{}_average", category),
            category: category.clone(),
            co2_per_kg: mean(|m| m.co2_per_kg),
            water_liters_per_kg: mean(|m| m.water_liters_per_kg),
            energy_mj_per_kg: mean(|m| m.energy_mj_per_kg),
            multipliers: StageMultipliers {
                spinning: mean(|m| m.multipliers.spinning),
                weaving: mean(|m| m.multipliers.weaving),
                dyeing: mean(|m| m.multipliers.dyeing),
                finishing: mean(|m| m.multipliers.finishing),
            },
            data_quality: quality,
            source: format!("category average ({} over {} materials)", category, members.len()),
            last_updated: members.iter().filter_map(|m| m.last_updated).min(),
        })
    }

    pub fn get_global_default_material(&self) -> Option<&MaterialImpactFactor> {
        self.default_material.as_ref()
    }

    pub fn get_clothing_type(&self, label: &str) -> Option<&ClothingTypeProfile> {
        self.clothing_types.get(&normalize_key(label))
    }

    /// Look up a parameter set by version, or the active set when `version`
    /// is `None`. Without an explicit active set the highest version wins.
    pub fn get_parameter_set(&self, version: Option<&str>) -> Option<&CalculationParameterSet> {
        match version.map(str::trim) {
            Some(v) => self.parameter_sets.get(v),
            None => match &self.active_parameter_set {
                Some(active) => self.parameter_sets.get(active),
                None => self.parameter_sets.values().next_back(),
            },
        }
    }

    pub fn get_brand(&self, name: &str) -> Option<&BrandSustainabilityProfile> {
        self.brands.get(&normalize_brand_name(name))
    }
}
