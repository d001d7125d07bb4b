//! Reference lookups for one calculation.
//!
//! Materials resolve through an ordered chain of [`MaterialStrategy`]
//! implementations. The first strategy that answers wins, and the answer
//! carries the quality tier it earned. Clothing types and calculation
//! parameters have no fallback.

use tracing::{debug, warn};

use crate::error::ImpactError;
use crate::reference::{
    BrandSustainabilityProfile, CalculationParameterSet, DataQuality, MaterialImpactFactor,
    ReferenceSnapshot, KM_PER_KG_CO2, REPLACEMENT_FACTOR, REUSE_OVERHEAD_CO2,
    TREES_ANNUAL_ABSORPTION,
};

use super::types::{
    BrandAssessment, BrandConfidence, FactorSource, ImpactRequest, NormalizedComposition,
    ResolvedFactorBundle, ResolvedMaterial, ResolvedParameters,
};

/// A factor answered by one strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub factor: MaterialImpactFactor,
    pub source: FactorSource,
    pub quality: DataQuality,
}

/// One step of the material fallback chain.
pub trait MaterialStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Answer a lookup for `material`, or `Ok(None)` to defer to the next
    /// strategy.
    fn resolve(
        &self,
        snapshot: &ReferenceSnapshot,
        material: &str,
    ) -> Result<Option<Resolution>, ImpactError>;
}

/// The material itself is registered.
pub struct ExactMatch;

impl MaterialStrategy for ExactMatch {
    fn name(&self) -> &str {
        "exact"
    }

    fn resolve(
        &self,
        snapshot: &ReferenceSnapshot,
        material: &str,
    ) -> Result<Option<Resolution>, ImpactError> {
        Ok(snapshot.get_material(material).map(|factor| Resolution {
            quality: factor.data_quality,
            factor: factor.clone(),
            source: FactorSource::Exact,
        }))
    }
}

/// Average over the materials of the inferred category.
pub struct CategoryAverage;

impl MaterialStrategy for CategoryAverage {
    fn name(&self) -> &str {
        "category_average"
    }

    fn resolve(
        &self,
        snapshot: &ReferenceSnapshot,
        material: &str,
    ) -> Result<Option<Resolution>, ImpactError> {
        let Some(category) = snapshot.category_of(material) else {
            return Ok(None);
        };
        Ok(snapshot.get_category_average(&category).map(|factor| Resolution {
            quality: factor.data_quality.capped_at(DataQuality::Medium),
            factor,
            source: FactorSource::CategoryAverage { category },
        }))
    }
}

/// The store-wide default factor. Always answers; its absence is a
/// deployment defect.
pub struct GlobalDefault;

impl MaterialStrategy for GlobalDefault {
    fn name(&self) -> &str {
        "global_default"
    }

    fn resolve(
        &self,
        snapshot: &ReferenceSnapshot,
        material: &str,
    ) -> Result<Option<Resolution>, ImpactError> {
        let factor = snapshot.get_global_default_material().ok_or_else(|| {
            ImpactError::Configuration(format!(
                "no global default material to fall back to for '{}'",
                material
            ))
        })?;
        Ok(Some(Resolution {
            factor: factor.clone(),
            source: FactorSource::GlobalDefault,
            quality: DataQuality::Low,
        }))
    }
}

/// Resolves every reference a calculation needs from one snapshot.
pub struct FactorResolver {
    strategies: Vec<Box<dyn MaterialStrategy>>,
}

impl Default for FactorResolver {
    /// Exact match, then category average, then global default.
    fn default() -> Self {
        Self::with_strategies(vec![
            Box::new(ExactMatch),
            Box::new(CategoryAverage),
            Box::new(GlobalDefault),
        ])
    }
}

impl FactorResolver {
    pub fn with_strategies(strategies: Vec<Box<dyn MaterialStrategy>>) -> Self {
        Self { strategies }
    }

    /// Resolve materials, clothing type, parameters and brand.
    ///
    /// # Arguments
    /// * `snapshot` - The pinned reference view; every lookup goes through it
    /// * `composition` - Validated composition
    /// * `request` - The originating request (clothing type, weight, brand)
    /// * `parameter_set_version` - Set to use, or `None` for the store's active set
    pub fn resolve(
        &self,
        snapshot: &ReferenceSnapshot,
        composition: &NormalizedComposition,
        request: &ImpactRequest,
        parameter_set_version: Option<&str>,
    ) -> Result<ResolvedFactorBundle, ImpactError> {
        let clothing_type = snapshot
            .get_clothing_type(&request.clothing_type)
            .ok_or_else(|| ImpactError::not_found("clothing type", request.clothing_type.trim()))?
            .clone();

        let parameters = resolve_parameters(snapshot, parameter_set_version)?;

        let mut materials = Vec::with_capacity(composition.shares.len());
        for share in &composition.shares {
            let resolution = self.resolve_material(snapshot, &share.material)?;
            materials.push(ResolvedMaterial {
                material: share.material.clone(),
                percentage: share.percentage,
                factor: resolution.factor,
                source: resolution.source,
                quality: resolution.quality,
            });
        }

        let quality = aggregate_quality(&materials);

        let brand = request
            .brand_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| assess_brand(name, snapshot.get_brand(name)));

        Ok(ResolvedFactorBundle {
            snapshot_generation: snapshot.generation(),
            materials,
            clothing_type,
            parameters,
            override_weight_grams: request.override_weight_grams,
            brand,
            quality,
        })
    }

    fn resolve_material(
        &self,
        snapshot: &ReferenceSnapshot,
        material: &str,
    ) -> Result<Resolution, ImpactError> {
        for strategy in &self.strategies {
            if let Some(resolution) = strategy.resolve(snapshot, material)? {
                debug!(
                    "Material '{}' resolved by {} as '{}'",
                    material,
                    strategy.name(),
                    resolution.factor.name
                );
                if resolution.source != FactorSource::Exact {
                    warn!(
                        "No factor for material '{}', using {} ({}, quality {})",
                        material,
                        resolution.factor.name,
                        strategy.name(),
                        resolution.quality
                    );
                }
                return Ok(resolution);
            }
            debug!("Strategy {} had no answer for '{}'", strategy.name(), material);
        }
        Err(ImpactError::not_found("material", material))
    }
}

/// Worst tier across all materials. Any global-default substitution forces
/// `low` for the whole estimate.
fn aggregate_quality(materials: &[ResolvedMaterial]) -> DataQuality {
    if materials.iter().any(|m| m.source == FactorSource::GlobalDefault) {
        return DataQuality::Low;
    }
    materials
        .iter()
        .map(|m| m.quality)
        .fold(DataQuality::High, DataQuality::worst)
}

fn resolve_parameters(
    snapshot: &ReferenceSnapshot,
    version: Option<&str>,
) -> Result<ResolvedParameters, ImpactError> {
    let set = snapshot.get_parameter_set(version).ok_or_else(|| {
        ImpactError::Configuration(match version {
            Some(v) => format!("parameter set '{}' is not defined", v),
            None => "no calculation parameter set is defined".to_string(),
        })
    })?;
    debug!("Using parameter set {}", set.version);

    let replacement_factor = required(set, REPLACEMENT_FACTOR)?;
    if !(0.0..=1.0).contains(&replacement_factor) {
        return Err(ImpactError::Configuration(format!(
            "{} must be between 0 and 1, got {}",
            REPLACEMENT_FACTOR, replacement_factor
        )));
    }

    let reuse_overhead_co2 = required(set, REUSE_OVERHEAD_CO2)?;
    let km_per_kg_co2 = required(set, KM_PER_KG_CO2)?;
    for (name, value) in [
        (REUSE_OVERHEAD_CO2, reuse_overhead_co2),
        (KM_PER_KG_CO2, km_per_kg_co2),
    ] {
        if value < 0.0 {
            return Err(ImpactError::Configuration(format!(
                "{} cannot be negative, got {}",
                name, value
            )));
        }
    }

    Ok(ResolvedParameters {
        version: set.version.clone(),
        replacement_factor,
        reuse_overhead_co2,
        km_per_kg_co2,
        // Range checked by the calculator
        trees_annual_absorption: required(set, TREES_ANNUAL_ABSORPTION)?,
    })
}

fn required(set: &CalculationParameterSet, name: &str) -> Result<f64, ImpactError> {
    let value = set.value(name).ok_or_else(|| {
        ImpactError::Configuration(format!(
            "parameter '{}' missing from parameter set {}",
            name, set.version
        ))
    })?;
    if name != TREES_ANNUAL_ABSORPTION && !value.is_finite() {
        return Err(ImpactError::Configuration(format!(
            "parameter '{}' is not a finite number",
            name
        )));
    }
    Ok(value)
}

/// Classify how far a brand's published data can be trusted.
///
/// `established`: score of 60+ with GHG disclosure. `partial`: score of 30+
/// or at least three disclosure flags. `limited`: anything else on record.
/// `unknown`: the brand is not registered.
pub fn assess_brand(name: &str, profile: Option<&BrandSustainabilityProfile>) -> BrandAssessment {
    let Some(profile) = profile else {
        return BrandAssessment {
            brand_name: name.to_string(),
            transparency_score: None,
            disclosures: 0,
            confidence: BrandConfidence::Unknown,
            note: format!("No sustainability data on record for {}", name),
        };
    };

    let score = profile.transparency_score.unwrap_or(0);
    let disclosures = profile.disclosure_count();

    let (confidence, note) = if score >= 60 && profile.discloses_ghg_emissions {
        (
            BrandConfidence::Established,
            "Brand publishes detailed supply chain and emissions data",
        )
    } else if score >= 30 || disclosures >= 3 {
        (
            BrandConfidence::Partial,
            "Brand discloses some sustainability data; figures use material averages",
        )
    } else {
        (
            BrandConfidence::Limited,
            "Brand discloses little sustainability data; figures use material averages",
        )
    };

    BrandAssessment {
        brand_name: profile.name.clone(),
        transparency_score: profile.transparency_score,
        disclosures,
        confidence,
        note: note.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::composition::validate_composition;
    use crate::impact::types::GarmentComposition;
    use crate::reference::{default_dataset, ReferenceDataset};

    fn snapshot_of(dataset: ReferenceDataset) -> ReferenceSnapshot {
        ReferenceSnapshot::from_dataset(dataset, 7)
    }

    fn request(entries: &[(&str, f64)]) -> ImpactRequest {
        let composition: GarmentComposition = entries
            .iter()
            .map(|(name, pct)| (name.to_string(), *pct))
            .collect();
        ImpactRequest::new("t-shirt", composition)
    }

    fn resolve(
        snapshot: &ReferenceSnapshot,
        request: &ImpactRequest,
    ) -> Result<ResolvedFactorBundle, ImpactError> {
        let composition = validate_composition(&request.composition, 2.0)?;
        FactorResolver::default().resolve(snapshot, &composition, request, None)
    }

    #[test]
    fn test_exact_match_keeps_quality() {
        let snap = snapshot_of(default_dataset());
        let bundle = resolve(&snap, &request(&[("cotton_conventional", 100.0)])).unwrap();

        assert_eq!(bundle.snapshot_generation, 7);
        assert_eq!(bundle.materials.len(), 1);
        assert_eq!(bundle.materials[0].source, FactorSource::Exact);
        assert_eq!(bundle.quality, DataQuality::High);
        assert_eq!(bundle.clothing_type.typical_weight_grams, 175);
        assert_eq!(bundle.parameters.version, "2024.1");
        assert_eq!(bundle.parameters.replacement_factor, 0.70);
    }

    #[test]
    fn test_unknown_material_in_known_family_uses_category_average() {
        let snap = snapshot_of(default_dataset());
        let bundle = resolve(&snap, &request(&[("cotton_pima", 100.0)])).unwrap();

        let resolved = &bundle.materials[0];
        assert_eq!(
            resolved.source,
            FactorSource::CategoryAverage {
                category: "natural".to_string()
            }
        );
        assert_eq!(resolved.factor.name, "natural_average");
        assert!(bundle.quality <= DataQuality::Medium);
    }

    #[test]
    fn test_unknown_category_uses_global_default() {
        let snap = snapshot_of(default_dataset());
        let bundle = resolve(
            &snap,
            &request(&[("cotton_conventional", 90.0), ("kevlar", 10.0)]),
        )
        .unwrap();

        let kevlar = bundle
            .materials
            .iter()
            .find(|m| m.material == "kevlar")
            .unwrap();
        assert_eq!(kevlar.source, FactorSource::GlobalDefault);
        assert_eq!(kevlar.quality, DataQuality::Low);
        assert_eq!(bundle.quality, DataQuality::Low);
    }

    #[test]
    fn test_missing_global_default_is_configuration_error() {
        let mut dataset = default_dataset();
        dataset.default_material = None;
        let snap = snapshot_of(dataset);

        let err = resolve(&snap, &request(&[("kevlar", 100.0)])).unwrap_err();
        assert!(matches!(err, ImpactError::Configuration(_)), "got {:?}", err);
    }

    #[test]
    fn test_chain_without_default_reports_not_found() {
        let snap = snapshot_of(default_dataset());
        let resolver =
            FactorResolver::with_strategies(vec![Box::new(ExactMatch), Box::new(CategoryAverage)]);
        let req = request(&[("kevlar", 100.0)]);
        let composition = validate_composition(&req.composition, 2.0).unwrap();

        let err = resolver.resolve(&snap, &composition, &req, None).unwrap_err();
        assert_eq!(err, ImpactError::not_found("material", "kevlar"));
    }

    #[test]
    fn test_unknown_clothing_type_not_found() {
        let snap = snapshot_of(default_dataset());
        let mut req = request(&[("cotton_conventional", 100.0)]);
        req.clothing_type = "ballgown".to_string();

        let err = resolve(&snap, &req).unwrap_err();
        assert_eq!(err, ImpactError::not_found("clothing type", "ballgown"));
    }

    #[test]
    fn test_missing_parameter_is_configuration_error() {
        let mut dataset = default_dataset();
        dataset.parameter_sets[0]
            .parameters
            .retain(|p| p.name != REUSE_OVERHEAD_CO2);
        let snap = snapshot_of(dataset);

        let err = resolve(&snap, &request(&[("cotton_conventional", 100.0)])).unwrap_err();
        match err {
            ImpactError::Configuration(msg) => assert!(msg.contains(REUSE_OVERHEAD_CO2)),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_parameter_set_is_configuration_error() {
        let snap = snapshot_of(default_dataset());
        let req = request(&[("cotton_conventional", 100.0)]);
        let composition = validate_composition(&req.composition, 2.0).unwrap();

        let err = FactorResolver::default()
            .resolve(&snap, &composition, &req, Some("1999.1"))
            .unwrap_err();
        assert!(matches!(err, ImpactError::Configuration(_)));
    }

    #[test]
    fn test_replacement_factor_out_of_range() {
        let mut dataset = default_dataset();
        for p in &mut dataset.parameter_sets[0].parameters {
            if p.name == REPLACEMENT_FACTOR {
                p.value = 1.5;
            }
        }
        let snap = snapshot_of(dataset);

        let err = resolve(&snap, &request(&[("cotton_conventional", 100.0)])).unwrap_err();
        assert!(matches!(err, ImpactError::Configuration(_)));
    }

    #[test]
    fn test_brand_assessment_levels() {
        let snap = snapshot_of(default_dataset());
        let confidence = |name: &str| assess_brand(name, snap.get_brand(name)).confidence;

        assert_eq!(confidence("Patagonia"), BrandConfidence::Established);
        assert_eq!(confidence("H&M"), BrandConfidence::Established);
        assert_eq!(confidence("Uniqlo"), BrandConfidence::Partial);
        assert_eq!(confidence("Shein"), BrandConfidence::Limited);
        assert_eq!(confidence("Nobody Apparel"), BrandConfidence::Unknown);
    }

    #[test]
    fn test_partial_by_disclosures_alone() {
        let profile = BrandSustainabilityProfile {
            name: "Small Label".to_string(),
            transparency_score: Some(10),
            publishes_supplier_list: true,
            discloses_water_usage: true,
            has_climate_targets: true,
            ..Default::default()
        };
        let assessment = assess_brand("small label", Some(&profile));
        assert_eq!(assessment.confidence, BrandConfidence::Partial);
        assert_eq!(assessment.disclosures, 3);
        assert_eq!(assessment.brand_name, "Small Label");
    }

    #[test]
    fn test_blank_brand_ignored() {
        let snap = snapshot_of(default_dataset());
        let mut req = request(&[("cotton_conventional", 100.0)]);
        req.brand_name = Some("   ".to_string());
        assert!(resolve(&snap, &req).unwrap().brand.is_none());
    }
}
