//! Estimation entry point.
//!
//! `ImpactEngine` runs the four stages for a request:
//! validate the composition, pin a reference snapshot and resolve every
//! factor from it, calculate, then assemble the estimate.

use std::sync::Arc;

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::ImpactError;
use crate::reference::{ReferenceSnapshot, ReferenceStore};

use super::assembler::assemble;
use super::calculator::calculate;
use super::composition::validate_composition;
use super::resolver::FactorResolver;
use super::types::{ImpactEstimate, ImpactRequest, SwapImpact};

/// The impact estimation engine.
///
/// Holds no mutable state; one engine can serve concurrent requests.
pub struct ImpactEngine<S: ReferenceStore> {
    store: S,
    resolver: FactorResolver,
    config: EngineConfig,
}

impl<S: ReferenceStore> ImpactEngine<S> {
    /// Create an engine with the standard material fallback chain.
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self::with_resolver(store, config, FactorResolver::default())
    }

    pub fn with_resolver(store: S, config: EngineConfig, resolver: FactorResolver) -> Self {
        Self {
            store,
            resolver,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Estimate the impact avoided by swapping one garment.
    pub fn estimate(&self, request: &ImpactRequest) -> Result<ImpactEstimate, ImpactError> {
        let result = self
            .store
            .snapshot()
            .and_then(|snapshot| self.estimate_with(&snapshot, request));
        report(result)
    }

    /// Estimate both garments of one swap against the same snapshot and
    /// combine them.
    pub fn estimate_swap(
        &self,
        first: &ImpactRequest,
        second: &ImpactRequest,
    ) -> Result<SwapImpact, ImpactError> {
        let result = self.store.snapshot().and_then(|snapshot| {
            let a = self.estimate_with(&snapshot, first)?;
            let b = self.estimate_with(&snapshot, second)?;
            Ok(SwapImpact::combine(a, b))
        });
        report(result)
    }

    fn estimate_with(
        &self,
        snapshot: &Arc<ReferenceSnapshot>,
        request: &ImpactRequest,
    ) -> Result<ImpactEstimate, ImpactError> {
        let composition =
            validate_composition(&request.composition, self.config.composition_tolerance)?;

        let version = request
            .parameter_set_version
            .as_deref()
            .or(self.config.parameter_set_version.as_deref());
        let bundle = self
            .resolver
            .resolve(snapshot, &composition, request, version)?;
        debug!(
            "Resolved {} materials for {} against generation {}",
            bundle.materials.len(),
            bundle.clothing_type.label,
            bundle.snapshot_generation
        );

        if let Some(name) = request.brand_name.as_deref() {
            self.check_brand_freshness(snapshot, name);
        }

        let figures = calculate(&bundle)?;
        let estimate = assemble(&bundle, figures);

        info!(
            "Estimated {}: {:.3} kg CO2 avoided (quality {}, generation {})",
            estimate.clothing_type,
            estimate.co2_kg_avoided,
            estimate.data_quality,
            estimate.snapshot_generation
        );
        Ok(estimate)
    }

    fn check_brand_freshness(&self, snapshot: &ReferenceSnapshot, name: &str) {
        let Some(profile) = snapshot.get_brand(name) else {
            return;
        };
        let today = Local::now().date_naive();
        if profile.is_data_stale(today, self.config.brand_stale_after_days) {
            warn!(
                "Brand data for {} is stale (last updated {})",
                profile.name,
                profile
                    .last_updated
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "never".to_string())
            );
        }
    }
}

/// Log operational failures; request errors go back to the caller quietly.
fn report<T>(result: Result<T, ImpactError>) -> Result<T, ImpactError> {
    if let Err(e) = &result {
        if e.is_user_error() {
            debug!("Rejected request: {}", e);
        } else {
            error!("Impact estimation failed: {}", e);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::types::GarmentComposition;
    use crate::reference::{default_dataset, InMemoryReferenceStore};

    fn engine() -> ImpactEngine<InMemoryReferenceStore> {
        ImpactEngine::new(
            InMemoryReferenceStore::new(default_dataset()),
            EngineConfig::default(),
        )
    }

    fn request(clothing_type: &str, entries: &[(&str, f64)]) -> ImpactRequest {
        let composition: GarmentComposition = entries
            .iter()
            .map(|(name, pct)| (name.to_string(), *pct))
            .collect();
        ImpactRequest::new(clothing_type, composition)
    }

    #[test]
    fn test_estimate_cotton_tshirt() {
        let estimate = engine()
            .estimate(&request("t-shirt", &[("cotton_conventional", 100.0)]))
            .unwrap();
        assert!((estimate.co2_kg_avoided - 0.88089).abs() < 1e-9);
        assert_eq!(estimate.snapshot_generation, 1);
    }

    #[test]
    fn test_configured_parameter_set_used() {
        let mut dataset = default_dataset();
        let mut alt = dataset.parameter_sets[0].clone();
        alt.version = "alt".to_string();
        for p in &mut alt.parameters {
            if p.name == "replacement_factor" {
                p.value = 0.5;
            }
        }
        dataset.parameter_sets.push(alt);

        let config = EngineConfig {
            parameter_set_version: Some("alt".to_string()),
            ..Default::default()
        };
        let engine = ImpactEngine::new(InMemoryReferenceStore::new(dataset), config);

        let mut req = request("t-shirt", &[("cotton_conventional", 100.0)]);
        assert_eq!(engine.estimate(&req).unwrap().parameter_set_version, "alt");

        // A version on the request wins over the configured one
        req.parameter_set_version = Some("2024.1".to_string());
        assert_eq!(engine.estimate(&req).unwrap().parameter_set_version, "2024.1");
    }

    #[test]
    fn test_configured_tolerance_applies() {
        let strict = ImpactEngine::new(
            InMemoryReferenceStore::new(default_dataset()),
            EngineConfig {
                composition_tolerance: 0.5,
                ..Default::default()
            },
        );
        let req = request("t-shirt", &[("cotton_conventional", 98.5)]);
        assert!(engine().estimate(&req).is_ok());
        assert!(matches!(
            strict.estimate(&req).unwrap_err(),
            ImpactError::Validation { .. }
        ));
    }

    #[test]
    fn test_swap_uses_one_snapshot() {
        let engine = engine();
        let swap = engine
            .estimate_swap(
                &request("t-shirt", &[("cotton_conventional", 100.0)]),
                &request("jeans", &[("cotton_conventional", 98.0), ("elastane", 2.0)]),
            )
            .unwrap();
        assert_eq!(
            swap.first.snapshot_generation,
            swap.second.snapshot_generation
        );
        assert!(
            (swap.total_avoided.co2_kg - (swap.first.co2_kg_avoided + swap.second.co2_kg_avoided))
                .abs()
                < 1e-12
        );
    }

    #[test]
    fn test_negative_weight_in_request_json_is_validation_error() {
        let req: ImpactRequest = serde_json::from_str(
            r#"{"clothing_type": "t-shirt",
                "composition": {"cotton_conventional": 100},
                "override_weight_grams": -150}"#,
        )
        .unwrap();

        match engine().estimate(&req).unwrap_err() {
            ImpactError::Validation { field, .. } => assert_eq!(field, "override_weight_grams"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_registered_brand_with_huge_staleness_window() {
        let engine = ImpactEngine::new(
            InMemoryReferenceStore::new(default_dataset()),
            EngineConfig {
                brand_stale_after_days: i64::MAX,
                ..Default::default()
            },
        );
        let mut req = request("t-shirt", &[("cotton_conventional", 100.0)]);
        req.brand_name = Some("H&M".to_string());

        let estimate = engine.estimate(&req).unwrap();
        assert!((estimate.co2_kg_avoided - 0.88089).abs() < 1e-9);
    }

    #[test]
    fn test_swap_fails_if_either_side_fails() {
        let err = engine()
            .estimate_swap(
                &request("t-shirt", &[("cotton_conventional", 100.0)]),
                &request("ballgown", &[("silk", 100.0)]),
            )
            .unwrap_err();
        assert!(err.is_user_error());
    }
}
