use std::collections::BTreeMap;

use crate::error::ImpactError;
use crate::reference::normalize_key;

use super::types::{GarmentComposition, MaterialShare, NormalizedComposition};

/// Check a garment composition and rescale it to sum to exactly 100.
///
/// Fails with a validation error when the composition is empty, a material
/// name is blank or repeated (after normalization), a percentage is outside
/// `[0, 100]`, or the total deviates from 100 by more than `tolerance`
/// percentage points.
///
/// Each share is rescaled as `100 * raw / sum(raw)`. Entries at 0% pass
/// validation but are dropped from the result.
pub fn validate_composition(
    composition: &GarmentComposition,
    tolerance: f64,
) -> Result<NormalizedComposition, ImpactError> {
    if composition.is_empty() {
        return Err(ImpactError::validation(
            "composition",
            "must list at least one material",
        ));
    }

    let mut raw: BTreeMap<String, f64> = BTreeMap::new();
    for (name, &percentage) in composition {
        let key = normalize_key(name);
        if key.is_empty() {
            return Err(ImpactError::validation(
                "composition",
                "material name cannot be empty",
            ));
        }

        let field = format!("composition.{}", key);
        if !percentage.is_finite() || !(0.0..=100.0).contains(&percentage) {
            return Err(ImpactError::validation(
                field,
                format!("percentage {} must be between 0 and 100", percentage),
            ));
        }
        if raw.insert(key, percentage).is_some() {
            return Err(ImpactError::validation(
                field,
                format!("material '{}' is listed more than once", name.trim()),
            ));
        }
    }

    let total: f64 = raw.values().sum();
    if (total - 100.0).abs() > tolerance {
        return Err(ImpactError::validation(
            "composition",
            format!(
                "percentages sum to {:.2}, expected 100 (+/- {})",
                total, tolerance
            ),
        ));
    }
    if total <= 0.0 {
        return Err(ImpactError::validation(
            "composition",
            "percentages sum to zero",
        ));
    }

    let shares = raw
        .into_iter()
        .filter(|(_, percentage)| *percentage > 0.0)
        .map(|(material, percentage)| MaterialShare {
            material,
            percentage: 100.0 * percentage / total,
        })
        .collect();

    Ok(NormalizedComposition {
        shares,
        submitted_total: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 2.0;

    fn composition(entries: &[(&str, f64)]) -> GarmentComposition {
        entries
            .iter()
            .map(|(name, pct)| (name.to_string(), *pct))
            .collect()
    }

    fn share_sum(normalized: &NormalizedComposition) -> f64 {
        normalized.shares.iter().map(|s| s.percentage).sum()
    }

    #[test]
    fn test_exact_hundred_unchanged() {
        let result =
            validate_composition(&composition(&[("cotton_conventional", 100.0)]), TOLERANCE)
                .unwrap();
        assert_eq!(result.shares.len(), 1);
        assert_eq!(result.shares[0].percentage, 100.0);
        assert_eq!(result.submitted_total, 100.0);
    }

    #[test]
    fn test_within_tolerance_rescaled() {
        let input = composition(&[("cotton_conventional", 80.0), ("polyester", 18.5)]);
        let result = validate_composition(&input, TOLERANCE).unwrap();

        assert!((share_sum(&result) - 100.0).abs() < 1e-9);
        let cotton = &result.shares[0];
        assert_eq!(cotton.material, "cotton_conventional");
        assert!((cotton.percentage - 100.0 * 80.0 / 98.5).abs() < 1e-12);
    }

    #[test]
    fn test_outside_tolerance_rejected() {
        let input = composition(&[("cotton_conventional", 60.0), ("polyester", 30.0)]);
        let err = validate_composition(&input, TOLERANCE).unwrap_err();
        assert!(matches!(err, ImpactError::Validation { .. }));
        assert!(err.to_string().contains("90.00"));
    }

    #[test]
    fn test_tolerance_is_configurable() {
        let input = composition(&[("cotton_conventional", 98.5)]);
        assert!(validate_composition(&input, 2.0).is_ok());
        assert!(validate_composition(&input, 0.5).is_err());
    }

    #[test]
    fn test_empty_rejected() {
        let err = validate_composition(&GarmentComposition::new(), TOLERANCE).unwrap_err();
        assert_eq!(
            err,
            ImpactError::validation("composition", "must list at least one material")
        );
    }

    #[test]
    fn test_negative_percentage_rejected() {
        let input = composition(&[("cotton_conventional", 110.0), ("polyester", -10.0)]);
        let err = validate_composition(&input, TOLERANCE).unwrap_err();
        match err {
            ImpactError::Validation { field, .. } => {
                assert!(field.starts_with("composition."), "field was {}", field)
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_percentage_rejected() {
        let input = composition(&[("cotton_conventional", f64::NAN)]);
        assert!(validate_composition(&input, TOLERANCE).is_err());
    }

    #[test]
    fn test_duplicate_after_normalization_rejected() {
        let input = composition(&[("Cotton Conventional", 50.0), ("cotton_conventional", 50.0)]);
        let err = validate_composition(&input, TOLERANCE).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_blank_name_rejected() {
        let input = composition(&[("   ", 100.0)]);
        assert!(validate_composition(&input, TOLERANCE).is_err());
    }

    #[test]
    fn test_zero_share_dropped() {
        let input = composition(&[("cotton_conventional", 100.0), ("elastane", 0.0)]);
        let result = validate_composition(&input, TOLERANCE).unwrap();
        assert_eq!(result.shares.len(), 1);
        assert_eq!(result.shares[0].material, "cotton_conventional");
    }

    #[test]
    fn test_normalized_sum_for_many_shapes() {
        let shapes: [&[(&str, f64)]; 4] = [
            &[("a", 33.3), ("b", 33.3), ("c", 33.3)],
            &[("a", 70.0), ("b", 29.0), ("c", 2.5)],
            &[("a", 0.1), ("b", 99.8)],
            &[("a", 12.5), ("b", 12.5), ("c", 25.0), ("d", 49.0)],
        ];
        for shape in shapes {
            let result = validate_composition(&composition(shape), TOLERANCE).unwrap();
            assert!(
                (share_sum(&result) - 100.0).abs() < 1e-9,
                "shape {:?} summed to {}",
                shape,
                share_sum(&result)
            );
        }
    }
}
