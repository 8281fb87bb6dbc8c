//! Cost allocation: acquisition costs spread over the declared weight.

/// Per-kilogram cost basis of a batch.
///
/// `(purchase + freight + extras) / declared_weight`, recomputed from its
/// inputs on every call and never stored independently of them.
///
/// Returns 0.0 while the declared weight is zero: the weight not being
/// known yet is a normal transient state during drafting, not an error.
pub fn cost_per_kg(purchase: f64, freight: f64, extras: f64, declared_weight: f64) -> f64 {
    if declared_weight == 0.0 {
        return 0.0;
    }
    (purchase + freight + extras) / declared_weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use frigoerp_core::COST_EPSILON;
    use proptest::prelude::*;

    #[test]
    fn allocates_all_cost_components_over_declared_weight() {
        let cost = cost_per_kg(18_000.0, 500.0, 200.0, 1_000.0);
        assert!((cost - 18.70).abs() < COST_EPSILON);
    }

    #[test]
    fn zero_declared_weight_yields_zero_not_an_error() {
        assert_eq!(cost_per_kg(18_000.0, 500.0, 200.0, 0.0), 0.0);
    }

    proptest! {
        /// Cost basis times declared weight recovers the total cost.
        #[test]
        fn cost_basis_times_weight_recovers_total(
            purchase in 1_000.0f64..1_000_000.0,
            freight in 0.0f64..50_000.0,
            extras in 0.0f64..50_000.0,
            weight in 100.0f64..100_000.0,
        ) {
            let cost = cost_per_kg(purchase, freight, extras, weight);
            let recovered = cost * weight;
            let total = purchase + freight + extras;
            prop_assert!((recovered - total).abs() / total < 1e-9);
        }
    }
}
