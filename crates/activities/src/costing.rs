//! Cost aggregation for activities.
//!
//! Pure functions of the current line items, invoked by the write path before
//! an activity is persisted. Running them twice on the same inputs gives the
//! same result.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use agrolog_core::{DomainError, DomainResult};

use crate::activity::{AreaUnit, FertigationDay, ProductUsage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub total_cost: Decimal,
    pub cost_per_hectare: Decimal,
}

/// Σ(dose × price) over `products`.
pub fn product_lines_cost(products: &[ProductUsage]) -> DomainResult<Decimal> {
    products.iter().try_fold(Decimal::ZERO, |acc, p| {
        acc.checked_add(p.line_cost()?)
            .ok_or_else(DomainError::out_of_range)
    })
}

/// `total = Σ(dose × price) + Σ(fertigation day cost)`; `per_ha = total / area_ha`,
/// or zero when the area is not positive.
///
/// Overflow anywhere in the sum is a validation failure, never a panic.
pub fn compute_costs(
    products: &[ProductUsage],
    fertigation: &[FertigationDay],
    surface_area: Decimal,
    area_unit: AreaUnit,
) -> DomainResult<CostBreakdown> {
    let total_cost = fertigation
        .iter()
        .try_fold(product_lines_cost(products)?, |acc, day| {
            acc.checked_add(day.effective_cost()?)
                .ok_or_else(DomainError::out_of_range)
        })?;

    let hectares = area_unit.to_hectares(surface_area);
    let cost_per_hectare = if hectares > Decimal::ZERO {
        total_cost
            .checked_div(hectares)
            .ok_or_else(DomainError::out_of_range)?
    } else {
        Decimal::ZERO
    };

    Ok(CostBreakdown {
        total_cost,
        cost_per_hectare,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::tests::usage;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn day(products: Vec<ProductUsage>, cost: Option<Decimal>) -> FertigationDay {
        FertigationDay {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            products,
            observation: None,
            cost,
        }
    }

    #[test]
    fn half_hectare_example() {
        let products = vec![usage("a", dec!(10), dec!(2.0)), usage("b", dec!(5), dec!(3.0))];
        let c = compute_costs(&products, &[], dec!(0.5), AreaUnit::Hectare).unwrap();
        assert_eq!(c.total_cost, dec!(35.0));
        assert_eq!(c.cost_per_hectare, dec!(70.0));
    }

    #[test]
    fn zero_area_gives_zero_cost_per_hectare() {
        let products = vec![usage("a", dec!(1), dec!(4))];
        let c = compute_costs(&products, &[], Decimal::ZERO, AreaUnit::Hectare).unwrap();
        assert_eq!(c.total_cost, dec!(4));
        assert_eq!(c.cost_per_hectare, Decimal::ZERO);
    }

    #[test]
    fn fertigation_day_uses_supplied_cost_or_its_lines() {
        let days = vec![
            day(vec![usage("kno3", dec!(2), dec!(1.5))], Some(dec!(10))),
            day(vec![usage("kno3", dec!(2), dec!(1.5))], None),
        ];
        let c = compute_costs(&[], &days, dec!(1), AreaUnit::Hectare).unwrap();
        assert_eq!(c.total_cost, dec!(13));
    }

    #[test]
    fn overflowing_line_is_a_validation_error() {
        let huge = Decimal::from(1_000_000_000_000_000u64);
        let products = vec![usage("a", huge, huge)];
        let err = compute_costs(&products, &[], dec!(1), AreaUnit::Hectare).unwrap_err();
        assert_eq!(err, DomainError::out_of_range());
    }

    #[test]
    fn overflowing_sum_is_a_validation_error() {
        let days = vec![day(Vec::new(), Some(Decimal::MAX)), day(Vec::new(), Some(Decimal::ONE))];
        let err = compute_costs(&[], &days, dec!(1), AreaUnit::Hectare).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn tiny_area_overflowing_per_hectare_is_a_validation_error() {
        let products = vec![usage("a", Decimal::MAX, Decimal::ONE)];
        let err = compute_costs(&products, &[], Decimal::new(1, 10), AreaUnit::Hectare).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    fn arb_usage() -> impl Strategy<Value = ProductUsage> {
        (0u32..10_000, 0u32..100_000).prop_map(|(dose_cents, price_cents)| {
            usage("p", Decimal::new(dose_cents.into(), 2), Decimal::new(price_cents.into(), 2))
        })
    }

    proptest! {
        /// Recomputing from unchanged inputs yields identical values.
        #[test]
        fn recomputation_is_idempotent(
            products in prop::collection::vec(arb_usage(), 0..20),
            day_costs in prop::collection::vec(prop::option::of(0u32..50_000), 0..10),
            area_cents in 0u32..100_000,
        ) {
            let days: Vec<_> = day_costs
                .into_iter()
                .map(|c| day(vec![usage("d", dec!(1), dec!(2))], c.map(Decimal::from)))
                .collect();
            let area = Decimal::new(area_cents.into(), 2);
            let first = compute_costs(&products, &days, area, AreaUnit::Hectare).unwrap();
            let second = compute_costs(&products, &days, area, AreaUnit::Hectare).unwrap();
            prop_assert_eq!(first, second);
        }

        /// Total equals the sum formula and is never negative.
        #[test]
        fn total_is_the_sum_formula(
            products in prop::collection::vec(arb_usage(), 0..20),
            day_costs in prop::collection::vec(0u32..50_000, 0..10),
        ) {
            let days: Vec<_> = day_costs
                .iter()
                .map(|c| day(Vec::new(), Some(Decimal::from(*c))))
                .collect();
            let c = compute_costs(&products, &days, dec!(2), AreaUnit::Hectare).unwrap();

            let mut expected = Decimal::ZERO;
            for p in &products {
                expected += p.dose * p.price_per_unit;
            }
            for d in &day_costs {
                expected += Decimal::from(*d);
            }
            prop_assert_eq!(c.total_cost, expected);
            prop_assert!(c.total_cost >= Decimal::ZERO);
            prop_assert_eq!(c.cost_per_hectare * dec!(2), c.total_cost);
        }
    }
}
