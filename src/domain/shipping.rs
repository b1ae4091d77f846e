//! Grouped shipping and air-cargo aggregation.
//!
//! Items are grouped by (listing type, size bucket). Each group pays its rule
//! entry's base charge plus a per-unit add-on for every unit after the first.
//! Air cargo is charged per group as well; only wholesale groups scale it by
//! quantity. Large carts earn back the non-wholesale air cargo.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use super::{
    classify::{classify, GroupKey},
    entities::{LineItem, ListingType},
    rules::{RuleEntry, RuleTable},
};
use crate::util::money::round2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CannotPriceReason {
    EmptyCart,
    MissingFlightDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("cannot price checkout: {0:?}")]
    CannotPrice(CannotPriceReason),
    #[error("pricing invariant violated: {0}")]
    InvariantViolation(String),
}

/// Spend + quantity threshold that credits back non-wholesale air cargo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PromoPolicy {
    pub min_quantity: u32,
    pub min_subtotal: Decimal,
}

impl Default for PromoPolicy {
    fn default() -> Self {
        Self {
            min_quantity: 15,
            min_subtotal: Decimal::from(500),
        }
    }
}

impl PromoPolicy {
    pub fn qualifies(&self, total_quantity: u64, subtotal: Decimal) -> bool {
        total_quantity >= u64::from(self.min_quantity) && subtotal >= self.min_subtotal
    }
}

/// Lines sharing one group key.
#[derive(Clone, Debug, PartialEq)]
pub struct Group<'a> {
    pub key: GroupKey,
    pub total_quantity: u64,
    pub members: Vec<&'a LineItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCharge {
    pub group_key: GroupKey,
    pub quantity: u64,
    pub group_shipping_charge: Decimal,
    pub group_air_charge: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingResult {
    pub shipping_total: Decimal,
    pub air_cargo_total: Decimal,
    pub applied_air_base_credit: Decimal,
    pub total: Decimal,
    pub breakdown: Vec<GroupCharge>,
}

impl ShippingResult {
    pub fn empty() -> Self {
        Self {
            shipping_total: round2(Decimal::ZERO),
            air_cargo_total: round2(Decimal::ZERO),
            applied_air_base_credit: round2(Decimal::ZERO),
            total: round2(Decimal::ZERO),
            breakdown: Vec::new(),
        }
    }

    /// Air cargo charged to non-wholesale groups before any credit.
    pub fn non_wholesale_air(&self) -> Decimal {
        self.breakdown
            .iter()
            .filter(|charge| charge.group_key.listing_type != ListingType::Wholesale)
            .map(|charge| charge.group_air_charge)
            .sum()
    }
}

/// Groups lines by key, in stable key order. Zero-quantity lines are skipped.
pub fn group_items(items: &[LineItem]) -> Vec<Group<'_>> {
    let mut groups: BTreeMap<GroupKey, Group<'_>> = BTreeMap::new();
    for item in items.iter().filter(|item| item.quantity > 0) {
        let key = classify(item);
        let group = groups.entry(key).or_insert_with(|| Group {
            key,
            total_quantity: 0,
            members: Vec::new(),
        });
        group.total_quantity += u64::from(item.quantity);
        group.members.push(item);
    }
    groups.into_values().collect()
}

/// Prices a cart with the standard rule table and promo threshold.
pub fn compute_grouped_shipping(items: &[LineItem]) -> Result<ShippingResult, PricingError> {
    compute_grouped_shipping_with(items, RuleTable::standard(), &PromoPolicy::default())
}

pub fn compute_grouped_shipping_with(
    items: &[LineItem],
    table: &RuleTable,
    promo: &PromoPolicy,
) -> Result<ShippingResult, PricingError> {
    let groups = group_items(items);
    if groups.is_empty() {
        return Ok(ShippingResult::empty());
    }

    let mut shipping_total = Decimal::ZERO;
    let mut air_cargo_total = Decimal::ZERO;
    let mut non_wholesale_air = Decimal::ZERO;
    let mut breakdown = Vec::with_capacity(groups.len());

    for group in &groups {
        let entry = table.lookup(group.key.listing_type, group.key.size_bucket);
        if entry.has_negative_constant() {
            return Err(PricingError::InvariantViolation(format!(
                "rule entry for {} has a negative constant",
                group.key
            )));
        }

        let shipping = group_shipping_charge(&entry, group.total_quantity);
        let air = group_air_charge(&entry, group.total_quantity);
        if shipping.is_sign_negative() || air.is_sign_negative() {
            return Err(PricingError::InvariantViolation(format!(
                "negative charge for group {}",
                group.key
            )));
        }

        shipping_total += shipping;
        air_cargo_total += air;
        if group.key.listing_type != ListingType::Wholesale {
            non_wholesale_air += air;
        }

        breakdown.push(GroupCharge {
            group_key: group.key,
            quantity: group.total_quantity,
            group_shipping_charge: round2(shipping),
            group_air_charge: round2(air),
        });
    }

    let total_quantity: u64 = groups.iter().map(|group| group.total_quantity).sum();
    let subtotal = cart_subtotal(items);
    let applied_air_base_credit = if promo.qualifies(total_quantity, subtotal) {
        non_wholesale_air
    } else {
        Decimal::ZERO
    };
    let air_cargo_total = (air_cargo_total - applied_air_base_credit).max(Decimal::ZERO);

    let shipping_total = round2(shipping_total);
    let air_cargo_total = round2(air_cargo_total);

    Ok(ShippingResult {
        shipping_total,
        air_cargo_total,
        applied_air_base_credit: round2(applied_air_base_credit),
        total: round2(shipping_total + air_cargo_total),
        breakdown,
    })
}

/// Sum of `unit_price * quantity`, shipping excluded.
pub fn cart_subtotal(items: &[LineItem]) -> Decimal {
    items.iter().map(LineItem::line_total).sum()
}

fn additional_units(quantity: u64) -> Decimal {
    Decimal::from(quantity.saturating_sub(1))
}

fn group_shipping_charge(entry: &RuleEntry, quantity: u64) -> Decimal {
    entry.base + additional_units(quantity) * entry.per_additional_unit
}

// Non-wholesale rule entries carry a zero air add-on, so their air cargo comes
// out once per group; the term is still applied so a future rule value counts.
fn group_air_charge(entry: &RuleEntry, quantity: u64) -> Decimal {
    entry.air_cargo_base + additional_units(quantity) * entry.air_cargo_per_additional_unit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::SizeMeasure;
    use crate::domain::rules::RuleEntry;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn single(height: Decimal, quantity: u32, price: Decimal) -> LineItem {
        LineItem {
            listing_type: ListingType::Single,
            quantity,
            unit_price: price,
            size: SizeMeasure::HeightInches(height),
            origin_country: "TH".into(),
            known_flight_date: None,
        }
    }

    fn wholesale(pot: Decimal, quantity: u32, price: Decimal) -> LineItem {
        LineItem {
            listing_type: ListingType::Wholesale,
            quantity,
            unit_price: price,
            size: SizeMeasure::PotInches(pot),
            origin_country: "TH".into(),
            known_flight_date: None,
        }
    }

    #[test]
    fn empty_cart_is_all_zero() {
        let result = compute_grouped_shipping(&[]).unwrap();
        assert_eq!(result.shipping_total, Decimal::ZERO);
        assert_eq!(result.air_cargo_total, Decimal::ZERO);
        assert_eq!(result.applied_air_base_credit, Decimal::ZERO);
        assert_eq!(result.total, Decimal::ZERO);
        assert!(result.breakdown.is_empty());
    }

    #[test]
    fn single_short_plant() {
        let result = compute_grouped_shipping(&[single(dec!(10), 1, dec!(25))]).unwrap();
        assert_eq!(result.shipping_total, dec!(50));
        assert_eq!(result.air_cargo_total, dec!(150));
        assert_eq!(result.total, dec!(200));
    }

    #[test]
    fn single_tall_plant() {
        let result = compute_grouped_shipping(&[single(dec!(13), 1, dec!(40))]).unwrap();
        assert_eq!(result.shipping_total, dec!(70));
        assert_eq!(result.air_cargo_total, dec!(150));
        assert_eq!(result.total, dec!(220));
    }

    #[test]
    fn promo_credits_air_cargo_at_fifteen_units() {
        let items: Vec<_> = (0..15).map(|_| single(dec!(10), 1, dec!(40))).collect();
        let result = compute_grouped_shipping(&items).unwrap();
        assert_eq!(result.shipping_total, dec!(120));
        assert_eq!(result.air_cargo_total, Decimal::ZERO);
        assert_eq!(result.applied_air_base_credit, dec!(150));
        assert_eq!(result.total, dec!(120));
    }

    #[test]
    fn fractional_prices_are_stable() {
        let items = vec![single(dec!(10), 1, dec!(33.333)); 3];
        let first = compute_grouped_shipping(&items).unwrap();
        assert_eq!(first.shipping_total, dec!(60));
        assert_eq!(first.air_cargo_total, dec!(150));
        assert_eq!(first.total, dec!(210));
        for _ in 0..10 {
            assert_eq!(compute_grouped_shipping(&items).unwrap(), first);
        }
        assert_eq!(first.total.to_string(), "210.00");
    }

    #[test]
    fn promo_boundary_is_inclusive() {
        // 15 units, subtotal exactly 500.
        let mut items = vec![single(dec!(10), 14, dec!(30))];
        items.push(single(dec!(10), 1, dec!(80)));
        assert_eq!(cart_subtotal(&items), dec!(500));
        let result = compute_grouped_shipping(&items).unwrap();
        assert_eq!(result.air_cargo_total, Decimal::ZERO);

        // 14 units.
        let items = vec![single(dec!(10), 14, dec!(50))];
        let result = compute_grouped_shipping(&items).unwrap();
        assert_eq!(result.air_cargo_total, dec!(150));

        // 15 units, one cent short.
        let mut items = vec![single(dec!(10), 14, dec!(30))];
        items.push(single(dec!(10), 1, dec!(79.99)));
        assert_eq!(cart_subtotal(&items), dec!(499.99));
        let result = compute_grouped_shipping(&items).unwrap();
        assert_eq!(result.air_cargo_total, dec!(150));
    }

    #[test]
    fn promo_never_credits_wholesale_air() {
        let items = vec![single(dec!(10), 10, dec!(40)), wholesale(dec!(3), 5, dec!(40))];
        let result = compute_grouped_shipping(&items).unwrap();
        // Wholesale <=4: 200 + 4 * 15.
        assert_eq!(result.applied_air_base_credit, dec!(150));
        assert_eq!(result.air_cargo_total, dec!(260));
        // Single: 50 + 9 * 5; wholesale: 120 + 4 * 10.
        assert_eq!(result.shipping_total, dec!(255));
        assert_eq!(result.total, dec!(515));
    }

    #[test]
    fn non_wholesale_air_is_charged_once_per_group() {
        let items = vec![single(dec!(10), 3, dec!(20)), single(dec!(14), 2, dec!(20))];
        let result = compute_grouped_shipping(&items).unwrap();
        assert_eq!(result.breakdown.len(), 2);
        assert_eq!(result.air_cargo_total, dec!(300));
        assert_eq!(result.non_wholesale_air(), dec!(300));
    }

    #[test]
    fn lines_in_the_same_group_merge() {
        let items = vec![single(dec!(10), 2, dec!(20)), single(dec!(11), 3, dec!(20))];
        let result = compute_grouped_shipping(&items).unwrap();
        assert_eq!(result.breakdown.len(), 1);
        assert_eq!(result.breakdown[0].quantity, 5);
        assert_eq!(result.breakdown[0].group_shipping_charge, dec!(70));
        assert_eq!(result.breakdown[0].group_key.to_string(), "Single:<=12");
    }

    #[test]
    fn adding_units_never_lowers_shipping_below_the_promo() {
        let mut previous = Decimal::ZERO;
        for quantity in 1..=30 {
            let result = compute_grouped_shipping(&[single(dec!(10), quantity, dec!(10))]).unwrap();
            assert!(result.shipping_total >= previous);
            previous = result.shipping_total;
        }
    }

    #[test]
    fn total_matches_components() {
        let items = vec![single(dec!(10), 4, dec!(12.345)), wholesale(dec!(6), 7, dec!(3.21))];
        let result = compute_grouped_shipping(&items).unwrap();
        assert_eq!(result.total, round2(result.shipping_total + result.air_cargo_total));
    }

    #[test]
    fn negative_rule_constant_is_fatal() {
        let broken = RuleEntry {
            base: dec!(-5),
            per_additional_unit: dec!(1),
            air_cargo_base: dec!(0),
            air_cargo_per_additional_unit: dec!(0),
        };
        let table = RuleTable::new(HashMap::new(), HashMap::from([(ListingType::Single, broken)]));
        let error = compute_grouped_shipping_with(
            &[single(dec!(10), 1, dec!(10))],
            &table,
            &PromoPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(error, PricingError::InvariantViolation(_)));
    }
}
