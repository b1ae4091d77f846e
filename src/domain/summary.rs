use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;

use super::{
    entities::{ShipmentRecord, ShipmentStatus, StoredCredits},
    shipping::{CannotPriceReason, PricingError, ShippingResult},
};
use crate::util::money::round2;

/// Charges that sit on top of the grouped shipping result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SummaryPolicy {
    /// Floor for the payable total; an order is never free.
    pub minimum_charge: Decimal,
    /// UPS expedite surcharge as a fraction of the ground shipping total.
    pub ups_surcharge_rate: Decimal,
}

impl Default for SummaryPolicy {
    fn default() -> Self {
        Self {
            minimum_charge: Decimal::new(50, 2),
            ups_surcharge_rate: Decimal::new(6, 1),
        }
    }
}

/// Whether this order is the first on its flight or joins one already paid for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum FlightOrder {
    #[default]
    First,
    Succeeding,
}

/// An order succeeds another when a live shipment already flies on the same date.
pub fn flight_order_for(selected: Date, shipments: &[ShipmentRecord]) -> FlightOrder {
    let joins_existing = shipments.iter().any(|shipment| {
        shipment.flight_date == Some(selected)
            && !matches!(
                shipment.status,
                ShipmentStatus::Cancelled | ShipmentStatus::Delivered
            )
    });
    if joins_existing {
        FlightOrder::Succeeding
    } else {
        FlightOrder::First
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SummaryInput<'a> {
    pub subtotal: Decimal,
    pub shipping: &'a ShippingResult,
    /// Validated discount amount; untrusted, re-capped here.
    pub requested_discount: Option<Decimal>,
    pub credits: StoredCredits,
    pub ups_upgrade: bool,
    pub flight_date: Option<Date>,
    pub flight_order: FlightOrder,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub discount_amount: Decimal,
    pub credits_applied: Decimal,
    pub final_total: Decimal,
    pub ups_surcharge: Decimal,
    pub succeeding_order_air_credit: Decimal,
    pub flight_order: FlightOrder,
}

/// Layers discount, stored credits, and the UPS upgrade over grouped shipping.
///
/// Stored credits are deducted here and nowhere else. Fails with
/// [`PricingError::CannotPrice`] for an empty cart or missing flight date so the
/// caller blocks checkout instead of charging a default.
pub fn compute_order_summary(
    input: &SummaryInput<'_>,
    policy: &SummaryPolicy,
) -> Result<OrderSummary, PricingError> {
    if input.shipping.breakdown.is_empty() {
        return Err(PricingError::CannotPrice(CannotPriceReason::EmptyCart));
    }
    if input.flight_date.is_none() {
        return Err(PricingError::CannotPrice(CannotPriceReason::MissingFlightDate));
    }

    let shipping = input.shipping;
    let ups_surcharge = if input.ups_upgrade {
        shipping.shipping_total * policy.ups_surcharge_rate
    } else {
        Decimal::ZERO
    };

    // The promo and a succeeding-order waiver cover the same air charge; never both.
    let succeeding_order_air_credit = match input.flight_order {
        FlightOrder::Succeeding => (shipping.non_wholesale_air() - shipping.applied_air_base_credit)
            .max(Decimal::ZERO)
            .min(shipping.air_cargo_total),
        FlightOrder::First => Decimal::ZERO,
    };

    let shipping_cost = shipping.shipping_total + shipping.air_cargo_total
        - succeeding_order_air_credit
        + ups_surcharge;
    if shipping_cost.is_sign_negative() {
        return Err(PricingError::InvariantViolation(format!(
            "shipping cost {shipping_cost} is negative"
        )));
    }

    let owed = input.subtotal + shipping_cost;
    let requested = input.requested_discount.unwrap_or(Decimal::ZERO).max(Decimal::ZERO);
    let discount_amount = requested.min(owed);
    if discount_amount < requested {
        tracing::debug!(%requested, capped = %discount_amount, "discount capped at amount owed");
    }

    let credits_applied = input.credits.total_applied();
    let final_total = (owed - discount_amount - credits_applied).max(policy.minimum_charge);

    Ok(OrderSummary {
        subtotal: round2(input.subtotal),
        shipping_cost: round2(shipping_cost),
        discount_amount: round2(discount_amount),
        credits_applied: round2(credits_applied),
        final_total: round2(final_total),
        ups_surcharge: round2(ups_surcharge),
        succeeding_order_air_credit: round2(succeeding_order_air_credit),
        flight_order: input.flight_order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{CreditToggle, LineItem, ListingType, SizeMeasure};
    use crate::domain::shipping::{cart_subtotal, compute_grouped_shipping};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use time::macros::{date, datetime};

    fn cart(quantity: u32, price: Decimal) -> Vec<LineItem> {
        vec![LineItem {
            listing_type: ListingType::Single,
            quantity,
            unit_price: price,
            size: SizeMeasure::HeightInches(dec!(10)),
            origin_country: "TH".into(),
            known_flight_date: None,
        }]
    }

    fn input<'a>(items: &[LineItem], shipping: &'a ShippingResult) -> SummaryInput<'a> {
        SummaryInput {
            subtotal: cart_subtotal(items),
            shipping,
            requested_discount: None,
            credits: StoredCredits::default(),
            ups_upgrade: false,
            flight_date: Some(date!(2026 - 10 - 31)),
            flight_order: FlightOrder::First,
        }
    }

    #[test]
    fn plain_order() {
        let items = cart(1, dec!(25));
        let shipping = compute_grouped_shipping(&items).unwrap();
        let summary = compute_order_summary(&input(&items, &shipping), &SummaryPolicy::default())
            .unwrap();
        assert_eq!(summary.subtotal, dec!(25));
        assert_eq!(summary.shipping_cost, dec!(200));
        assert_eq!(summary.final_total, dec!(225));
        assert_eq!(summary.final_total.to_string(), "225.00");
    }

    #[test]
    fn ups_surcharge_is_sixty_percent_of_ground_shipping() {
        let items = cart(3, dec!(20));
        let shipping = compute_grouped_shipping(&items).unwrap();
        let mut request = input(&items, &shipping);
        request.ups_upgrade = true;
        let summary = compute_order_summary(&request, &SummaryPolicy::default()).unwrap();
        // Ground 60, air 150, surcharge 36.
        assert_eq!(summary.ups_surcharge, dec!(36));
        assert_eq!(summary.shipping_cost, dec!(246));
        assert_eq!(summary.final_total, dec!(306));
    }

    #[test]
    fn discount_is_capped_at_amount_owed() {
        let items = cart(1, dec!(25));
        let shipping = compute_grouped_shipping(&items).unwrap();
        let mut request = input(&items, &shipping);
        request.requested_discount = Some(dec!(1000));
        let summary = compute_order_summary(&request, &SummaryPolicy::default()).unwrap();
        assert_eq!(summary.discount_amount, dec!(225));
        assert_eq!(summary.final_total, dec!(0.50));
    }

    #[test]
    fn credits_are_deducted_exactly_once() {
        let items = cart(2, dec!(50));
        let shipping = compute_grouped_shipping(&items).unwrap();
        let mut request = input(&items, &shipping);
        request.credits.shipping_credits = CreditToggle::new(true, dec!(30));
        request.credits.loyalty_points = CreditToggle::new(true, dec!(5));
        request.credits.plant_credits = CreditToggle::new(false, dec!(500));
        let summary = compute_order_summary(&request, &SummaryPolicy::default()).unwrap();
        // Shipping stays untouched by credits: 55 ground + 150 air.
        assert_eq!(shipping.total, dec!(205));
        assert_eq!(summary.shipping_cost, dec!(205));
        assert_eq!(summary.credits_applied, dec!(35));
        assert_eq!(summary.final_total, dec!(270));
    }

    #[rstest]
    #[case(dec!(0), dec!(0), dec!(0), dec!(0))]
    #[case(dec!(500), dec!(0), dec!(0), dec!(0))]
    #[case(dec!(0), dec!(500), dec!(500), dec!(500))]
    #[case(dec!(224.99), dec!(0), dec!(0), dec!(0))]
    #[case(dec!(100), dec!(100), dec!(100), dec!(100))]
    #[case(dec!(-50), dec!(10), dec!(0), dec!(0))]
    fn final_total_never_drops_below_minimum(
        #[case] discount: Decimal,
        #[case] loyalty: Decimal,
        #[case] plant: Decimal,
        #[case] shipping_credit: Decimal,
    ) {
        let items = cart(1, dec!(25));
        let shipping = compute_grouped_shipping(&items).unwrap();
        let mut request = input(&items, &shipping);
        request.requested_discount = Some(discount);
        request.credits = StoredCredits {
            loyalty_points: CreditToggle::new(true, loyalty),
            plant_credits: CreditToggle::new(true, plant),
            shipping_credits: CreditToggle::new(true, shipping_credit),
        };
        let policy = SummaryPolicy::default();
        let summary = compute_order_summary(&request, &policy).unwrap();
        assert!(summary.final_total >= policy.minimum_charge);
        assert!(summary.discount_amount <= summary.subtotal + summary.shipping_cost);
        assert!(!summary.discount_amount.is_sign_negative());
    }

    #[test]
    fn empty_cart_cannot_be_priced() {
        let shipping = ShippingResult::empty();
        let request = input(&[], &shipping);
        assert_eq!(
            compute_order_summary(&request, &SummaryPolicy::default()),
            Err(PricingError::CannotPrice(CannotPriceReason::EmptyCart))
        );
    }

    #[test]
    fn missing_flight_date_cannot_be_priced() {
        let items = cart(1, dec!(25));
        let shipping = compute_grouped_shipping(&items).unwrap();
        let mut request = input(&items, &shipping);
        request.flight_date = None;
        assert_eq!(
            compute_order_summary(&request, &SummaryPolicy::default()),
            Err(PricingError::CannotPrice(CannotPriceReason::MissingFlightDate))
        );
    }

    #[test]
    fn succeeding_order_skips_non_wholesale_air() {
        let items = cart(2, dec!(30));
        let shipping = compute_grouped_shipping(&items).unwrap();
        let mut request = input(&items, &shipping);
        request.flight_order = FlightOrder::Succeeding;
        let summary = compute_order_summary(&request, &SummaryPolicy::default()).unwrap();
        assert_eq!(summary.succeeding_order_air_credit, dec!(150));
        assert_eq!(summary.shipping_cost, dec!(55));
    }

    #[test]
    fn succeeding_order_does_not_stack_on_the_promo() {
        let items = cart(15, dec!(40));
        let shipping = compute_grouped_shipping(&items).unwrap();
        let mut request = input(&items, &shipping);
        request.flight_order = FlightOrder::Succeeding;
        let summary = compute_order_summary(&request, &SummaryPolicy::default()).unwrap();
        assert_eq!(summary.succeeding_order_air_credit, Decimal::ZERO);
        assert_eq!(summary.shipping_cost, dec!(120));
    }

    #[test]
    fn flight_order_follows_existing_shipments() {
        let shipments = vec![
            ShipmentRecord {
                status: ShipmentStatus::AwaitingDispatch,
                flight_date: Some(date!(2026 - 10 - 31)),
                created_at: datetime!(2026-10-01 10:00 UTC),
            },
            ShipmentRecord {
                status: ShipmentStatus::Cancelled,
                flight_date: Some(date!(2026 - 11 - 07)),
                created_at: datetime!(2026-10-02 10:00 UTC),
            },
        ];
        assert_eq!(flight_order_for(date!(2026 - 10 - 31), &shipments), FlightOrder::Succeeding);
        assert_eq!(flight_order_for(date!(2026 - 11 - 07), &shipments), FlightOrder::First);
        assert_eq!(flight_order_for(date!(2026 - 11 - 14), &[]), FlightOrder::First);
    }
}
