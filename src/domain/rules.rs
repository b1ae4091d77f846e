//! Shipping and air-cargo charge constants keyed by listing type and size bucket.

use std::{collections::HashMap, sync::OnceLock};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::entities::{ListingType, SizeBucket};

/// Charge constants for one (listing type, size bucket) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleEntry {
    pub base: Decimal,
    pub per_additional_unit: Decimal,
    pub air_cargo_base: Decimal,
    pub air_cargo_per_additional_unit: Decimal,
}

impl RuleEntry {
    fn dollars(base: i64, per_additional_unit: i64, air_base: i64, air_per_unit: i64) -> Self {
        Self {
            base: Decimal::from(base),
            per_additional_unit: Decimal::from(per_additional_unit),
            air_cargo_base: Decimal::from(air_base),
            air_cargo_per_additional_unit: Decimal::from(air_per_unit),
        }
    }

    pub fn has_negative_constant(&self) -> bool {
        [
            self.base,
            self.per_additional_unit,
            self.air_cargo_base,
            self.air_cargo_per_additional_unit,
        ]
        .iter()
        .any(Decimal::is_sign_negative)
    }
}

/// Immutable rule table with a per-listing-type default entry.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleTable {
    entries: HashMap<(ListingType, SizeBucket), RuleEntry>,
    defaults: HashMap<ListingType, RuleEntry>,
}

impl RuleTable {
    pub fn new(
        entries: HashMap<(ListingType, SizeBucket), RuleEntry>,
        defaults: HashMap<ListingType, RuleEntry>,
    ) -> Self {
        Self { entries, defaults }
    }

    /// The storefront's published shipping rules.
    pub fn standard() -> &'static RuleTable {
        static TABLE: OnceLock<RuleTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            let single_small = RuleEntry::dollars(50, 5, 150, 0);
            let single_tall = RuleEntry::dollars(70, 5, 150, 0);
            let growers_small = RuleEntry::dollars(45, 4, 150, 0);
            let growers_large = RuleEntry::dollars(60, 6, 150, 0);
            let wholesale_small = RuleEntry::dollars(120, 10, 200, 15);
            let wholesale_large = RuleEntry::dollars(160, 15, 250, 20);

            let entries = HashMap::from([
                ((ListingType::Single, SizeBucket::UpTo12In), single_small),
                ((ListingType::Single, SizeBucket::Over12In), single_tall),
                ((ListingType::GrowersChoice, SizeBucket::UpTo4In), growers_small),
                ((ListingType::GrowersChoice, SizeBucket::Over4In), growers_large),
                ((ListingType::Wholesale, SizeBucket::UpTo4In), wholesale_small),
                ((ListingType::Wholesale, SizeBucket::Over4In), wholesale_large),
            ]);
            let defaults = HashMap::from([
                (ListingType::Single, single_small),
                (ListingType::GrowersChoice, growers_small),
                (ListingType::Wholesale, wholesale_small),
            ]);

            RuleTable::new(entries, defaults)
        })
    }

    /// Exact entry, else the listing type's default, else the Single default.
    pub fn lookup(&self, listing_type: ListingType, bucket: SizeBucket) -> RuleEntry {
        self.entries
            .get(&(listing_type, bucket))
            .or_else(|| self.defaults.get(&listing_type))
            .or_else(|| self.defaults.get(&ListingType::Single))
            .copied()
            .unwrap_or_else(|| RuleEntry::dollars(0, 0, 0, 0))
    }
}
