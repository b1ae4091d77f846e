use std::fmt;

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use super::entities::{LineItem, ListingType, RawLineItem, SizeBucket};

/// Identifies one shipping group: every line with the same listing type and
/// size bucket ships under the same rule entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub listing_type: ListingType,
    pub size_bucket: SizeBucket,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.listing_type.label(), self.size_bucket.label())
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Singles are bucketed by height at 12", everything else by pot size at 4".
pub fn size_bucket(listing_type: ListingType, inches: Decimal) -> SizeBucket {
    match listing_type {
        ListingType::Single if inches > Decimal::from(12) => SizeBucket::Over12In,
        ListingType::Single => SizeBucket::UpTo12In,
        _ if inches > Decimal::from(4) => SizeBucket::Over4In,
        _ => SizeBucket::UpTo4In,
    }
}

pub fn classify(item: &LineItem) -> GroupKey {
    GroupKey {
        listing_type: item.listing_type,
        size_bucket: size_bucket(item.listing_type, item.size.inches()),
    }
}

/// Classifies a storefront row directly. Zero-quantity rows have no group.
pub fn classify_raw(raw: &RawLineItem) -> Option<GroupKey> {
    LineItem::from_raw(raw).map(|item| classify(&item))
}
