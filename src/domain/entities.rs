use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use time::{Date, OffsetDateTime};

use crate::util::dates;
use crate::util::money::{from_f64_lenient, parse_lenient};

/// Listing type of a purchased item; each has distinct shipping economics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ListingType {
    #[default]
    Single,
    GrowersChoice,
    Wholesale,
}

impl ListingType {
    /// Normalises a free-form listing label.
    ///
    /// Precedence is Wholesale > GrowersChoice > Single so combined labels such
    /// as `"Wholesale Grower's Choice"` resolve deterministically. Anything
    /// unrecognised is a Single.
    pub fn normalize(raw: &str) -> Self {
        let lowered = raw.to_ascii_lowercase();
        if lowered.contains("whole") {
            ListingType::Wholesale
        } else if (lowered.contains("grower") || lowered.contains("choice"))
            && !lowered.contains("single")
        {
            ListingType::GrowersChoice
        } else {
            ListingType::Single
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ListingType::Single => "Single",
            ListingType::GrowersChoice => "GrowersChoice",
            ListingType::Wholesale => "Wholesale",
        }
    }
}

/// Coarse height / pot-size tier used to pick a rule entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SizeBucket {
    /// Height up to and including 12 inches.
    #[serde(rename = "<=12")]
    UpTo12In,
    #[serde(rename = ">12")]
    Over12In,
    /// Pot size up to and including 4 inches.
    #[serde(rename = "<=4")]
    UpTo4In,
    #[serde(rename = ">4")]
    Over4In,
}

impl SizeBucket {
    pub fn label(&self) -> &'static str {
        match self {
            SizeBucket::UpTo12In => "<=12",
            SizeBucket::Over12In => ">12",
            SizeBucket::UpTo4In => "<=4",
            SizeBucket::Over4In => ">4",
        }
    }
}

/// The one size figure a listing carries, in inches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SizeMeasure {
    HeightInches(Decimal),
    PotInches(Decimal),
}

impl SizeMeasure {
    pub fn inches(&self) -> Decimal {
        match self {
            SizeMeasure::HeightInches(value) | SizeMeasure::PotInches(value) => *value,
        }
    }
}

/// A purchased line, immutable for the duration of one pricing run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub listing_type: ListingType,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub size: SizeMeasure,
    pub origin_country: String,
    /// Flight date already known for this item (e.g. from a supplier batch).
    #[serde(default, with = "dates::iso_date::option")]
    pub known_flight_date: Option<Date>,
}

impl LineItem {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Builds a line from the storefront's loosely-typed cart row.
    ///
    /// Returns `None` for zero-quantity rows; every other malformed field falls
    /// back to zero rather than failing.
    pub fn from_raw(raw: &RawLineItem) -> Option<Self> {
        if raw.quantity == 0 {
            return None;
        }

        let listing_type = ListingType::normalize(&raw.listing_type);
        let (primary, secondary) = match listing_type {
            ListingType::Single => (&raw.height, &raw.pot_size),
            ListingType::GrowersChoice | ListingType::Wholesale => (&raw.pot_size, &raw.height),
        };
        let inches = primary
            .as_ref()
            .or(secondary.as_ref())
            .map(LooseNumber::to_decimal)
            .unwrap_or(Decimal::ZERO);
        let size = match listing_type {
            ListingType::Single => SizeMeasure::HeightInches(inches),
            ListingType::GrowersChoice | ListingType::Wholesale => SizeMeasure::PotInches(inches),
        };

        Some(Self {
            listing_type,
            quantity: raw.quantity,
            unit_price: raw.unit_price.to_decimal(),
            size,
            origin_country: raw.origin_country.trim().to_ascii_uppercase(),
            known_flight_date: raw
                .flight_date
                .as_deref()
                .and_then(dates::parse_iso),
        })
    }
}

/// Cart row as the storefront sends it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLineItem {
    #[serde(default)]
    pub listing_type: String,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: LooseNumber,
    #[serde(default)]
    pub pot_size: Option<LooseNumber>,
    #[serde(default)]
    pub height: Option<LooseNumber>,
    #[serde(default)]
    pub origin_country: String,
    #[serde(default)]
    pub flight_date: Option<String>,
}

/// A JSON value that should be a number but may arrive as a string.
#[derive(Clone, Debug, PartialEq)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
}

impl Default for LooseNumber {
    fn default() -> Self {
        LooseNumber::Number(0.0)
    }
}

impl LooseNumber {
    pub fn to_decimal(&self) -> Decimal {
        match self {
            LooseNumber::Number(value) => from_f64_lenient(*value),
            LooseNumber::Text(text) => parse_lenient(text),
        }
    }
}

impl Serialize for LooseNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LooseNumber::Number(value) => serializer.serialize_f64(*value),
            LooseNumber::Text(text) => serializer.serialize_str(text),
        }
    }
}

impl<'de> Deserialize<'de> for LooseNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct StringOrNumber;

        impl<'de> serde::de::Visitor<'de> for StringOrNumber {
            type Value = LooseNumber;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or number")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(LooseNumber::Text(value.to_string()))
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(LooseNumber::Text(value))
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(LooseNumber::Number(value))
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(LooseNumber::Number(value as f64))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(LooseNumber::Number(value as f64))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(LooseNumber::default())
            }
        }

        deserializer.deserialize_any(StringOrNumber)
    }
}

/// Status category of an existing shipment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShipmentStatus {
    AwaitingDispatch,
    Dispatched,
    Delivered,
    Cancelled,
    Other,
}

impl ShipmentStatus {
    pub fn categorize(raw: &str) -> Self {
        let lowered = raw.trim().to_ascii_lowercase();
        if lowered.contains("cancel") || lowered.contains("refund") {
            ShipmentStatus::Cancelled
        } else if lowered.contains("deliver") {
            ShipmentStatus::Delivered
        } else if lowered.contains("ship")
            || lowered.contains("transit")
            || lowered.contains("dispatched")
        {
            ShipmentStatus::Dispatched
        } else if lowered.contains("pending")
            || lowered.contains("await")
            || lowered.contains("ready")
            || lowered.contains("processing")
            || lowered.contains("scheduled")
        {
            ShipmentStatus::AwaitingDispatch
        } else {
            ShipmentStatus::Other
        }
    }
}

/// A buyer's existing order shipment as reported by the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct ShipmentRecord {
    pub status: ShipmentStatus,
    pub flight_date: Option<Date>,
    pub created_at: OffsetDateTime,
}

/// Discount result from the validation collaborator. The amount is untrusted
/// and gets re-capped when the summary is computed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedDiscount {
    pub discount_amount: Decimal,
    #[serde(default)]
    pub discount_id: Option<String>,
    #[serde(default)]
    pub discount_kind: Option<String>,
}

/// One stored-credit balance with its all-or-nothing toggle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditToggle {
    pub enabled: bool,
    pub amount: Decimal,
}

impl CreditToggle {
    pub fn new(enabled: bool, amount: Decimal) -> Self {
        Self { enabled, amount }
    }

    pub fn applied(&self) -> Decimal {
        if self.enabled {
            self.amount.max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        }
    }
}

/// The three independent stored-credit types a buyer can spend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredits {
    pub loyalty_points: CreditToggle,
    pub plant_credits: CreditToggle,
    pub shipping_credits: CreditToggle,
}

impl StoredCredits {
    pub fn total_applied(&self) -> Decimal {
        self.loyalty_points.applied()
            + self.plant_credits.applied()
            + self.shipping_credits.applied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use time::macros::date;

    #[rstest]
    #[case("Wholesale", ListingType::Wholesale)]
    #[case("WHOLESALE grower's choice", ListingType::Wholesale)]
    #[case("Grower's Choice", ListingType::GrowersChoice)]
    #[case("choice box", ListingType::GrowersChoice)]
    #[case("Single grower choice", ListingType::Single)]
    #[case("single", ListingType::Single)]
    #[case("mystery", ListingType::Single)]
    #[case("", ListingType::Single)]
    fn listing_type_precedence(#[case] raw: &str, #[case] expected: ListingType) {
        assert_eq!(ListingType::normalize(raw), expected);
    }

    #[rstest]
    #[case("Awaiting Dispatch", ShipmentStatus::AwaitingDispatch)]
    #[case("pending", ShipmentStatus::AwaitingDispatch)]
    #[case("Ready to fly", ShipmentStatus::AwaitingDispatch)]
    #[case("Shipped", ShipmentStatus::Dispatched)]
    #[case("in transit", ShipmentStatus::Dispatched)]
    #[case("Delivered", ShipmentStatus::Delivered)]
    #[case("cancelled", ShipmentStatus::Cancelled)]
    #[case("on hold", ShipmentStatus::Other)]
    fn shipment_status_categories(#[case] raw: &str, #[case] expected: ShipmentStatus) {
        assert_eq!(ShipmentStatus::categorize(raw), expected);
    }

    #[test]
    fn raw_row_parses_loose_fields() {
        let raw: RawLineItem = serde_json::from_str(
            r#"{"listingType":"Grower's Choice","quantity":2,"unitPrice":"19.5",
                "potSize":"4 inch","originCountry":" th ","flightDate":"2026-11-07"}"#,
        )
        .unwrap();
        let item = LineItem::from_raw(&raw).unwrap();
        assert_eq!(item.listing_type, ListingType::GrowersChoice);
        assert_eq!(item.unit_price, dec!(19.5));
        assert_eq!(item.size, SizeMeasure::PotInches(dec!(4)));
        assert_eq!(item.origin_country, "TH");
        assert_eq!(item.known_flight_date, Some(date!(2026 - 11 - 07)));
        assert_eq!(item.line_total(), dec!(39));
    }

    #[test]
    fn raw_row_with_garbage_defaults_to_zero() {
        let json = r#"{
            "listingType": "single",
            "quantity": 1,
            "unitPrice": "free",
            "height": "tall",
            "flightDate": "soon"
        }"#;
        let raw: RawLineItem = serde_json::from_str(json).unwrap();
        let item = LineItem::from_raw(&raw).unwrap();
        assert_eq!(item.unit_price, Decimal::ZERO);
        assert_eq!(item.size, SizeMeasure::HeightInches(Decimal::ZERO));
        assert_eq!(item.known_flight_date, None);
    }

    #[test]
    fn single_falls_back_to_pot_size_when_height_missing() {
        let raw = RawLineItem {
            listing_type: "Single".into(),
            quantity: 1,
            pot_size: Some(LooseNumber::Number(14.0)),
            ..Default::default()
        };
        let item = LineItem::from_raw(&raw).unwrap();
        assert_eq!(item.size, SizeMeasure::HeightInches(dec!(14)));
    }

    #[test]
    fn zero_quantity_rows_are_dropped() {
        let raw = RawLineItem {
            listing_type: "Single".into(),
            quantity: 0,
            ..Default::default()
        };
        assert!(LineItem::from_raw(&raw).is_none());
    }

    #[test]
    fn disabled_credits_are_not_applied() {
        let credits = StoredCredits {
            loyalty_points: CreditToggle::new(true, dec!(10)),
            plant_credits: CreditToggle::new(false, dec!(99)),
            shipping_credits: CreditToggle::new(true, dec!(5.25)),
        };
        assert_eq!(credits.total_applied(), dec!(15.25));
    }
}
