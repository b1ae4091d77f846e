//! Calendar helpers shared by the flight-date code and the wire formats.

use serde::{Deserialize, Deserializer, Serializer};
use time::{macros::format_description, Date, Duration, Weekday};

/// Formats a date as `YYYY-MM-DD`.
pub fn iso(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

/// Parses `YYYY-MM-DD`, also accepting a full timestamp by reading its date part.
pub fn parse_iso(raw: &str) -> Option<Date> {
    let trimmed = raw.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    Date::parse(date_part, format_description!("[year]-[month]-[day]")).ok()
}

/// Month-day key used to match against externally supplied date lists.
pub fn month_day_key(date: Date) -> String {
    format!("{:02}-{:02}", u8::from(date.month()), date.day())
}

/// Short human label, e.g. `Sat, Oct 24`.
pub fn display_label(date: Date) -> String {
    date.format(format_description!(
        "[weekday repr:short], [month repr:short] [day padding:none]"
    ))
    .unwrap_or_else(|_| iso(date))
}

/// The given date if it is a Saturday, otherwise the following Saturday.
pub fn saturday_on_or_after(date: Date) -> Date {
    let from_monday = i64::from(date.weekday().number_days_from_monday());
    let saturday = i64::from(Weekday::Saturday.number_days_from_monday());
    date + Duration::days((saturday - from_monday).rem_euclid(7))
}

pub mod iso_date {
    use super::*;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&iso(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_iso(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date: {raw}")))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            date: &Option<Date>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => serializer.serialize_some(&iso(*date)),
                None => serializer.serialize_none(),
            }
        }

        /// Unparseable dates read as `None`; a bad hint must not fail the cart.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Date>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            Ok(raw.as_deref().and_then(parse_iso))
        }
    }
}
