//! Candidate flight (shipment) Saturdays.
//!
//! Flights leave on Saturdays. The first candidate is an anchor Saturday chosen
//! from the locked date, the items' origin, and any flight dates already known
//! for the items; the rest follow weekly.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::{Date, Duration, Weekday};

use super::entities::LineItem;
use crate::util::dates;

/// One selectable shipment date.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightDateOption {
    #[serde(skip)]
    pub date: Date,
    pub iso_date: String,
    pub display_label: String,
    pub normalized_key: String,
}

impl FlightDateOption {
    pub fn for_date(date: Date) -> Self {
        Self {
            date,
            iso_date: dates::iso(date),
            display_label: dates::display_label(date),
            normalized_key: dates::month_day_key(date),
        }
    }

    /// Exact calendar match; the month-day key alone would accept a stale year.
    pub fn matches(&self, date: Date) -> bool {
        self.date == date
    }
}

/// An entry of the scheduling service's active-date list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveDate {
    pub iso: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidatePolicy {
    /// Origin country whose carts ship on the fast corridor.
    pub fast_corridor_country: String,
    /// Minimum days between today and a fast-corridor flight.
    pub fast_corridor_lead_days: i64,
    pub candidate_count: usize,
}

impl Default for CandidatePolicy {
    fn default() -> Self {
        Self {
            fast_corridor_country: "TH".to_string(),
            fast_corridor_lead_days: 7,
            candidate_count: 3,
        }
    }
}

impl CandidatePolicy {
    pub fn is_fast_corridor(&self, items: &[LineItem]) -> bool {
        !items.is_empty()
            && items
                .iter()
                .all(|item| item.origin_country.eq_ignore_ascii_case(&self.fast_corridor_country))
    }
}

fn latest_known_flight_date(items: &[LineItem]) -> Option<Date> {
    items.iter().filter_map(|item| item.known_flight_date).max()
}

/// First candidate Saturday.
///
/// - locked date: the Saturday on/after it;
/// - all items from the fast corridor: Saturday on/after
///   `max(today + lead days, latest known item flight date)`;
/// - otherwise: Saturday on/after the latest known item flight date, or today.
pub fn anchor_date(
    items: &[LineItem],
    locked_date: Option<Date>,
    today: Date,
    policy: &CandidatePolicy,
) -> Date {
    if let Some(locked) = locked_date {
        return dates::saturday_on_or_after(locked);
    }

    let latest_known = latest_known_flight_date(items);
    let start = if policy.is_fast_corridor(items) {
        let earliest = today + Duration::days(policy.fast_corridor_lead_days);
        latest_known.map_or(earliest, |known| known.max(earliest))
    } else {
        latest_known.unwrap_or(today)
    };

    dates::saturday_on_or_after(start)
}

/// `count` consecutive Saturdays starting at the anchor's Saturday.
pub fn weekly_candidates(anchor: Date, count: usize) -> Vec<FlightDateOption> {
    let first = dates::saturday_on_or_after(anchor);
    (0..count)
        .map(|week| FlightDateOption::for_date(first + Duration::weeks(week as i64)))
        .collect()
}

/// Local generation, used directly and as the fallback when the scheduling
/// service is unavailable.
pub fn local_candidates(
    items: &[LineItem],
    locked_date: Option<Date>,
    today: Date,
    policy: &CandidatePolicy,
) -> Vec<FlightDateOption> {
    weekly_candidates(
        anchor_date(items, locked_date, today, policy),
        policy.candidate_count,
    )
}

/// Turns a remote active-date list into candidates.
///
/// Entries that fail to parse, are not Saturdays, or fall before the anchor are
/// dropped; labels and keys are rebuilt from the date. Returns `None` when
/// nothing usable is left so the caller falls back to local generation.
pub fn candidates_from_active(
    active: &[ActiveDate],
    anchor: Date,
    count: usize,
) -> Option<Vec<FlightDateOption>> {
    let usable: BTreeSet<Date> = active
        .iter()
        .filter_map(|entry| dates::parse_iso(&entry.iso))
        .filter(|date| date.weekday() == Weekday::Saturday && *date >= anchor)
        .collect();

    if usable.is_empty() {
        return None;
    }

    Some(
        usable
            .into_iter()
            .take(count)
            .map(FlightDateOption::for_date)
            .collect(),
    )
}
