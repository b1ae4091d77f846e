//! Flight lock / cutoff state machine.
//!
//! ```text
//!   no awaiting-dispatch shipment ──────────────► Open
//!   earliest awaiting shipment, flight D:
//!       today <= D - cutoff_days  ──────────────► HardLocked(D)
//!       today >  D - cutoff_days  ──────────────► Open
//!   Open + committed date among candidates ─────► SuggestedOpen(date)
//! ```
//!
//! States are re-derived from scratch whenever shipments or candidates change;
//! nothing here is updated in place.

use serde::Serialize;
use time::{Date, Duration, OffsetDateTime, UtcOffset};

use super::{
    entities::{ShipmentRecord, ShipmentStatus},
    flight_dates::FlightDateOption,
};
use crate::util::dates;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum FlightLockState {
    /// Any candidate may be picked.
    Open,
    /// A known date is pre-selected but the buyer may change it.
    #[serde(rename_all = "camelCase")]
    SuggestedOpen {
        #[serde(with = "dates::iso_date")]
        suggested_date: Date,
    },
    /// Selection disabled; the buyer's existing shipment fixes the date.
    #[serde(rename_all = "camelCase")]
    HardLocked {
        #[serde(with = "dates::iso_date")]
        locked_date: Date,
    },
}

impl FlightLockState {
    pub fn locked_date(&self) -> Option<Date> {
        match self {
            FlightLockState::HardLocked { locked_date } => Some(*locked_date),
            _ => None,
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, FlightLockState::HardLocked { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockPolicy {
    /// Days before a committed flight after which it can no longer be changed.
    pub cutoff_days: i64,
    /// Fixed zone in which "today" is evaluated against the cutoff.
    pub reference_offset: UtcOffset,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            cutoff_days: 7,
            reference_offset: UtcOffset::from_hms(-8, 0, 0).unwrap_or(UtcOffset::UTC),
        }
    }
}

impl LockPolicy {
    /// Last day (inclusive, through 23:59:59 reference time) the flight is editable.
    pub fn cutoff_for(&self, flight_date: Date) -> Date {
        flight_date - Duration::days(self.cutoff_days)
    }

    pub fn reference_today(&self, now: OffsetDateTime) -> Date {
        now.to_offset(self.reference_offset).date()
    }
}

/// Flight date of the earliest-created shipment still awaiting dispatch.
///
/// Records without a readable flight date are skipped.
pub fn committed_flight_date(shipments: &[ShipmentRecord]) -> Option<Date> {
    let awaiting: Vec<&ShipmentRecord> = shipments
        .iter()
        .filter(|shipment| shipment.status == ShipmentStatus::AwaitingDispatch)
        .collect();

    let skipped = awaiting.iter().filter(|shipment| shipment.flight_date.is_none()).count();
    if skipped > 0 {
        tracing::warn!(skipped, "ignoring awaiting-dispatch shipments without a flight date");
    }

    awaiting
        .into_iter()
        .filter(|shipment| shipment.flight_date.is_some())
        .min_by_key(|shipment| shipment.created_at)
        .and_then(|shipment| shipment.flight_date)
}

/// Derives the lock from the buyer's existing shipments. Only `Open` and
/// `HardLocked` come out of this step; suggestions need the candidate list.
pub fn derive_lock_state(
    shipments: &[ShipmentRecord],
    now: OffsetDateTime,
    policy: &LockPolicy,
) -> FlightLockState {
    let Some(flight_date) = committed_flight_date(shipments) else {
        return FlightLockState::Open;
    };

    let today = policy.reference_today(now);
    let cutoff = policy.cutoff_for(flight_date);
    if today > cutoff {
        tracing::debug!(%flight_date, %cutoff, %today, "existing shipment is past its cutoff");
        FlightLockState::Open
    } else {
        FlightLockState::HardLocked {
            locked_date: flight_date,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectableOption {
    #[serde(flatten)]
    pub option: FlightDateOption,
    pub enabled: bool,
    pub selected: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DateSelection {
    /// A lock exists but candidates have not materialised yet; match again later.
    Pending { locked_date: Date },
    Ready {
        state: FlightLockState,
        options: Vec<SelectableOption>,
        selected: Option<Date>,
    },
}

impl DateSelection {
    pub fn selected_date(&self) -> Option<Date> {
        match self {
            DateSelection::Pending { .. } => None,
            DateSelection::Ready { selected, .. } => *selected,
        }
    }

    pub fn needs_candidates(&self) -> bool {
        match self {
            DateSelection::Pending { .. } => true,
            DateSelection::Ready { options, .. } => options.is_empty(),
        }
    }
}

/// Matches a lock state against the candidate list.
///
/// A hard lock extends the list with its date when missing, selects it, and
/// disables everything else. An open state becomes `SuggestedOpen` only when
/// the committed date of an earlier shipment is one of the candidates; that
/// date is pre-selected unless the buyer's own `selected` date is available.
/// A buyer's pick never changes the state by itself.
pub fn resolve_selection(
    state: FlightLockState,
    candidates: Option<&[FlightDateOption]>,
    selected: Option<Date>,
    committed: Option<Date>,
) -> DateSelection {
    match state {
        FlightLockState::HardLocked { locked_date } => {
            let Some(candidates) = candidates else {
                return DateSelection::Pending { locked_date };
            };

            let mut options: Vec<FlightDateOption> = candidates.to_vec();
            if !options.iter().any(|option| option.matches(locked_date)) {
                options.push(FlightDateOption::for_date(locked_date));
                options.sort_by_key(|option| option.date);
            }

            let options = options
                .into_iter()
                .map(|option| {
                    let is_locked = option.matches(locked_date);
                    SelectableOption {
                        option,
                        enabled: is_locked,
                        selected: is_locked,
                    }
                })
                .collect();

            DateSelection::Ready {
                state,
                options,
                selected: Some(locked_date),
            }
        }
        FlightLockState::Open | FlightLockState::SuggestedOpen { .. } => {
            let committed = committed.or(match state {
                FlightLockState::SuggestedOpen { suggested_date } => Some(suggested_date),
                _ => None,
            });
            let candidates = candidates.unwrap_or(&[]);
            let find = |date: Date| {
                candidates
                    .iter()
                    .find(|option| option.matches(date))
                    .map(|option| option.date)
            };

            let suggested = committed.and_then(find);
            let chosen = selected.and_then(find).or(suggested);

            let options = candidates
                .iter()
                .cloned()
                .map(|option| SelectableOption {
                    selected: Some(option.date) == chosen,
                    enabled: true,
                    option,
                })
                .collect();

            DateSelection::Ready {
                state: match suggested {
                    Some(suggested_date) => FlightLockState::SuggestedOpen { suggested_date },
                    None => FlightLockState::Open,
                },
                options,
                selected: chosen,
            }
        }
    }
}
