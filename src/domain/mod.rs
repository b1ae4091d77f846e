//! Checkout pricing and flight scheduling kernel. Everything in here is pure:
//! no I/O, and "now" is always passed in.

pub mod checkout_state;
pub mod classify;
pub mod entities;
pub mod flight_dates;
pub mod flight_lock;
pub mod rules;
pub mod shipping;
pub mod summary;

pub use checkout_state::{RecomputeInputs, RecomputeKey};
pub use classify::{classify, classify_raw, size_bucket, GroupKey};
pub use entities::{
    CreditToggle, LineItem, ListingType, LooseNumber, RawLineItem, ShipmentRecord, ShipmentStatus,
    SizeBucket, SizeMeasure, StoredCredits, ValidatedDiscount,
};
pub use flight_dates::{
    anchor_date, candidates_from_active, local_candidates, weekly_candidates, ActiveDate,
    CandidatePolicy, FlightDateOption,
};
pub use flight_lock::{
    committed_flight_date, derive_lock_state, resolve_selection, DateSelection, FlightLockState,
    LockPolicy, SelectableOption,
};
pub use rules::{RuleEntry, RuleTable};
pub use shipping::{
    cart_subtotal, compute_grouped_shipping, compute_grouped_shipping_with, group_items,
    CannotPriceReason, Group, GroupCharge, PricingError, PromoPolicy, ShippingResult,
};
pub use summary::{
    compute_order_summary, flight_order_for, FlightOrder, OrderSummary, SummaryInput,
    SummaryPolicy,
};
