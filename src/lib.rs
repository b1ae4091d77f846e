pub mod app;
pub mod domain;
pub mod infra;
pub mod util;

pub use app::{CandidateSource, CheckoutSession, PricedOrder, Quote, RecomputeOutcome};
pub use util::persistence::{load_config, CheckoutConfig};
