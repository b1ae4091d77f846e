pub mod coalesce;
pub mod collaborators;
pub mod storefront;

pub use coalesce::{Admission, Coalescer, Ticket};
pub use collaborators::{
    ActiveDatesRequest, ActiveDatesResponse, ActiveDatesSource, BuyerContext, CollaboratorError,
    DiscountRequest, DiscountValidator, ShipmentLookup,
};
pub use storefront::{CacheStatus, CachedPayload, StorefrontClient};
