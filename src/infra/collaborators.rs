//! Seams to the remote backend. The session only talks to these traits so the
//! HTTP client can be swapped for fakes in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Date;

use crate::domain::{ActiveDate, RawLineItem, ShipmentRecord, ValidatedDiscount};
use crate::util::dates;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api error: {0}")]
    Api(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveDatesRequest {
    #[serde(with = "dates::iso_date")]
    pub start_date: Date,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveDatesResponse {
    #[serde(default)]
    pub active_dates: Vec<ActiveDate>,
}

/// Who is checking out; scopes the shipment lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuyerContext {
    pub buyer_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountRequest<'a> {
    pub code: &'a str,
    pub cart_snapshot: &'a [RawLineItem],
}

#[async_trait]
pub trait ActiveDatesSource: Send + Sync {
    async fn active_dates(
        &self,
        request: &ActiveDatesRequest,
    ) -> Result<ActiveDatesResponse, CollaboratorError>;
}

#[async_trait]
pub trait ShipmentLookup: Send + Sync {
    /// Shipments whose status falls in `status_filter` (raw backend status names).
    async fn shipments(
        &self,
        buyer: &BuyerContext,
        status_filter: &[&str],
    ) -> Result<Vec<ShipmentRecord>, CollaboratorError>;
}

#[async_trait]
pub trait DiscountValidator: Send + Sync {
    async fn validate(
        &self,
        request: &DiscountRequest<'_>,
    ) -> Result<ValidatedDiscount, CollaboratorError>;
}
