//! Thin asynchronous client for the storefront backend.
//!
//! - Implements the active-dates, shipment-lookup, and discount-validation seams.
//! - Keeps active-date lists in a small in-memory cache with stale fallbacks.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Deserialize};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;

use super::collaborators::{
    ActiveDatesRequest, ActiveDatesResponse, ActiveDatesSource, BuyerContext, CollaboratorError,
    DiscountRequest, DiscountValidator, ShipmentLookup,
};
use crate::domain::{
    ActiveDate, LooseNumber, ShipmentRecord, ShipmentStatus, ValidatedDiscount,
};
use crate::util::{dates, version};

pub const DEFAULT_BASE_URL: &str = "https://api.example-plants.shop/v1/";
const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    Fresh,
    Cached,
    Stale,
}

#[derive(Clone, Debug)]
pub struct CachedPayload<T> {
    pub data: T,
    pub fetched_at: SystemTime,
    pub status: CacheStatus,
}

impl<T> CachedPayload<T> {
    fn new(data: T, fetched_at: SystemTime, status: CacheStatus) -> Self {
        Self {
            data,
            fetched_at,
            status,
        }
    }
}

#[derive(Default)]
struct StorefrontCache {
    active_dates: HashMap<(Date, usize), Cached<Vec<ActiveDate>>>,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct StorefrontClient {
    http: Client,
    base_url: Url,
    cache: Arc<Mutex<StorefrontCache>>,
    ttl: Duration,
}

impl StorefrontClient {
    pub fn new() -> Result<Self, CollaboratorError> {
        Self::with_base_url(DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_base_url(base: &str, timeout: Duration) -> Result<Self, CollaboratorError> {
        let base_url = Url::parse(base)?;
        let http = Client::builder()
            .user_agent(version::user_agent())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url,
            cache: Arc::new(Mutex::new(StorefrontCache::default())),
            ttl: DEFAULT_TTL,
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Active flight dates from the scheduling endpoint, cached per request.
    pub async fn get_active_dates(
        &self,
        request: &ActiveDatesRequest,
    ) -> Result<CachedPayload<Vec<ActiveDate>>, CollaboratorError> {
        let cache_key = (request.start_date, request.count);
        if let Some(payload) = self.cached_active_dates(&cache_key).await {
            return Ok(payload);
        }

        let mut url = self.url("flights/active-dates")?;
        url.query_pairs_mut()
            .append_pair("startDate", &dates::iso(request.start_date))
            .append_pair("count", &request.count.to_string());

        match self
            .fetch_data::<ActiveDatesResponse>(self.http.get(url.clone()))
            .await
        {
            Ok(response) => {
                tracing::debug!(
                    %url,
                    entries = response.active_dates.len(),
                    "loaded active flight dates"
                );
                Ok(self
                    .store_active_dates(cache_key, response.active_dates, CacheStatus::Fresh)
                    .await)
            }
            Err(error) => {
                if let Some(stale) = self.cached_active_dates_stale(&cache_key).await {
                    tracing::warn!(
                        %url,
                        %error,
                        "active dates request failed; serving stale cache"
                    );
                    return Ok(stale);
                }
                Err(error)
            }
        }
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.active_dates.clear();
    }

    async fn cached_active_dates(
        &self,
        key: &(Date, usize),
    ) -> Option<CachedPayload<Vec<ActiveDate>>> {
        let cache = self.cache.lock().await;
        let result = cache
            .active_dates
            .get(key)
            .and_then(|entry| entry.if_fresh(self.ttl));
        if result.is_some() {
            tracing::debug!(start_date = %key.0, "serving cached active dates");
        }
        result
    }

    async fn cached_active_dates_stale(
        &self,
        key: &(Date, usize),
    ) -> Option<CachedPayload<Vec<ActiveDate>>> {
        let cache = self.cache.lock().await;
        cache.active_dates.get(key).map(Cached::stale)
    }

    /// Stores a fresh list and evicts every entry past its TTL.
    async fn store_active_dates(
        &self,
        key: (Date, usize),
        data: Vec<ActiveDate>,
        status: CacheStatus,
    ) -> CachedPayload<Vec<ActiveDate>> {
        let fetched_at = SystemTime::now();
        let payload = CachedPayload::new(data.clone(), fetched_at, status);
        let mut cache = self.cache.lock().await;
        let before = cache.active_dates.len();
        cache.active_dates.retain(|_, entry| entry.is_fresh(self.ttl));
        let evicted = before - cache.active_dates.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted expired active date lists");
        }
        cache
            .active_dates
            .insert(key, Cached::new(data, fetched_at));
        payload
    }

    async fn fetch_data<T>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, CollaboratorError>
    where
        T: DeserializeOwned,
    {
        let response = builder.send().await?.error_for_status()?;
        let envelope: ApiEnvelope<T> = response.json().await?;
        let ApiEnvelope {
            status,
            data,
            message,
        } = envelope;

        if status.eq_ignore_ascii_case("ok") {
            data.ok_or_else(|| CollaboratorError::Api("response missing data".into()))
        } else {
            Err(CollaboratorError::Api(message.unwrap_or(status)))
        }
    }

    fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }

    /// `buyers/{id}/shipments`, with the id encoded as a single path segment.
    fn shipments_url(&self, buyer_id: &str) -> Result<Url, CollaboratorError> {
        if matches!(buyer_id, "" | "." | "..") {
            return Err(CollaboratorError::Api(format!("invalid buyer id {buyer_id:?}")));
        }
        let mut url = self.url("buyers")?;
        url.path_segments_mut()
            .map_err(|()| CollaboratorError::Api("base url cannot carry a path".into()))?
            .push(buyer_id)
            .push("shipments");
        Ok(url)
    }
}

#[async_trait]
impl ActiveDatesSource for StorefrontClient {
    async fn active_dates(
        &self,
        request: &ActiveDatesRequest,
    ) -> Result<ActiveDatesResponse, CollaboratorError> {
        let payload = self.get_active_dates(request).await?;
        Ok(ActiveDatesResponse {
            active_dates: payload.data,
        })
    }
}

#[async_trait]
impl ShipmentLookup for StorefrontClient {
    async fn shipments(
        &self,
        buyer: &BuyerContext,
        status_filter: &[&str],
    ) -> Result<Vec<ShipmentRecord>, CollaboratorError> {
        let mut url = self.shipments_url(&buyer.buyer_id)?;
        if !status_filter.is_empty() {
            url.query_pairs_mut()
                .append_pair("status", &status_filter.join(","));
        }

        let dtos: Vec<ShipmentDto> = self.fetch_data(self.http.get(url)).await?;
        Ok(dtos.into_iter().map(ShipmentRecord::from).collect())
    }
}

#[async_trait]
impl DiscountValidator for StorefrontClient {
    async fn validate(
        &self,
        request: &DiscountRequest<'_>,
    ) -> Result<ValidatedDiscount, CollaboratorError> {
        let url = self.url("discounts/validate")?;
        let dto: DiscountDto = self
            .fetch_data(self.http.post(url).json(request))
            .await?;
        Ok(ValidatedDiscount::from(dto))
    }
}

struct Cached<T> {
    value: T,
    fetched_at: SystemTime,
}

impl<T: Clone> Cached<T> {
    fn new(value: T, fetched_at: SystemTime) -> Self {
        Self { value, fetched_at }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at
            .elapsed()
            .map(|elapsed| elapsed <= ttl)
            .unwrap_or(false)
    }

    fn if_fresh(&self, ttl: Duration) -> Option<CachedPayload<T>> {
        if self.is_fresh(ttl) {
            Some(CachedPayload::new(
                self.value.clone(),
                self.fetched_at,
                CacheStatus::Cached,
            ))
        } else {
            None
        }
    }

    fn stale(&self) -> CachedPayload<T> {
        CachedPayload::new(self.value.clone(), self.fetched_at, CacheStatus::Stale)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShipmentDto {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, alias = "flight_date")]
    flight_date: Option<String>,
    #[serde(default, alias = "created_at")]
    created_at: Option<String>,
}

impl From<ShipmentDto> for ShipmentRecord {
    fn from(dto: ShipmentDto) -> Self {
        Self {
            status: ShipmentStatus::categorize(dto.status.as_deref().unwrap_or_default()),
            flight_date: dto.flight_date.as_deref().and_then(dates::parse_iso),
            created_at: parse_timestamp_str(dto.created_at.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscountDto {
    #[serde(default)]
    discount_amount: LooseNumber,
    #[serde(default, deserialize_with = "optional_string_from_json")]
    discount_id: Option<String>,
    #[serde(default)]
    discount_kind: Option<String>,
}

impl From<DiscountDto> for ValidatedDiscount {
    fn from(dto: DiscountDto) -> Self {
        Self {
            discount_amount: dto.discount_amount.to_decimal(),
            discount_id: dto.discount_id,
            discount_kind: dto.discount_kind,
        }
    }
}

/// Missing or malformed timestamps count as "just created" so they never win
/// the earliest-created comparison.
fn parse_timestamp_str(raw: Option<&str>) -> OffsetDateTime {
    raw.and_then(|value| OffsetDateTime::parse(value.trim(), &Rfc3339).ok())
        .unwrap_or_else(OffsetDateTime::now_utc)
}

fn optional_string_from_json<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<LooseNumber>::deserialize(deserializer)?;
    Ok(raw.map(|value| match value {
        LooseNumber::Text(text) => text,
        LooseNumber::Number(number) if number.fract() == 0.0 => format!("{}", number as i64),
        LooseNumber::Number(number) => number.to_string(),
    }))
}
