//! Checkout session: the I/O shell around the pricing and scheduling kernel.
//!
//! Every recomputation loads the buyer's shipments, derives the flight lock,
//! builds flight candidates (remote first, local fallback), and prices the cart.
//! Remote calls are bounded by the configured timeout and never fail a quote.

use std::{future::Future, sync::Arc, time::Duration};

use serde::{Serialize, Serializer};
use time::{Date, OffsetDateTime};
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    domain::{
        anchor_date, candidates_from_active, cart_subtotal, committed_flight_date,
        compute_grouped_shipping_with, compute_order_summary, derive_lock_state, flight_order_for,
        local_candidates, resolve_selection, CandidatePolicy, DateSelection, FlightDateOption,
        FlightLockState, FlightOrder, LineItem, LockPolicy, OrderSummary, PricingError,
        PromoPolicy, RawLineItem, RecomputeInputs, RuleTable, SelectableOption, ShipmentRecord,
        ShippingResult, SummaryInput, SummaryPolicy, ValidatedDiscount,
    },
    infra::{
        ActiveDatesRequest, ActiveDatesSource, Admission, BuyerContext, Coalescer,
        CollaboratorError, DiscountRequest, DiscountValidator, ShipmentLookup, StorefrontClient,
    },
    util::{dates, persistence::CheckoutConfig},
};

/// Backend status names that can still affect the lock or the flight order.
pub const LIVE_SHIPMENT_STATUSES: &[&str] = &[
    "pending",
    "awaiting_dispatch",
    "processing",
    "scheduled",
    "ready",
    "shipped",
    "in_transit",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CandidateSource {
    Remote,
    Local,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedOrder {
    pub shipping: ShippingResult,
    pub summary: OrderSummary,
}

/// Everything the checkout page needs after one recomputation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub request_id: String,
    pub key: String,
    pub lock_state: FlightLockState,
    pub candidate_source: CandidateSource,
    pub options: Vec<SelectableOption>,
    #[serde(with = "dates::iso_date::option")]
    pub selected_date: Option<Date>,
    pub flight_order: FlightOrder,
    #[serde(serialize_with = "serialize_pricing")]
    pub pricing: Result<PricedOrder, PricingError>,
}

impl Quote {
    pub fn is_payable(&self) -> bool {
        self.pricing.is_ok()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RecomputeOutcome {
    Completed(Box<Quote>),
    /// Identical inputs were already being recomputed.
    Duplicate,
    /// Newer inputs arrived while this one ran; its result was dropped.
    Superseded,
}

#[derive(Clone)]
pub struct CheckoutSession {
    active_dates: Arc<dyn ActiveDatesSource>,
    shipments: Arc<dyn ShipmentLookup>,
    discounts: Arc<dyn DiscountValidator>,
    coalescer: Coalescer,
    request_timeout: Duration,
    rules: RuleTable,
    promo: PromoPolicy,
    summary: SummaryPolicy,
    candidates: CandidatePolicy,
    lock: LockPolicy,
}

impl CheckoutSession {
    pub fn new(
        config: &CheckoutConfig,
        active_dates: Arc<dyn ActiveDatesSource>,
        shipments: Arc<dyn ShipmentLookup>,
        discounts: Arc<dyn DiscountValidator>,
    ) -> Self {
        Self {
            active_dates,
            shipments,
            discounts,
            coalescer: Coalescer::new(),
            request_timeout: config.request_timeout(),
            rules: RuleTable::standard().clone(),
            promo: config.promo_policy(),
            summary: config.summary_policy(),
            candidates: config.candidate_policy(),
            lock: config.lock_policy(),
        }
    }

    /// Session backed by the storefront HTTP client for all three collaborators.
    pub fn with_storefront(config: &CheckoutConfig) -> Result<Self, CollaboratorError> {
        let client = Arc::new(
            StorefrontClient::with_base_url(&config.api_base_url, config.request_timeout())?
                .with_ttl(config.active_dates_ttl()),
        );
        Ok(Self::new(config, client.clone(), client.clone(), client))
    }

    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    pub async fn recompute(
        &self,
        inputs: &RecomputeInputs,
        buyer: &BuyerContext,
        now: OffsetDateTime,
    ) -> RecomputeOutcome {
        let key = inputs.key();
        let ticket = match self.coalescer.admit(key.clone()) {
            Admission::Started(ticket) => ticket,
            Admission::Duplicate => return RecomputeOutcome::Duplicate,
        };

        let request_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("recompute", request_id = %request_id, key = key.short());
        let quote = self
            .build_quote(inputs, buyer, now, request_id, key.to_string())
            .instrument(span)
            .await;

        if self.coalescer.finish(ticket) {
            RecomputeOutcome::Completed(Box::new(quote))
        } else {
            RecomputeOutcome::Superseded
        }
    }

    /// Bounded pass-through to the discount collaborator. The returned amount is
    /// re-capped when the summary is computed.
    pub async fn validate_discount(
        &self,
        code: &str,
        items: &[RawLineItem],
    ) -> Result<ValidatedDiscount, CollaboratorError> {
        let request = DiscountRequest {
            code,
            cart_snapshot: items,
        };
        let result = self.bounded(self.discounts.validate(&request)).await;
        if let Err(err) = &result {
            tracing::warn!(%err, "discount validation failed");
        }
        result
    }

    async fn build_quote(
        &self,
        inputs: &RecomputeInputs,
        buyer: &BuyerContext,
        now: OffsetDateTime,
        request_id: String,
        key: String,
    ) -> Quote {
        let items = inputs.line_items();
        let shipments = self.load_shipments(buyer).await;

        let state = derive_lock_state(&shipments, now, &self.lock);
        let today = self.lock.reference_today(now);
        let (candidate_source, candidates) =
            self.load_candidates(&items, state.locked_date(), today).await;

        let committed = committed_flight_date(&shipments);
        let (lock_state, options, selected_date) = match resolve_selection(
            state,
            Some(candidates.as_slice()),
            inputs.selected_date,
            committed,
        ) {
            DateSelection::Ready {
                state,
                options,
                selected,
            } => (state, options, selected),
            DateSelection::Pending { locked_date } => {
                tracing::info!(%locked_date, "lock matching deferred; no candidates yet");
                (state, Vec::new(), None)
            }
        };

        let flight_order = selected_date
            .map(|date| flight_order_for(date, &shipments))
            .unwrap_or_default();
        let pricing = self.price(&items, inputs, selected_date, flight_order);
        match &pricing {
            Ok(priced) => tracing::debug!(total = %priced.summary.final_total, "quote priced"),
            Err(PricingError::CannotPrice(reason)) => {
                tracing::info!(?reason, "checkout blocked")
            }
            Err(err @ PricingError::InvariantViolation(_)) => tracing::error!(%err),
        }

        Quote {
            request_id,
            key,
            lock_state,
            candidate_source,
            options,
            selected_date,
            flight_order,
            pricing,
        }
    }

    fn price(
        &self,
        items: &[LineItem],
        inputs: &RecomputeInputs,
        selected_date: Option<Date>,
        flight_order: FlightOrder,
    ) -> Result<PricedOrder, PricingError> {
        let shipping = compute_grouped_shipping_with(items, &self.rules, &self.promo)?;
        let summary = compute_order_summary(
            &SummaryInput {
                subtotal: cart_subtotal(items),
                shipping: &shipping,
                requested_discount: inputs.requested_discount(),
                credits: inputs.credits,
                ups_upgrade: inputs.ups_upgrade,
                flight_date: selected_date,
                flight_order,
            },
            &self.summary,
        )?;
        Ok(PricedOrder { shipping, summary })
    }

    /// Unavailable lookups count as "no shipments known", which leaves the lock open.
    async fn load_shipments(&self, buyer: &BuyerContext) -> Vec<ShipmentRecord> {
        match self
            .bounded(self.shipments.shipments(buyer, LIVE_SHIPMENT_STATUSES))
            .await
        {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(
                    buyer = %buyer.buyer_id,
                    %err,
                    "shipment lookup failed; lock stays open"
                );
                Vec::new()
            }
        }
    }

    async fn load_candidates(
        &self,
        items: &[LineItem],
        locked_date: Option<Date>,
        today: Date,
    ) -> (CandidateSource, Vec<FlightDateOption>) {
        let anchor = anchor_date(items, locked_date, today, &self.candidates);
        let count = self.candidates.candidate_count;
        let request = ActiveDatesRequest {
            start_date: anchor,
            count,
        };

        match self.bounded(self.active_dates.active_dates(&request)).await {
            Ok(response) => {
                if let Some(options) = candidates_from_active(&response.active_dates, anchor, count)
                {
                    return (CandidateSource::Remote, options);
                }
                tracing::info!(%anchor, "no usable active dates; generating locally");
            }
            Err(err) => {
                tracing::warn!(%anchor, %err, "active dates unavailable; generating locally");
            }
        }

        (
            CandidateSource::Local,
            local_candidates(items, locked_date, today, &self.candidates),
        )
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, CollaboratorError>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| CollaboratorError::Timeout(self.request_timeout))?
    }
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
enum PricingView<'a> {
    Priced(&'a PricedOrder),
    CannotPrice { reason: String },
}

fn serialize_pricing<S: Serializer>(
    pricing: &Result<PricedOrder, PricingError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match pricing {
        Ok(priced) => PricingView::Priced(priced).serialize(serializer),
        Err(err) => PricingView::CannotPrice {
            reason: err.to_string(),
        }
        .serialize(serializer),
    }
}
