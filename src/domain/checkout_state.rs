//! Inputs of one checkout recomputation and their stable key.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::Date;

use super::entities::{LineItem, RawLineItem, StoredCredits, ValidatedDiscount};
use crate::util::dates;

/// Everything a buyer can change that triggers a new quote.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeInputs {
    pub items: Vec<RawLineItem>,
    #[serde(default, with = "dates::iso_date::option")]
    pub selected_date: Option<Date>,
    #[serde(default)]
    pub credits: StoredCredits,
    #[serde(default)]
    pub discount: Option<ValidatedDiscount>,
    #[serde(default)]
    pub ups_upgrade: bool,
}

impl RecomputeInputs {
    pub fn line_items(&self) -> Vec<LineItem> {
        self.items.iter().filter_map(LineItem::from_raw).collect()
    }

    pub fn requested_discount(&self) -> Option<Decimal> {
        self.discount.as_ref().map(|discount| discount.discount_amount)
    }

    /// Hex SHA-256 over the canonical JSON of these inputs.
    pub fn key(&self) -> RecomputeKey {
        // Struct fields serialise in declaration order, so equal inputs give equal bytes.
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        RecomputeKey(hex::encode(hasher.finalize()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecomputeKey(String);

impl RecomputeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for RecomputeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
