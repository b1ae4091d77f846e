use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;
use time::UtcOffset;

use crate::domain::{CandidatePolicy, LockPolicy, PromoPolicy, SummaryPolicy};
use crate::infra::storefront::DEFAULT_BASE_URL;

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "FlightCheckout";
const APP_NAME: &str = "FlightCheckout";

pub const CONFIG_PATH_ENV: &str = "FLIGHT_CHECKOUT_CONFIG";

/// Tunables for pricing, scheduling, and the storefront backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub active_dates_ttl_secs: u64,
    pub minimum_charge: Decimal,
    pub ups_surcharge_rate: Decimal,
    pub promo_min_quantity: u32,
    pub promo_min_subtotal: Decimal,
    pub fast_corridor_country: String,
    pub fast_corridor_lead_days: i64,
    pub cutoff_days: i64,
    pub reference_utc_offset_minutes: i32,
    pub candidate_count: usize,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        let summary = SummaryPolicy::default();
        let promo = PromoPolicy::default();
        let candidates = CandidatePolicy::default();
        let lock = LockPolicy::default();
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 4_000,
            active_dates_ttl_secs: 15 * 60,
            minimum_charge: summary.minimum_charge,
            ups_surcharge_rate: summary.ups_surcharge_rate,
            promo_min_quantity: promo.min_quantity,
            promo_min_subtotal: promo.min_subtotal,
            fast_corridor_country: candidates.fast_corridor_country,
            fast_corridor_lead_days: candidates.fast_corridor_lead_days,
            cutoff_days: lock.cutoff_days,
            reference_utc_offset_minutes: i32::from(lock.reference_offset.whole_minutes()),
            candidate_count: candidates.candidate_count,
        }
    }
}

impl CheckoutConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn active_dates_ttl(&self) -> Duration {
        Duration::from_secs(self.active_dates_ttl_secs)
    }

    pub fn summary_policy(&self) -> SummaryPolicy {
        SummaryPolicy {
            minimum_charge: self.minimum_charge,
            ups_surcharge_rate: self.ups_surcharge_rate,
        }
    }

    pub fn promo_policy(&self) -> PromoPolicy {
        PromoPolicy {
            min_quantity: self.promo_min_quantity,
            min_subtotal: self.promo_min_subtotal,
        }
    }

    pub fn candidate_policy(&self) -> CandidatePolicy {
        CandidatePolicy {
            fast_corridor_country: self.fast_corridor_country.trim().to_ascii_uppercase(),
            fast_corridor_lead_days: self.fast_corridor_lead_days,
            candidate_count: self.candidate_count,
        }
    }

    /// Out-of-range offsets fall back to the default reference zone.
    pub fn lock_policy(&self) -> LockPolicy {
        let default = LockPolicy::default();
        let seconds = self.reference_utc_offset_minutes.saturating_mul(60);
        let offset = UtcOffset::from_whole_seconds(seconds).unwrap_or_else(|_| {
            tracing::warn!(
                minutes = self.reference_utc_offset_minutes,
                "reference offset out of range; using default"
            );
            default.reference_offset
        });
        LockPolicy {
            cutoff_days: self.cutoff_days,
            reference_offset: offset,
        }
    }
}

fn config_file() -> Option<PathBuf> {
    if let Some(explicit) = env::var_os(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(explicit));
    }
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME)
        .map(|dirs| dirs.config_dir().join("config.json"))
}

/// Loads the config, falling back to defaults when it is missing or unreadable.
pub fn load_config() -> CheckoutConfig {
    match config_file() {
        Some(path) => load_config_from(&path),
        None => CheckoutConfig::default(),
    }
}

pub fn load_config_from(path: &Path) -> CheckoutConfig {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return CheckoutConfig::default(),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "failed to read config; using defaults");
            return CheckoutConfig::default();
        }
    };
    serde_json::from_str(&data).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), %err, "failed to parse config; using defaults");
        CheckoutConfig::default()
    })
}

pub fn save_config(config: &CheckoutConfig) -> Result<PathBuf, ConfigError> {
    let path = config_file().ok_or(ConfigError::StorageUnavailable)?;
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &CheckoutConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("storage directory unavailable")]
    StorageUnavailable,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] SerdeError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn scratch_dir(name: &str) -> PathBuf {
        env::temp_dir().join(format!("flight-checkout-{name}-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn defaults_match_pricing_policies() {
        let config = CheckoutConfig::default();
        assert_eq!(config.minimum_charge, dec!(0.50));
        assert_eq!(config.ups_surcharge_rate, dec!(0.6));
        assert_eq!(config.promo_min_quantity, 15);
        assert_eq!(config.promo_min_subtotal, dec!(500));
        assert_eq!(config.reference_utc_offset_minutes, -480);
        assert_eq!(config.lock_policy(), LockPolicy::default());
        assert_eq!(config.candidate_policy(), CandidatePolicy::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(4));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let raw = r#"{"cutoff_days": 5, "fast_corridor_country": " th "}"#;
        let config: CheckoutConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.cutoff_days, 5);
        assert_eq!(config.candidate_policy().fast_corridor_country, "TH");
        assert_eq!(config.candidate_count, 3);
    }

    #[test]
    fn out_of_range_offset_uses_default_zone() {
        let config = CheckoutConfig {
            reference_utc_offset_minutes: 60 * 30,
            ..CheckoutConfig::default()
        };
        let default_zone = LockPolicy::default().reference_offset;
        assert_eq!(config.lock_policy().reference_offset, default_zone);
    }

    #[test]
    fn save_then_load_from_disk() {
        let dir = scratch_dir("save");
        let path = dir.join("nested").join("config.json");
        let config = CheckoutConfig {
            request_timeout_ms: 250,
            ..CheckoutConfig::default()
        };
        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path), config);
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn missing_or_broken_files_fall_back() {
        let dir = scratch_dir("broken");
        assert_eq!(load_config_from(&dir.join("absent.json")), CheckoutConfig::default());

        fs::create_dir_all(&dir).unwrap();
        let broken = dir.join("config.json");
        fs::write(&broken, "{not json").unwrap();
        assert_eq!(load_config_from(&broken), CheckoutConfig::default());
        fs::remove_dir_all(dir).ok();
    }
}
