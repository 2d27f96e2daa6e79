//! Exchange rate source abstractions

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

/// What a rate source answered for one currency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatePayload {
    pub success: bool,
    /// Units of the keyed currency for one unit of the requested currency.
    pub rates: HashMap<String, Decimal>,
}

impl RatePayload {
    pub fn success(rates: impl IntoIterator<Item = (String, Decimal)>) -> Self {
        Self {
            success: true,
            rates: rates.into_iter().collect(),
        }
    }
}

/// Why a single lookup tier failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLookupError {
    #[error("rate limited (HTTP {0})")]
    RateLimited(u16),

    /// The service answered but refused the lookup for this plan or quota.
    #[error("plan restriction reported by rate service: {0}")]
    PlanRestricted(String),

    #[error("rate service reported failure: {0}")]
    NotSuccessful(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("malformed rate payload: {0}")]
    Malformed(String),

    #[error("no {0} rate in payload")]
    MissingRate(String),
}

#[async_trait]
pub trait RateSource: Send + Sync {
    /// Rate of `currency` as of `date`.
    async fn historical_rate(
        &self,
        currency: &str,
        date: NaiveDate,
    ) -> Result<RatePayload, RateLookupError>;

    /// Most recent rate of `currency`, whatever its date.
    async fn latest_rate(&self, currency: &str) -> Result<RatePayload, RateLookupError>;
}
