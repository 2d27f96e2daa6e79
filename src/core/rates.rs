//! Two-tier exchange rate resolution with provenance.
//!
//! A quote is first requested for the exact closing date. When that fails for
//! any reason the latest rate is used instead and the quote is tagged as a
//! fallback. When both tiers fail the quote is tagged `Unavailable` and its
//! numeric rate must not be used: `RateQuote::usable_rate` returns `None`.

use crate::core::currency::{RateLookupError, RatePayload, RateSource};
use crate::core::error::LedgerError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Historical,
    LatestFallback,
    Unavailable,
}

impl Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Provenance::Historical => "historical",
                Provenance::LatestFallback => "latest fallback",
                Provenance::Unavailable => "unavailable",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateQuote {
    pub currency: String,
    pub rate: Decimal,
    pub as_of: NaiveDate,
    pub provenance: Provenance,
    pub note: Option<String>,
}

impl RateQuote {
    pub fn is_available(&self) -> bool {
        self.provenance != Provenance::Unavailable
    }

    /// The rate, unless no tier produced one.
    pub fn usable_rate(&self) -> Option<Decimal> {
        self.is_available().then_some(self.rate)
    }

    /// Converts `amount` into the base currency.
    pub fn convert(&self, amount: Decimal) -> Result<Decimal, LedgerError> {
        self.usable_rate()
            .map(|rate| amount * rate)
            .ok_or_else(|| self.unavailable_error())
    }

    pub fn unavailable_error(&self) -> LedgerError {
        LedgerError::RateUnavailable {
            currency: self.currency.clone(),
            note: self.note.clone().unwrap_or_default(),
        }
    }
}

pub struct RateResolver {
    source: Arc<dyn RateSource>,
    base_currency: String,
}

impl RateResolver {
    pub fn new(source: Arc<dyn RateSource>, base_currency: &str) -> Self {
        Self {
            source,
            base_currency: base_currency.trim().to_uppercase(),
        }
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    /// Resolves the rate of `currency` to the base currency as of `date`.
    ///
    /// Never fails: lookup failures end up in the quote's provenance.
    #[instrument(name = "ResolveRate", skip(self), fields(base = %self.base_currency))]
    pub async fn resolve(&self, currency: &str, date: NaiveDate) -> RateQuote {
        let currency = currency.trim().to_uppercase();
        if currency == self.base_currency {
            debug!("Base currency, no lookup needed");
            return RateQuote {
                currency,
                rate: Decimal::ONE,
                as_of: date,
                provenance: Provenance::Historical,
                note: None,
            };
        }

        let historical = self.source.historical_rate(&currency, date).await;
        let historical_error = match historical.and_then(|p| self.extract(&p)) {
            Ok(rate) => {
                debug!(%rate, "Historical rate found");
                return RateQuote {
                    currency,
                    rate,
                    as_of: date,
                    provenance: Provenance::Historical,
                    note: None,
                };
            }
            Err(e) => e,
        };
        warn!(error = %historical_error, "Historical rate lookup failed, trying latest rate");

        match self
            .source
            .latest_rate(&currency)
            .await
            .and_then(|p| self.extract(&p))
        {
            Ok(rate) => RateQuote {
                currency,
                rate,
                as_of: date,
                provenance: Provenance::LatestFallback,
                note: Some(format!(
                    "stale-rate warning: rate for {date} unavailable ({historical_error}), using latest rate"
                )),
            },
            Err(e) => {
                warn!(error = %e, "Latest rate lookup failed");
                RateQuote {
                    currency,
                    rate: Decimal::ZERO,
                    as_of: date,
                    provenance: Provenance::Unavailable,
                    note: Some(format!("lookup failed: {e}")),
                }
            }
        }
    }

    fn extract(&self, payload: &RatePayload) -> Result<Decimal, RateLookupError> {
        if !payload.success {
            return Err(RateLookupError::NotSuccessful(
                "payload not marked as success".to_string(),
            ));
        }
        let rate = payload
            .rates
            .iter()
            .find(|(code, _)| code.trim().eq_ignore_ascii_case(&self.base_currency))
            .map(|(_, rate)| *rate)
            .ok_or_else(|| RateLookupError::MissingRate(self.base_currency.clone()))?;
        if rate <= Decimal::ZERO {
            return Err(RateLookupError::Malformed(format!(
                "non-positive rate {rate}"
            )));
        }
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockRateSource {
        historical: Result<RatePayload, RateLookupError>,
        latest: Result<RatePayload, RateLookupError>,
        historical_calls: AtomicUsize,
        latest_calls: AtomicUsize,
    }

    impl MockRateSource {
        fn new(
            historical: Result<RatePayload, RateLookupError>,
            latest: Result<RatePayload, RateLookupError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                historical,
                latest,
                historical_calls: AtomicUsize::new(0),
                latest_calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> (usize, usize) {
            (
                self.historical_calls.load(Ordering::SeqCst),
                self.latest_calls.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait]
    impl RateSource for MockRateSource {
        async fn historical_rate(
            &self,
            _currency: &str,
            _date: NaiveDate,
        ) -> Result<RatePayload, RateLookupError> {
            self.historical_calls.fetch_add(1, Ordering::SeqCst);
            self.historical.clone()
        }

        async fn latest_rate(&self, _currency: &str) -> Result<RatePayload, RateLookupError> {
            self.latest_calls.fetch_add(1, Ordering::SeqCst);
            self.latest.clone()
        }
    }

    fn eur(rate: Decimal) -> Result<RatePayload, RateLookupError> {
        Ok(RatePayload::success([("EUR".to_string(), rate)]))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    #[tokio::test]
    async fn test_base_currency_needs_no_lookup() {
        let source = MockRateSource::new(
            Err(RateLookupError::Transport("down".into())),
            Err(RateLookupError::Transport("down".into())),
        );
        let resolver = RateResolver::new(source.clone(), "EUR");

        let quote = resolver.resolve(" eur ", date()).await;
        assert_eq!(quote.rate, Decimal::ONE);
        assert_eq!(quote.provenance, Provenance::Historical);
        assert_eq!(quote.as_of, date());
        assert_eq!(source.calls(), (0, 0));
    }

    #[tokio::test]
    async fn test_historical_rate_used_when_available() {
        let source = MockRateSource::new(eur(dec!(0.9123)), eur(dec!(0.5)));
        let resolver = RateResolver::new(source.clone(), "EUR");

        let quote = resolver.resolve("USD", date()).await;
        assert_eq!(quote.rate, dec!(0.9123));
        assert_eq!(quote.provenance, Provenance::Historical);
        assert!(quote.note.is_none());
        assert_eq!(source.calls(), (1, 0));
    }

    #[tokio::test]
    async fn test_rate_limit_falls_back_to_latest() {
        let source = MockRateSource::new(Err(RateLookupError::RateLimited(403)), eur(dec!(0.85)));
        let resolver = RateResolver::new(source.clone(), "EUR");

        let quote = resolver.resolve("USD", date()).await;
        assert_eq!(quote.rate, dec!(0.85));
        assert_eq!(quote.provenance, Provenance::LatestFallback);
        assert_eq!(quote.as_of, date());
        assert!(quote.note.unwrap().starts_with("stale-rate warning"));
        assert_eq!(source.calls(), (1, 1));
    }

    #[tokio::test]
    async fn test_plan_restriction_is_named_in_the_note() {
        let source = MockRateSource::new(
            Err(RateLookupError::PlanRestricted("plan-upgrade-required".into())),
            eur(dec!(0.85)),
        );

        let quote = RateResolver::new(source, "EUR").resolve("USD", date()).await;
        assert_eq!(quote.provenance, Provenance::LatestFallback);
        let note = quote.note.unwrap();
        assert!(note.contains("plan-upgrade-required"));
        assert!(!note.contains("HTTP"));
    }

    #[tokio::test]
    async fn test_unsuccessful_or_incomplete_payloads_fall_back() {
        let not_success = RatePayload {
            success: false,
            rates: [("EUR".to_string(), dec!(0.9))].into_iter().collect(),
        };
        let source = MockRateSource::new(Ok(not_success), eur(dec!(0.8)));
        let quote = RateResolver::new(source, "EUR").resolve("USD", date()).await;
        assert_eq!(quote.provenance, Provenance::LatestFallback);

        let missing_base = Ok(RatePayload::success([("GBP".to_string(), dec!(0.7))]));
        let source = MockRateSource::new(missing_base, eur(dec!(0.8)));
        let quote = RateResolver::new(source, "EUR").resolve("USD", date()).await;
        assert_eq!(quote.provenance, Provenance::LatestFallback);
        assert_eq!(quote.rate, dec!(0.8));

        let zero = eur(Decimal::ZERO);
        let source = MockRateSource::new(zero, eur(dec!(0.8)));
        let quote = RateResolver::new(source, "EUR").resolve("USD", date()).await;
        assert_eq!(quote.provenance, Provenance::LatestFallback);
    }

    #[tokio::test]
    async fn test_both_tiers_failing_yields_unavailable() {
        let source = MockRateSource::new(
            Err(RateLookupError::RateLimited(403)),
            Err(RateLookupError::Malformed("expected value".into())),
        );
        let resolver = RateResolver::new(source.clone(), "EUR");

        let quote = resolver.resolve("JPY", date()).await;
        assert_eq!(quote.provenance, Provenance::Unavailable);
        assert!(quote.usable_rate().is_none());
        assert!(quote.note.as_deref().unwrap().starts_with("lookup failed"));
        assert!(matches!(
            quote.convert(dec!(100)),
            Err(LedgerError::RateUnavailable { ref currency, .. }) if currency == "JPY"
        ));
        assert_eq!(source.calls(), (1, 1));
    }

    #[tokio::test]
    async fn test_convert_with_available_quote() {
        let source = MockRateSource::new(eur(dec!(0.5)), eur(dec!(0.4)));
        let quote = RateResolver::new(source, "EUR").resolve("USD", date()).await;

        assert_eq!(quote.convert(dec!(30.00)).unwrap(), dec!(15.00));
    }
}
