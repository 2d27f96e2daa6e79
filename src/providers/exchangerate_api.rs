use crate::core::currency::{RateLookupError, RatePayload, RateSource};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Rate source backed by the exchangerate-api.com v6 endpoints.
pub struct ExchangeRateApiSource {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl ExchangeRateApiSource {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("fxclose/0.1")
            .timeout(timeout)
            .build()?;
        Ok(ExchangeRateApiSource {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    async fn fetch(
        &self,
        endpoint: &str,
        require_result: bool,
    ) -> Result<RatePayload, RateLookupError> {
        let url = format!("{}/v6/{}/{}", self.base_url, self.api_key, endpoint);
        debug!("Requesting exchange rate from /v6/***/{}", endpoint);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RateLookupError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RateLookupError::RateLimited(status.as_u16()));
        }
        if !status.is_success() {
            return Err(RateLookupError::NotSuccessful(format!("HTTP {status}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| RateLookupError::Transport(e.without_url().to_string()))?;
        let data: ExchangeRateResponse =
            serde_json::from_str(&text).map_err(|e| RateLookupError::Malformed(e.to_string()))?;

        match data.result.as_deref() {
            Some("success") => {}
            None if !require_result => {}
            Some("error") => {
                let error_type = data.error_type.unwrap_or_else(|| "unknown-error".to_string());
                let restricted = matches!(
                    error_type.as_str(),
                    "plan-upgrade-required" | "quota-reached" | "no-data-available"
                );
                return Err(if restricted {
                    RateLookupError::PlanRestricted(error_type)
                } else {
                    RateLookupError::NotSuccessful(error_type)
                });
            }
            other => {
                return Err(RateLookupError::NotSuccessful(format!(
                    "unexpected result {other:?}"
                )));
            }
        }

        Ok(RatePayload {
            success: true,
            rates: data.conversion_rates,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeRateResponse {
    result: Option<String>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    #[serde(default)]
    conversion_rates: HashMap<String, Decimal>,
}

#[async_trait]
impl RateSource for ExchangeRateApiSource {
    #[instrument(name = "HistoricalRateFetch", skip(self))]
    async fn historical_rate(
        &self,
        currency: &str,
        date: NaiveDate,
    ) -> Result<RatePayload, RateLookupError> {
        let endpoint = format!(
            "history/{}/{}/{}/{}",
            currency,
            date.year(),
            date.month(),
            date.day()
        );
        self.fetch(&endpoint, true).await
    }

    #[instrument(name = "LatestRateFetch", skip(self))]
    async fn latest_rate(&self, currency: &str) -> Result<RatePayload, RateLookupError> {
        self.fetch(&format!("latest/{currency}"), false).await
    }
}
