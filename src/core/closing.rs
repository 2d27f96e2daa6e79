//! One closing cycle: configuration, country selection, rate, totals.
use crate::core::cache::{ConfigCache, Snapshot};
use crate::core::error::{LedgerError, Result};
use crate::core::ledger::{Aggregates, LedgerEntry, aggregate};
use crate::core::rates::{RateQuote, RateResolver};
use crate::core::records::{RatePolicy, RecordBatch, build_records};
use crate::core::schema::{AccountView, CountryRecord, CountryView, SchemaResolver};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

/// Resolved view of one configuration snapshot.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub snapshot: Arc<Snapshot>,
    pub countries: CountryView,
    pub accounts: AccountView,
}

/// Runs closing cycles against a shared configuration cache.
pub struct ClosingCycle {
    cache: Arc<ConfigCache>,
    rates: RateResolver,
    resolver: SchemaResolver,
}

impl ClosingCycle {
    pub fn new(cache: Arc<ConfigCache>, rates: RateResolver) -> Self {
        let resolver = SchemaResolver::new(rates.base_currency());
        Self {
            cache,
            rates,
            resolver,
        }
    }

    pub fn rates(&self) -> &RateResolver {
        &self.rates
    }

    pub async fn configuration(&self) -> Result<Configuration> {
        load_configuration(&self.cache, &self.resolver).await
    }

    /// Opens a cycle for `country` closing on `date`.
    pub async fn open(&self, country: &str, date: NaiveDate) -> Result<ClosingSession> {
        let configuration = self.configuration().await?;
        let country = configuration
            .countries
            .find(country)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownCountry(country.trim().to_string()))?;

        let quote = self.rates.resolve(&country.currency_code, date).await;
        if let Some(note) = &quote.note {
            warn!(country = %country.identifier, %note, "Exchange rate is not historical");
        }
        info!(
            country = %country.identifier,
            currency = %country.currency_code,
            rate = %quote.rate,
            provenance = %quote.provenance,
            "Opened closing cycle"
        );

        Ok(ClosingSession {
            configuration,
            country,
            quote,
        })
    }
}

/// Loads and resolves the configuration tables.
///
/// Fails with `ConfigurationUnavailable` unless both tables yield at least
/// one record; callers must stop the cycle in that case.
pub async fn load_configuration(
    cache: &ConfigCache,
    resolver: &SchemaResolver,
) -> Result<Configuration> {
    let snapshot = cache.load().await;
    if snapshot.is_empty() {
        return Err(LedgerError::ConfigurationUnavailable(
            "no configuration found".to_string(),
        ));
    }

    let countries = resolver
        .countries(&snapshot.countries)
        .map_err(unavailable)?;
    let accounts = resolver.accounts(&snapshot.accounts).map_err(unavailable)?;
    if countries.is_empty() || accounts.is_empty() {
        return Err(LedgerError::ConfigurationUnavailable(
            "configuration tables have no usable rows".to_string(),
        ));
    }

    Ok(Configuration {
        snapshot,
        countries,
        accounts,
    })
}

fn unavailable(e: LedgerError) -> LedgerError {
    match e {
        LedgerError::ConfigurationUnavailable(_) => e,
        other => LedgerError::ConfigurationUnavailable(other.to_string()),
    }
}

/// A country, its rate and the chart of accounts to enter amounts against.
#[derive(Debug, Clone)]
pub struct ClosingSession {
    pub configuration: Configuration,
    pub country: CountryRecord,
    pub quote: RateQuote,
}

impl ClosingSession {
    pub fn accounts(&self) -> &AccountView {
        &self.configuration.accounts
    }

    /// Totals of `entries` in the country's currency.
    pub fn summarize(&self, entries: &[LedgerEntry]) -> Aggregates {
        aggregate(entries, self.accounts())
    }

    pub fn records(&self, entries: &[LedgerEntry], policy: RatePolicy) -> Result<RecordBatch> {
        build_records(&self.country, &self.quote, entries, self.accounts(), policy)
    }
}
