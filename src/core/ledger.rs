//! Subtotals over the operator's edited amounts.
use crate::core::error::LedgerError;
use crate::core::rates::RateQuote;
use crate::core::schema::{AccountRecord, AccountView};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// An amount entered against one account of the chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(alias = "code")]
    pub account_code: String,
    pub amount: Decimal,
}

impl LedgerEntry {
    pub fn new(account_code: &str, amount: Decimal) -> Self {
        Self {
            account_code: account_code.to_string(),
            amount,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.amount.is_zero()
    }
}

/// A non-zero entry whose account is not in the loaded chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanedEntry {
    pub account_code: String,
    pub amount: Decimal,
}

/// Active entries joined with their accounts, plus what had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct ActiveEntries<'a> {
    pub entries: Vec<(&'a LedgerEntry, &'a AccountRecord)>,
    pub skipped: Vec<OrphanedEntry>,
}

/// Drops zero amounts, then joins the rest with the chart of accounts.
pub fn active_entries<'a>(
    entries: &'a [LedgerEntry],
    accounts: &'a AccountView,
) -> ActiveEntries<'a> {
    let mut active = ActiveEntries::default();
    for entry in entries.iter().filter(|e| e.is_active()) {
        match accounts.get(&entry.account_code) {
            Some(account) => active.entries.push((entry, account)),
            None => {
                warn!(
                    code = %entry.account_code,
                    amount = %entry.amount,
                    "Skipping entry for unknown account"
                );
                active.skipped.push(OrphanedEntry {
                    account_code: entry.account_code.clone(),
                    amount: entry.amount,
                });
            }
        }
    }
    active
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Aggregates {
    pub total: Decimal,
    pub by_class: BTreeMap<String, Decimal>,
    pub by_type: BTreeMap<String, Decimal>,
    pub active_count: usize,
    pub skipped: Vec<OrphanedEntry>,
}

impl Aggregates {
    /// The same aggregates expressed in the base currency.
    ///
    /// Fails when the quote carries no usable rate.
    pub fn convert(&self, quote: &RateQuote) -> Result<Aggregates, LedgerError> {
        let rate = quote.usable_rate().ok_or_else(|| quote.unavailable_error())?;
        let scale = |sums: &BTreeMap<String, Decimal>| -> BTreeMap<String, Decimal> {
            sums.iter()
                .map(|(key, sum)| (key.clone(), sum * rate))
                .collect()
        };
        Ok(Aggregates {
            total: self.total * rate,
            by_class: scale(&self.by_class),
            by_type: scale(&self.by_type),
            active_count: self.active_count,
            skipped: self.skipped.clone(),
        })
    }
}

/// Computes the grand total and the per-class and per-type subtotals.
///
/// Pure: the same entries and chart always give the same aggregates.
pub fn aggregate(entries: &[LedgerEntry], accounts: &AccountView) -> Aggregates {
    let active = active_entries(entries, accounts);

    let mut aggregates = Aggregates {
        active_count: active.entries.len(),
        skipped: active.skipped,
        ..Default::default()
    };
    for (entry, account) in active.entries {
        aggregates.total += entry.amount;
        *aggregates
            .by_class
            .entry(account.class_tag.clone())
            .or_default() += entry.amount;
        *aggregates
            .by_type
            .entry(account.type_tag.clone())
            .or_default() += entry.amount;
    }

    debug!(
        total = %aggregates.total,
        active = aggregates.active_count,
        skipped = aggregates.skipped.len(),
        "Aggregated ledger entries"
    );
    aggregates
}
