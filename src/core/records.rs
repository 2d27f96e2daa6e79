//! Rows handed to the persistence sink.
use crate::core::error::LedgerError;
use crate::core::ledger::{LedgerEntry, OrphanedEntry, active_entries};
use crate::core::rates::{Provenance, RateQuote};
use crate::core::schema::{AccountView, CountryRecord};
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Marks rows typed in by the operator, as opposed to computed ones.
pub const INPUT_ENTRY_KIND: &str = "Input";

/// What to do with entries when no exchange rate could be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatePolicy {
    /// Refuse to produce records.
    Block,
    /// Produce records with a zero rate tagged `unavailable`.
    TagUnverified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialEntryRecord {
    pub country: String,
    pub year: i32,
    pub currency_code: String,
    pub rate: Decimal,
    pub closing_date: NaiveDate,
    pub account_code: String,
    pub account_description: String,
    pub amount: Decimal,
    pub entry_kind: String,
    pub rate_provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    pub records: Vec<FinancialEntryRecord>,
    pub skipped: Vec<OrphanedEntry>,
}

/// Builds one record per active entry.
///
/// Zero amounts and entries for unknown accounts are left out; the latter are
/// reported in `RecordBatch::skipped`.
pub fn build_records(
    country: &CountryRecord,
    quote: &RateQuote,
    entries: &[LedgerEntry],
    accounts: &AccountView,
    policy: RatePolicy,
) -> Result<RecordBatch, LedgerError> {
    if !quote.is_available() {
        match policy {
            RatePolicy::Block => return Err(quote.unavailable_error()),
            RatePolicy::TagUnverified => warn!(
                currency = %quote.currency,
                "Recording entries with an unverified exchange rate"
            ),
        }
    }

    let active = active_entries(entries, accounts);
    if active.entries.is_empty() {
        return Err(LedgerError::NoActiveEntries);
    }

    let rate = quote.usable_rate().unwrap_or(Decimal::ZERO);
    let records: Vec<_> = active
        .entries
        .iter()
        .map(|(entry, account)| FinancialEntryRecord {
            country: country.identifier.clone(),
            year: quote.as_of.year(),
            currency_code: quote.currency.clone(),
            rate,
            closing_date: quote.as_of,
            account_code: account.code.clone(),
            account_description: account.description.clone(),
            amount: entry.amount,
            entry_kind: INPUT_ENTRY_KIND.to_string(),
            rate_provenance: quote.provenance,
        })
        .collect();

    info!(
        country = %country.identifier,
        records = records.len(),
        skipped = active.skipped.len(),
        "Prepared records for persistence"
    );
    Ok(RecordBatch {
        records,
        skipped: active.skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{AccountRecord, AccountSchema, ColumnSource};
    use rust_decimal_macros::dec;

    fn country() -> CountryRecord {
        CountryRecord {
            identifier: "Stati Uniti".to_string(),
            currency_code: "USD".to_string(),
            currency_description: "Dollaro".to_string(),
        }
    }

    fn accounts() -> AccountView {
        let schema = AccountSchema {
            code: 0,
            description: 1,
            class: ColumnSource::CodePrefix,
            account_type: ColumnSource::Placeholder,
        };
        AccountView::new(
            schema,
            vec![AccountRecord {
                code: "4010".to_string(),
                description: "Ricavi".to_string(),
                class_tag: "4".to_string(),
                type_tag: "N/D".to_string(),
            }],
        )
    }

    fn quote(provenance: Provenance, rate: Decimal) -> RateQuote {
        RateQuote {
            currency: "USD".to_string(),
            rate,
            as_of: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            provenance,
            note: None,
        }
    }

    #[test]
    fn test_records_carry_rate_and_account_details() {
        let entries = vec![
            LedgerEntry::new("4010", dec!(1200.50)),
            LedgerEntry::new("9999", dec!(1)),
        ];

        let batch = build_records(
            &country(),
            &quote(Provenance::LatestFallback, dec!(0.93)),
            &entries,
            &accounts(),
            RatePolicy::Block,
        )
        .unwrap();

        assert_eq!(batch.records.len(), 1);
        let record = &batch.records[0];
        assert_eq!(record.country, "Stati Uniti");
        assert_eq!(record.year, 2024);
        assert_eq!(record.currency_code, "USD");
        assert_eq!(record.rate, dec!(0.93));
        assert_eq!(record.account_description, "Ricavi");
        assert_eq!(record.amount, dec!(1200.50));
        assert_eq!(record.entry_kind, "Input");
        assert_eq!(record.rate_provenance, Provenance::LatestFallback);
        assert_eq!(batch.skipped.len(), 1);
    }

    #[test]
    fn test_unavailable_rate_blocks_by_policy() {
        let entries = vec![LedgerEntry::new("4010", dec!(10))];
        let unavailable = quote(Provenance::Unavailable, Decimal::ZERO);

        let err = build_records(
            &country(),
            &unavailable,
            &entries,
            &accounts(),
            RatePolicy::Block,
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::RateUnavailable { .. }));

        let batch = build_records(
            &country(),
            &unavailable,
            &entries,
            &accounts(),
            RatePolicy::TagUnverified,
        )
        .unwrap();
        assert_eq!(batch.records[0].rate, Decimal::ZERO);
        assert_eq!(batch.records[0].rate_provenance, Provenance::Unavailable);
    }

    #[test]
    fn test_no_active_entries_is_an_error() {
        let entries = vec![LedgerEntry::new("4010", dec!(0))];

        let err = build_records(
            &country(),
            &quote(Provenance::Historical, dec!(1)),
            &entries,
            &accounts(),
            RatePolicy::Block,
        )
        .unwrap_err();
        assert_eq!(err, LedgerError::NoActiveEntries);
    }

    #[test]
    fn test_record_serializes_with_provenance_tag() {
        let entries = vec![LedgerEntry::new("4010", dec!(5))];
        let batch = build_records(
            &country(),
            &quote(Provenance::Historical, dec!(0.9)),
            &entries,
            &accounts(),
            RatePolicy::Block,
        )
        .unwrap();

        let json = serde_json::to_value(&batch.records[0]).unwrap();
        assert_eq!(json["rate_provenance"], "historical");
        assert_eq!(json["closing_date"], "2024-12-31");
        assert_eq!(json["entry_kind"], "Input");
    }
}
