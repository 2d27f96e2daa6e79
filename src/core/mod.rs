//! Core business logic abstractions

pub mod cache;
pub mod closing;
pub mod config;
pub mod currency;
pub mod error;
pub mod ledger;
pub mod log;
pub mod rates;
pub mod records;
pub mod schema;
pub mod table;

// Re-export main types for cleaner imports
pub use closing::{ClosingCycle, ClosingSession, Configuration};
pub use currency::{RateLookupError, RatePayload, RateSource};
pub use error::LedgerError;
pub use ledger::{Aggregates, LedgerEntry};
pub use rates::{Provenance, RateQuote, RateResolver};
pub use records::{FinancialEntryRecord, RatePolicy};
pub use table::{Record, Table, TableSource};
