//! Error types for the closing cycle

use thiserror::Error;

/// Failures of a closing cycle that callers have to act on.
///
/// Remote lookup failures never show up here directly: they are folded into
/// a `RateQuote` provenance or an empty configuration snapshot first.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Configuration unavailable: {0}")]
    ConfigurationUnavailable(String),

    #[error("Cannot resolve columns of table '{table}': it has no columns")]
    SchemaResolutionAmbiguous { table: String },

    #[error("Unknown country: {0}")]
    UnknownCountry(String),

    #[error("Exchange rate for {currency} is unavailable ({note})")]
    RateUnavailable { currency: String, note: String },

    #[error("No non-zero amounts to record")]
    NoActiveEntries,
}

pub type Result<T> = std::result::Result<T, LedgerError>;
