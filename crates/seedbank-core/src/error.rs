//! # Error Types
//!
//! Errors raised while constructing core primitives. Domain-level
//! failures (transitions, locked tests, stale aggregates) live in
//! `seedbank-accession`.

use thiserror::Error;

/// Errors from identifier and calendar construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An identifier failed validation.
    #[error("invalid {kind}: {reason}")]
    InvalidIdentifier {
        /// Which identifier type was being constructed.
        kind: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A date string could not be parsed as `YYYY-MM-DD`.
    #[error("invalid date {input:?}: expected YYYY-MM-DD")]
    InvalidDate {
        /// The rejected input.
        input: String,
    },

    /// A time zone name is not a known IANA zone.
    #[error("unknown time zone {0:?}")]
    UnknownTimeZone(String),
}
