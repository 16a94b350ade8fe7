//! # Engine Errors
//!
//! Action-level failures of the accession engine. Field-level problems are
//! not errors: they are collected into a [`ValidationResult`] and only
//! surface here, wrapped in [`EngineError::Validation`], when a commit is
//! attempted while the draft is still invalid.

use thiserror::Error;

use seedbank_core::{AccessionId, ViabilityTestId};

use crate::validation::ValidationResult;

/// Errors raised by engine commands and editing sessions.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A quantity was not a finite, non-negative number.
    #[error("invalid quantity {value}: must be a finite, non-negative number")]
    InvalidQuantity {
        /// The rejected value.
        value: f64,
    },

    /// Two quantities cannot be converted into one another.
    #[error("cannot convert {from} to {to}")]
    IncompatibleUnits {
        /// Source unit.
        from: String,
        /// Target unit.
        to: String,
    },

    /// The requested state change is not allowed from the current state.
    #[error("invalid accession transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: String,
        /// Attempted target state or action.
        to: String,
    },

    /// Remaining quantity cannot be adjusted in the current state.
    #[error("quantity cannot be edited while the accession is {state}")]
    QuantityNotEditable {
        /// Current state.
        state: String,
    },

    /// The viability test is completed and has results; it is read-only.
    #[error("viability test {test_id} is locked")]
    TestLocked {
        /// The locked test.
        test_id: ViabilityTestId,
    },

    /// Completion was toggled on a test that cannot be completed yet.
    #[error("viability test cannot be marked complete: {reason}")]
    CompletionUnavailable {
        /// Why completion is not offered.
        reason: &'static str,
    },

    /// A computed field was edited directly.
    #[error("{field} is computed and cannot be entered directly")]
    ComputedField {
        /// The computed field.
        field: &'static str,
    },

    /// The viability test does not belong to the accession.
    #[error("viability test {test_id} not found on {accession_id}")]
    TestNotFound {
        /// The accession searched.
        accession_id: AccessionId,
        /// The missing test.
        test_id: ViabilityTestId,
    },

    /// The accession changed after the session loaded it.
    #[error("{accession_id} changed since version {expected} was loaded")]
    StaleAggregate {
        /// The accession.
        accession_id: AccessionId,
        /// Version the session was opened against.
        expected: u64,
        /// Version currently persisted, when known.
        found: Option<u64>,
    },

    /// Another editing session is already open for the accession.
    #[error("an editing session is already open for {accession_id}")]
    SessionBusy {
        /// The accession.
        accession_id: AccessionId,
    },

    /// The session was already committed.
    #[error("editing session for {accession_id} is closed")]
    SessionClosed {
        /// The accession.
        accession_id: AccessionId,
    },

    /// The draft still has field errors.
    #[error("draft has {} invalid field(s)", .0.len())]
    Validation(ValidationResult),

    /// The persistence collaborator failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Failures reported by an [`AccessionRepository`](crate::AccessionRepository).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The requested resource does not exist.
    #[error("not found: {resource}")]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },

    /// The backend rejected the write because the aggregate changed.
    #[error("conflict on {resource}: {reason}")]
    Conflict {
        /// The resource written.
        resource: String,
        /// Backend-supplied reason.
        reason: String,
    },

    /// The backend rejected the command as invalid.
    #[error("rejected: {reason}")]
    Rejected {
        /// Backend-supplied reason.
        reason: String,
    },

    /// The transport failed (network, timeout, 5xx).
    #[error("could not reach backend: {reason}")]
    Transport {
        /// Description of the transport failure.
        reason: String,
    },
}
