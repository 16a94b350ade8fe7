//! # seedbank-accession — Accession Domain Engine
//!
//! The rules governing a seed accession: its lifecycle state, its quantity
//! bookkeeping, viability-test validation, and withdrawal reconciliation.
//! Everything here is pure over an in-memory copy of the aggregate except
//! the [`AccessionRepository`] calls made by editing sessions.
//!
//! ## Components
//!
//! - **State machine** (`state.rs`): the six lifecycle states, the
//!   transition table offered to the status editor, and the depletion and
//!   revival side effects of quantity changes.
//!
//! - **Quantity ledger** (`quantity.rs`): units with SI gram factors,
//!   subset-ratio estimates, and the display conversion table.
//!
//! - **Viability tests** (`viability.rs`): Lab, Nursery, and Cut tests,
//!   the draft editor with locking, and the validator.
//!
//! - **Withdrawals** (`withdrawal.rs`): purpose-driven unit forcing and
//!   command construction.
//!
//! - **Sessions** (`session.rs`): [`AccessionEngine`] checks accessions
//!   out to one editing session at a time and rejects stale commits.
//!
//! ## Validation
//!
//! Field problems never raise errors. Validators return a
//! [`ValidationResult`]; a commit attempted with a non-empty result fails
//! with [`EngineError::Validation`].

pub mod accession;
pub mod config;
pub mod error;
pub mod memory;
pub mod quantity;
pub mod repository;
pub mod session;
pub mod state;
pub mod validation;
pub mod viability;
pub mod withdrawal;

pub use accession::Accession;
pub use config::{ConfigError, EditBoundPolicy, EngineConfig};
pub use error::{EngineError, RepositoryError};
pub use memory::InMemoryAccessionRepository;
pub use quantity::{Quantity, QuantityEntry, QuantityLedger, Unit, UnitSystem};
pub use repository::AccessionRepository;
pub use session::{
    AccessionEngine, AccessionSession, DispatchedWithdrawal, QuantityDraft, QuantityOutcome,
    StateEditDraft, ViabilityTestOutcome, WithdrawalOutcome,
};
pub use state::{AccessionState, StatusEditAction};
pub use validation::{FieldError, ValidationResult};
pub use viability::{
    SeedType, Substrate, TestResult, TestResultDraft, Treatment, ViabilityTest,
    ViabilityTestDraft, ViabilityTestPayload, ViabilityTestType, ViabilityTestValidator,
};
pub use withdrawal::{
    NewWithdrawal, NurseryTransfer, QuantityEntryMode, Withdrawal, WithdrawalCommand,
    WithdrawalDraft, WithdrawalProcessor, WithdrawalPurpose, WithdrawalTestDraft,
};
