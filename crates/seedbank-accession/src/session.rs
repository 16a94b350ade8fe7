//! # Editing Sessions
//!
//! [`AccessionEngine`] opens typed editing sessions over one accession at a
//! time. A session:
//!
//! 1. loads the aggregate once and checks the accession out (a second open
//!    for the same accession fails with [`EngineError::SessionBusy`]);
//! 2. exposes a draft that the caller edits and validates freely;
//! 3. on [`commit`](AccessionSession::commit), validates the draft,
//!    re-loads the aggregate and compares versions
//!    ([`EngineError::StaleAggregate`] on mismatch), dispatches the domain
//!    command, reloads, and releases the checkout.
//!
//! A failed commit leaves the session open with its draft intact. Dropping
//! the session (or calling [`discard`](AccessionSession::discard)) releases
//! the checkout without side effects.

use std::collections::HashSet;

use parking_lot::Mutex;

use seedbank_core::{AccessionId, ViabilityTestId};

use crate::accession::Accession;
use crate::config::EngineConfig;
use crate::error::{EngineError, RepositoryError};
use crate::quantity::{Quantity, QuantityEntry, QuantityLedger};
use crate::repository::AccessionRepository;
use crate::state::{self, AccessionState, StatusEditAction};
use crate::validation::{fields, FieldError, ValidationResult};
use crate::viability::{ViabilityTest, ViabilityTestDraft, ViabilityTestValidator};
use crate::withdrawal::{Withdrawal, WithdrawalCommand, WithdrawalDraft, WithdrawalProcessor};

// ─── Drafts and outcomes ─────────────────────────────────────────────

/// Draft for the generic status edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEditDraft {
    /// Chosen target state.
    pub target: Option<AccessionState>,
}

/// Draft for the remaining-quantity editor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuantityDraft {
    /// New remaining quantity. Zero is allowed.
    pub remaining: QuantityEntry,
    /// Subset sample weight, for estimates.
    pub subset_weight: QuantityEntry,
    /// Subset sample seed count, for estimates.
    pub subset_count: Option<i64>,
}

impl QuantityDraft {
    /// A draft seeded from `accession`.
    pub fn from_accession(accession: &Accession) -> Self {
        let entry = |q: Option<Quantity>| {
            QuantityEntry::new(q.map(|q| q.quantity), q.map(|q| q.unit))
        };
        Self {
            remaining: entry(accession.remaining_quantity),
            subset_weight: entry(accession.subset_weight),
            subset_count: accession.subset_count.map(|c| c as i64),
        }
    }

    /// Validate the draft. The subset is optional but must be complete and
    /// positive when given.
    pub fn validate(&self) -> ValidationResult {
        let mut result = match self.remaining.validate(fields::QUANTITY, true) {
            Ok(_) => ValidationResult::new(),
            Err(errors) => errors,
        };
        let subset_entered = self.subset_weight.quantity.is_some() || self.subset_count.is_some();
        if subset_entered {
            let weight_ok = matches!(
                (self.subset_weight.quantity, self.subset_weight.unit),
                (Some(q), Some(unit)) if q.is_finite() && q > 0.0 && unit.is_weight()
            );
            if !weight_ok {
                result.add(fields::SUBSET_WEIGHT, FieldError::InvalidValue);
            }
            match self.subset_count {
                Some(count) if count >= 1 => {}
                Some(_) => result.add(fields::SUBSET_COUNT, FieldError::InvalidValue),
                None => result.add(fields::SUBSET_COUNT, FieldError::RequiredField),
            }
        }
        result
    }
}

/// Result of a committed quantity edit.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantityOutcome {
    /// The reloaded aggregate.
    pub accession: Accession,
    /// New state when the edit depleted or revived the accession.
    pub state_change: Option<AccessionState>,
}

/// Result of a committed viability-test edit.
#[derive(Debug, Clone, PartialEq)]
pub struct ViabilityTestOutcome {
    /// The saved test.
    pub test: ViabilityTest,
    /// Whether the caller should present the test's results next.
    pub show_results: bool,
    /// The reloaded aggregate.
    pub accession: Accession,
}

/// What a committed withdrawal created.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchedWithdrawal {
    NurseryTransfer,
    ViabilityTest(ViabilityTest),
    General(Withdrawal),
}

/// Result of a committed withdrawal.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalOutcome {
    pub dispatched: DispatchedWithdrawal,
    /// The reloaded aggregate, the source of truth for remaining quantity.
    pub accession: Accession,
}

// ─── Engine ──────────────────────────────────────────────────────────

/// Entry point for accession commands and editing sessions.
#[derive(Debug)]
pub struct AccessionEngine<R> {
    repository: R,
    config: EngineConfig,
    checked_out: Mutex<HashSet<AccessionId>>,
}

/// Releases an accession checkout on drop.
#[derive(Debug)]
struct Checkout<'e> {
    registry: &'e Mutex<HashSet<AccessionId>>,
    accession_id: AccessionId,
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.accession_id);
        tracing::debug!(accession_id = %self.accession_id, "released accession checkout");
    }
}

impl<R: AccessionRepository> AccessionEngine<R> {
    pub fn new(repository: R, config: EngineConfig) -> Self {
        Self {
            repository,
            config,
            checked_out: Mutex::new(HashSet::new()),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether an editing session or command holds `accession_id`.
    pub fn is_checked_out(&self, accession_id: &AccessionId) -> bool {
        self.checked_out.lock().contains(accession_id)
    }

    fn checkout(&self, accession_id: AccessionId) -> Result<Checkout<'_>, EngineError> {
        if !self.checked_out.lock().insert(accession_id) {
            tracing::warn!(%accession_id, "accession is already checked out");
            return Err(EngineError::SessionBusy { accession_id });
        }
        Ok(Checkout {
            registry: &self.checked_out,
            accession_id,
        })
    }

    /// Fetch the current aggregate.
    pub async fn load(&self, accession_id: AccessionId) -> Result<Accession, EngineError> {
        Ok(self.repository.load(accession_id).await?)
    }

    async fn open<D>(
        &self,
        accession_id: AccessionId,
        seed: impl FnOnce(&Accession) -> Result<D, EngineError>,
    ) -> Result<AccessionSession<'_, R, D>, EngineError> {
        let checkout = self.checkout(accession_id)?;
        let snapshot = self.repository.load(accession_id).await?;
        let draft = seed(&snapshot)?;
        tracing::debug!(%accession_id, version = snapshot.version, "opened editing session");
        Ok(AccessionSession {
            engine: self,
            snapshot,
            draft,
            checkout: Some(checkout),
        })
    }

    /// Open a generic status edit, seeded with the current state.
    pub async fn open_state_edit(
        &self,
        accession_id: AccessionId,
    ) -> Result<AccessionSession<'_, R, StateEditDraft>, EngineError> {
        self.open(accession_id, |a| {
            Ok(StateEditDraft {
                target: Some(a.state),
            })
        })
        .await
    }

    /// Open the remaining-quantity editor.
    ///
    /// # Errors
    ///
    /// [`EngineError::QuantityNotEditable`] unless the accession is
    /// drying, in storage, or used up.
    pub async fn open_quantity_edit(
        &self,
        accession_id: AccessionId,
    ) -> Result<AccessionSession<'_, R, QuantityDraft>, EngineError> {
        self.open(accession_id, |a| {
            if !a.state.allows_quantity_edit() {
                return Err(EngineError::QuantityNotEditable {
                    state: a.state.to_string(),
                });
            }
            Ok(QuantityDraft::from_accession(a))
        })
        .await
    }

    /// Open an editor for a new viability test.
    pub async fn open_new_viability_test(
        &self,
        accession_id: AccessionId,
    ) -> Result<AccessionSession<'_, R, ViabilityTestDraft>, EngineError> {
        self.open(accession_id, |_| Ok(ViabilityTestDraft::new())).await
    }

    /// Open an editor for an existing viability test. A locked test opens
    /// read-only.
    pub async fn open_viability_test(
        &self,
        accession_id: AccessionId,
        test_id: ViabilityTestId,
    ) -> Result<AccessionSession<'_, R, ViabilityTestDraft>, EngineError> {
        self.open(accession_id, |a| {
            a.viability_test(&test_id)
                .map(ViabilityTestDraft::from_test)
                .ok_or(EngineError::TestNotFound {
                    accession_id,
                    test_id,
                })
        })
        .await
    }

    /// Open a withdrawal form dated today in the facility's zone.
    pub async fn open_withdrawal(
        &self,
        accession_id: AccessionId,
    ) -> Result<AccessionSession<'_, R, WithdrawalDraft>, EngineError> {
        let config = self.config;
        self.open(accession_id, move |a| {
            Ok(WithdrawalDraft::new(config.facility_clock(a).today()))
        })
        .await
    }

    /// Check the accession in, moving it to the configured post-check-in
    /// state.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidTransition`] unless the accession is awaiting
    /// check-in; [`EngineError::SessionBusy`] while a session is open.
    pub async fn check_in(&self, accession_id: AccessionId) -> Result<Accession, EngineError> {
        let _checkout = self.checkout(accession_id)?;
        let accession = self.repository.load(accession_id).await?;
        let target = self.config.post_check_in_state;
        if let Err(e) = state::validate_check_in(accession.state, target) {
            tracing::warn!(%accession_id, state = %accession.state, "check-in rejected");
            return Err(e);
        }
        self.repository.check_in(accession_id).await?;
        let mut checked_in = self.repository.load(accession_id).await?;
        if checked_in.state != target && checked_in.state.is_active() {
            checked_in.state = target;
            checked_in = self.repository.save(&checked_in).await?;
        }
        tracing::info!(%accession_id, state = %checked_in.state, "accession checked in");
        Ok(checked_in)
    }

    /// Delete the whole aggregate.
    pub async fn delete_accession(&self, accession_id: AccessionId) -> Result<(), EngineError> {
        let _checkout = self.checkout(accession_id)?;
        self.repository.delete(accession_id).await?;
        tracing::info!(%accession_id, "accession deleted");
        Ok(())
    }

    /// Delete a viability test, returning its seeds to the accession.
    pub async fn delete_viability_test(
        &self,
        accession_id: AccessionId,
        test_id: ViabilityTestId,
    ) -> Result<Accession, EngineError> {
        let _checkout = self.checkout(accession_id)?;
        let accession = self.repository.load(accession_id).await?;
        if accession.viability_test(&test_id).is_none() {
            return Err(EngineError::TestNotFound {
                accession_id,
                test_id,
            });
        }
        self.repository
            .delete_viability_test(accession_id, test_id)
            .await?;
        tracing::info!(%accession_id, %test_id, "viability test deleted");
        Ok(self.repository.load(accession_id).await?)
    }
}

// ─── Sessions ────────────────────────────────────────────────────────

/// An open editing session over one accession.
#[derive(Debug)]
pub struct AccessionSession<'e, R, D> {
    engine: &'e AccessionEngine<R>,
    snapshot: Accession,
    draft: D,
    checkout: Option<Checkout<'e>>,
}

impl<'e, R: AccessionRepository, D> AccessionSession<'e, R, D> {
    pub fn accession_id(&self) -> AccessionId {
        self.snapshot.id
    }

    /// The aggregate as loaded when the session opened.
    pub fn snapshot(&self) -> &Accession {
        &self.snapshot
    }

    pub fn draft(&self) -> &D {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut D {
        &mut self.draft
    }

    /// Whether the session still holds its checkout.
    pub fn is_open(&self) -> bool {
        self.checkout.is_some()
    }

    /// Close the session without side effects.
    pub fn discard(mut self) {
        tracing::debug!(accession_id = %self.snapshot.id, "discarded editing session");
        self.checkout = None;
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.checkout.is_none() {
            return Err(EngineError::SessionClosed {
                accession_id: self.snapshot.id,
            });
        }
        Ok(())
    }

    fn rejected(&self, error: EngineError) -> EngineError {
        match &error {
            EngineError::Validation(result) => tracing::warn!(
                accession_id = %self.snapshot.id,
                invalid_fields = result.len(),
                "commit rejected: draft has field errors"
            ),
            other => tracing::warn!(
                accession_id = %self.snapshot.id,
                error = %other,
                "commit rejected"
            ),
        }
        error
    }

    fn reject_invalid(&self, result: ValidationResult) -> Result<(), EngineError> {
        if result.is_valid() {
            return Ok(());
        }
        Err(self.rejected(EngineError::Validation(result)))
    }

    fn stale(&self, found: Option<u64>) -> EngineError {
        tracing::warn!(
            accession_id = %self.snapshot.id,
            expected = self.snapshot.version,
            ?found,
            "commit rejected: accession changed since it was loaded"
        );
        EngineError::StaleAggregate {
            accession_id: self.snapshot.id,
            expected: self.snapshot.version,
            found,
        }
    }

    /// Fail with `StaleAggregate` unless the persisted version still
    /// matches the snapshot.
    async fn ensure_fresh(&self) -> Result<(), EngineError> {
        let current = match self.engine.repository.load(self.snapshot.id).await {
            Ok(current) => current,
            Err(RepositoryError::NotFound { .. }) => return Err(self.stale(None)),
            Err(e) => return Err(e.into()),
        };
        if current.version != self.snapshot.version {
            return Err(self.stale(Some(current.version)));
        }
        Ok(())
    }

    /// Map a backend conflict to `StaleAggregate`.
    fn dispatch_error(&self, error: RepositoryError) -> EngineError {
        match error {
            RepositoryError::Conflict { .. } => self.stale(None),
            other => other.into(),
        }
    }

    /// Reload the aggregate and release the checkout.
    async fn finish(&mut self) -> Result<Accession, EngineError> {
        let reloaded = self.engine.repository.load(self.snapshot.id).await;
        self.checkout = None;
        Ok(reloaded?)
    }
}

impl<'e, R: AccessionRepository> AccessionSession<'e, R, StateEditDraft> {
    /// What the status control offers for the snapshot's state.
    pub fn status_edit_action(&self) -> StatusEditAction {
        self.snapshot.state.status_edit_action()
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();
        if self.draft.target.is_none() {
            result.add(fields::STATE, FieldError::RequiredField);
        }
        result
    }

    /// Persist the chosen state.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidTransition`] when the target is not offered
    /// from the current state.
    pub async fn commit(&mut self) -> Result<Accession, EngineError> {
        self.ensure_open()?;
        self.reject_invalid(self.validate())?;
        let Some(target) = self.draft.target else {
            return Err(EngineError::Validation(self.validate()));
        };
        let mut accession = self.snapshot.clone();
        accession
            .transition_to(target)
            .map_err(|e| self.rejected(e))?;
        self.ensure_fresh().await?;
        self.engine
            .repository
            .save(&accession)
            .await
            .map_err(|e| self.dispatch_error(e))?;
        let saved = self.finish().await?;
        tracing::info!(accession_id = %saved.id, from = %self.snapshot.state, to = %saved.state, "accession state updated");
        Ok(saved)
    }
}

impl<'e, R: AccessionRepository> AccessionSession<'e, R, QuantityDraft> {
    pub fn validate(&self) -> ValidationResult {
        self.draft.validate()
    }

    /// Persist the new remaining quantity and subset, applying depletion
    /// or revival.
    pub async fn commit(&mut self) -> Result<QuantityOutcome, EngineError> {
        self.ensure_open()?;
        self.reject_invalid(self.validate())?;
        let mut accession = self.snapshot.clone();
        if !accession.state.allows_quantity_edit() {
            return Err(self.rejected(EngineError::QuantityNotEditable {
                state: accession.state.to_string(),
            }));
        }
        let (Some(amount), Some(unit)) = (self.draft.remaining.quantity, self.draft.remaining.unit)
        else {
            return Err(EngineError::Validation(self.validate()));
        };
        accession.subset_weight = match (self.draft.subset_weight.quantity, self.draft.subset_weight.unit) {
            (Some(q), Some(u)) => Some(Quantity::new(q, u)?),
            _ => None,
        };
        accession.subset_count = self.draft.subset_count.and_then(|c| u64::try_from(c).ok());
        QuantityLedger::set_remaining_quantity(&mut accession, amount, unit)?;
        let state_change = accession.apply_quantity_side_effects(self.engine.config.revive_state);

        self.ensure_fresh().await?;
        self.engine
            .repository
            .save(&accession)
            .await
            .map_err(|e| self.dispatch_error(e))?;
        let saved = self.finish().await?;
        tracing::info!(
            accession_id = %saved.id,
            remaining = %Quantity { quantity: amount, unit },
            state = %saved.state,
            "remaining quantity updated"
        );
        Ok(QuantityOutcome {
            accession: saved,
            state_change,
        })
    }
}

impl<'e, R: AccessionRepository> AccessionSession<'e, R, ViabilityTestDraft> {
    fn validator(&self) -> ViabilityTestValidator {
        let config = &self.engine.config;
        ViabilityTestValidator::new(config.facility_clock(&self.snapshot), config.edit_bound_policy)
    }

    /// Largest `seedsTested` the draft may enter, `None` when unbounded.
    pub fn seeds_tested_bound(&self) -> Option<u64> {
        let existing = self
            .draft
            .test_id()
            .and_then(|id| self.snapshot.viability_test(&id));
        self.validator().seeds_tested_bound(&self.snapshot, existing)
    }

    pub fn validate(&self) -> ValidationResult {
        self.validator().validate(&self.draft, &self.snapshot)
    }

    /// Create or update the test.
    ///
    /// # Errors
    ///
    /// [`EngineError::TestLocked`] for a locked test.
    pub async fn commit(&mut self) -> Result<ViabilityTestOutcome, EngineError> {
        self.ensure_open()?;
        let payload = self
            .validator()
            .build_payload(&self.draft, &self.snapshot)
            .map_err(|e| self.rejected(e))?;
        let accession_id = self.snapshot.id;
        let previous = self
            .draft
            .test_id()
            .and_then(|id| self.snapshot.viability_test(&id))
            .cloned();

        self.ensure_fresh().await?;
        let repository = &self.engine.repository;
        let saved = match self.draft.test_id() {
            Some(test_id) => repository
                .update_viability_test(accession_id, test_id, &payload)
                .await,
            None => repository.create_viability_test(accession_id, &payload).await,
        }
        .map_err(|e| self.dispatch_error(e))?;

        let show_results = ViabilityTestValidator::should_present_results(previous.as_ref(), &payload);
        let accession = self.finish().await?;
        tracing::info!(
            %accession_id,
            test_id = %saved.id,
            created = previous.is_none(),
            "viability test saved"
        );
        Ok(ViabilityTestOutcome {
            test: saved,
            show_results,
            accession,
        })
    }
}

impl<'e, R: AccessionRepository> AccessionSession<'e, R, WithdrawalDraft> {
    fn processor(&self) -> WithdrawalProcessor {
        let config = &self.engine.config;
        WithdrawalProcessor::new(config.facility_clock(&self.snapshot), config.edit_bound_policy)
    }

    pub fn validate(&self) -> ValidationResult {
        self.processor().validate(&self.draft, &self.snapshot)
    }

    /// Dispatch the withdrawal and reload the aggregate.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidTransition`] when the accession is awaiting
    /// check-in or used up.
    pub async fn commit(&mut self) -> Result<WithdrawalOutcome, EngineError> {
        self.ensure_open()?;
        let command = self
            .processor()
            .prepare(&self.draft, &self.snapshot)
            .map_err(|e| self.rejected(e))?;
        let accession_id = self.snapshot.id;
        let kind = command.kind();

        self.ensure_fresh().await?;
        let repository = &self.engine.repository;
        let dispatched = match &command {
            WithdrawalCommand::NurseryTransfer(transfer) => repository
                .transfer_to_nursery(accession_id, transfer)
                .await
                .map(|()| DispatchedWithdrawal::NurseryTransfer),
            WithdrawalCommand::ViabilityTest(payload) => repository
                .create_viability_test(accession_id, payload)
                .await
                .map(DispatchedWithdrawal::ViabilityTest),
            WithdrawalCommand::General(withdrawal) => repository
                .create_withdrawal(accession_id, withdrawal)
                .await
                .map(DispatchedWithdrawal::General),
        }
        .map_err(|e| self.dispatch_error(e))?;

        let accession = self.finish().await?;
        tracing::info!(%accession_id, kind, state = %accession.state, "withdrawal dispatched");
        Ok(WithdrawalOutcome {
            dispatched,
            accession,
        })
    }
}
