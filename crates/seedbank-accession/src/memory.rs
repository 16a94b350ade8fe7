//! In-memory [`AccessionRepository`] with backend semantics.
//!
//! Used by tests and by the development stub server. Every mutation bumps
//! the aggregate's `version`; [`save`](AccessionRepository::save) rejects a
//! stale version with [`RepositoryError::Conflict`]. Withdrawals, nursery
//! transfers, and viability tests decrement the remaining quantity,
//! converting through SI factors or the subset ratio when the withdrawn
//! unit differs from the stored one. Depletion and revival follow
//! [`Accession::apply_quantity_side_effects`]: a drying or stored accession
//! whose remaining quantity reaches zero becomes `Used Up`, and returned
//! seeds revive it into the repository's revive state.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use seedbank_core::{AccessionId, ViabilityTestId, WithdrawalId};

use crate::accession::Accession;
use crate::error::RepositoryError;
use crate::quantity::{round2, Quantity, QuantityLedger, Unit};
use crate::repository::AccessionRepository;
use crate::state::AccessionState;
use crate::viability::{ViabilityTest, ViabilityTestPayload};
use crate::withdrawal::{NewWithdrawal, NurseryTransfer, Withdrawal, WithdrawalPurpose};

/// Shared in-memory accession store. Clones share the same data.
#[derive(Debug, Clone)]
pub struct InMemoryAccessionRepository {
    accessions: Arc<RwLock<HashMap<AccessionId, Accession>>>,
    revive_state: AccessionState,
}

impl Default for InMemoryAccessionRepository {
    fn default() -> Self {
        Self {
            accessions: Arc::default(),
            revive_state: AccessionState::InStorage,
        }
    }
}

impl InMemoryAccessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state a used-up accession returns to when seeds come back,
    /// normally [`EngineConfig::revive_state`](crate::EngineConfig).
    pub fn with_revive_state(mut self, revive_state: AccessionState) -> Self {
        self.revive_state = revive_state;
        self
    }

    /// Store `accession` as given, replacing any accession with the same id.
    pub fn insert(&self, accession: Accession) -> Accession {
        self.accessions
            .write()
            .insert(accession.id, accession.clone());
        accession
    }

    /// A copy of the stored accession.
    pub fn get(&self, accession_id: &AccessionId) -> Option<Accession> {
        self.accessions.read().get(accession_id).cloned()
    }

    /// Number of stored accessions.
    pub fn len(&self) -> usize {
        self.accessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessions.read().is_empty()
    }

    /// Run `f` against the stored accession and bump its version when `f`
    /// succeeds.
    fn mutate<T>(
        &self,
        accession_id: AccessionId,
        f: impl FnOnce(&mut Accession) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut accessions = self.accessions.write();
        let stored = accessions
            .get_mut(&accession_id)
            .ok_or_else(|| not_found(accession_id))?;
        // Work on a copy so a failed mutation leaves the store unchanged.
        let mut working = stored.clone();
        let value = f(&mut working)?;
        working.version += 1;
        *stored = working;
        Ok(value)
    }
}

fn not_found(accession_id: AccessionId) -> RepositoryError {
    RepositoryError::NotFound {
        resource: accession_id.to_string(),
    }
}

fn test_not_found(test_id: ViabilityTestId) -> RepositoryError {
    RepositoryError::NotFound {
        resource: test_id.to_string(),
    }
}

/// Express `amount` in the unit of the accession's remaining quantity.
fn in_remaining_unit(accession: &Accession, amount: &Quantity) -> Result<Option<f64>, RepositoryError> {
    let Some(remaining) = accession.remaining_quantity else {
        return Ok(None);
    };
    let subset = accession.subset_weight.zip(accession.subset_count);
    let converted = match (remaining.unit, amount.unit) {
        (Unit::Seeds, Unit::Seeds) => Some(amount.quantity),
        (Unit::Seeds, _) => subset
            .and_then(|(weight, count)| QuantityLedger::estimate_from_subset(&weight, count, amount))
            .map(|count| count as f64),
        (_, Unit::Seeds) => subset
            .and_then(|(weight, count)| {
                QuantityLedger::estimate_weight_from_subset(&weight, count, amount.quantity)
            })
            .and_then(|weight| weight.convert_to(remaining.unit).ok())
            .map(|q| q.quantity),
        (unit, _) => amount.convert_to(unit).ok().map(|q| q.quantity),
    };
    converted.map(Some).ok_or_else(|| RepositoryError::Rejected {
        reason: format!(
            "cannot express {amount} in {} without a subset estimate",
            remaining.unit
        ),
    })
}

/// Remove `amount` from the remaining quantity, saturating at zero, and
/// apply depletion.
fn consume(
    accession: &mut Accession,
    amount: &Quantity,
    revive_state: AccessionState,
) -> Result<(), RepositoryError> {
    let Some(delta) = in_remaining_unit(accession, amount)? else {
        return Ok(());
    };
    adjust_remaining(accession, -delta);
    accession.apply_quantity_side_effects(revive_state);
    Ok(())
}

/// Return `amount` to the remaining quantity, reviving a used-up
/// accession.
fn restore(
    accession: &mut Accession,
    amount: &Quantity,
    revive_state: AccessionState,
) -> Result<(), RepositoryError> {
    let Some(delta) = in_remaining_unit(accession, amount)? else {
        return Ok(());
    };
    adjust_remaining(accession, delta);
    accession.apply_quantity_side_effects(revive_state);
    Ok(())
}

fn adjust_remaining(accession: &mut Accession, delta: f64) {
    if let Some(remaining) = accession.remaining_quantity.as_mut() {
        let next = (remaining.quantity + delta).max(0.0);
        remaining.quantity = if remaining.unit == Unit::Seeds {
            next.round()
        } else {
            round2(next)
        };
    }
    QuantityLedger::refresh_estimates(accession);
}

impl AccessionRepository for InMemoryAccessionRepository {
    async fn load(&self, accession_id: AccessionId) -> Result<Accession, RepositoryError> {
        self.get(&accession_id).ok_or_else(|| not_found(accession_id))
    }

    async fn save(&self, accession: &Accession) -> Result<Accession, RepositoryError> {
        self.mutate(accession.id, |stored| {
            if stored.version != accession.version {
                return Err(RepositoryError::Conflict {
                    resource: accession.id.to_string(),
                    reason: format!(
                        "version {} does not match stored version {}",
                        accession.version, stored.version
                    ),
                });
            }
            // Tests and withdrawals are owned by their own operations.
            let viability_tests = std::mem::take(&mut stored.viability_tests);
            let withdrawals = std::mem::take(&mut stored.withdrawals);
            *stored = accession.clone();
            stored.viability_tests = viability_tests;
            stored.withdrawals = withdrawals;
            Ok(())
        })?;
        self.load(accession.id).await
    }

    async fn check_in(&self, accession_id: AccessionId) -> Result<(), RepositoryError> {
        self.mutate(accession_id, |stored| {
            if stored.state != AccessionState::AwaitingCheckIn {
                return Err(RepositoryError::Rejected {
                    reason: format!("{accession_id} is {}, not awaiting check-in", stored.state),
                });
            }
            stored.state = AccessionState::AwaitingProcessing;
            Ok(())
        })
    }

    async fn create_withdrawal(
        &self,
        accession_id: AccessionId,
        withdrawal: &NewWithdrawal,
    ) -> Result<Withdrawal, RepositoryError> {
        self.mutate(accession_id, |stored| {
            consume(stored, &withdrawal.withdrawn_quantity, self.revive_state)?;
            let record = Withdrawal {
                id: WithdrawalId::new(),
                accession_id,
                purpose: withdrawal.purpose,
                date: withdrawal.date,
                withdrawn_quantity: withdrawal.withdrawn_quantity,
                destination_facility_id: None,
                ready_by_date: None,
                viability_test_id: None,
                notes: withdrawal.notes.clone(),
                withdrawn_by: withdrawal.withdrawn_by.clone(),
            };
            stored.withdrawals.push(record.clone());
            Ok(record)
        })
    }

    async fn transfer_to_nursery(
        &self,
        accession_id: AccessionId,
        transfer: &NurseryTransfer,
    ) -> Result<(), RepositoryError> {
        self.mutate(accession_id, |stored| {
            let withdrawn = Quantity::seeds(transfer.germinating_quantity);
            consume(stored, &withdrawn, self.revive_state)?;
            stored.withdrawals.push(Withdrawal {
                id: WithdrawalId::new(),
                accession_id,
                purpose: WithdrawalPurpose::Nursery,
                date: transfer.date,
                withdrawn_quantity: withdrawn,
                destination_facility_id: Some(transfer.destination_facility_id),
                ready_by_date: transfer.ready_by_date,
                viability_test_id: None,
                notes: transfer.notes.clone(),
                withdrawn_by: transfer.withdrawn_by.clone(),
            });
            Ok(())
        })
    }

    async fn create_viability_test(
        &self,
        accession_id: AccessionId,
        test: &ViabilityTestPayload,
    ) -> Result<ViabilityTest, RepositoryError> {
        self.mutate(accession_id, |stored| {
            let created = ViabilityTest::from_payload(ViabilityTestId::new(), accession_id, test.clone());
            let withdrawn = Quantity::seeds(created.seeds_tested);
            consume(stored, &withdrawn, self.revive_state)?;
            stored.withdrawals.push(Withdrawal {
                id: WithdrawalId::new(),
                accession_id,
                purpose: WithdrawalPurpose::ViabilityTesting,
                date: created.start_date,
                withdrawn_quantity: withdrawn,
                destination_facility_id: None,
                ready_by_date: None,
                viability_test_id: Some(created.id),
                notes: None,
                withdrawn_by: None,
            });
            stored.viability_tests.push(created.clone());
            Ok(created)
        })
    }

    async fn update_viability_test(
        &self,
        accession_id: AccessionId,
        test_id: ViabilityTestId,
        test: &ViabilityTestPayload,
    ) -> Result<ViabilityTest, RepositoryError> {
        self.mutate(accession_id, |stored| {
            let previous = stored
                .viability_test(&test_id)
                .cloned()
                .ok_or_else(|| test_not_found(test_id))?;
            if previous.is_locked() {
                return Err(RepositoryError::Rejected {
                    reason: format!("{test_id} is locked"),
                });
            }
            let updated = ViabilityTest::from_payload(test_id, accession_id, test.clone());
            if updated.seeds_tested > previous.seeds_tested {
                let more = Quantity::seeds(updated.seeds_tested - previous.seeds_tested);
                consume(stored, &more, self.revive_state)?;
            } else if updated.seeds_tested < previous.seeds_tested {
                let fewer = Quantity::seeds(previous.seeds_tested - updated.seeds_tested);
                restore(stored, &fewer, self.revive_state)?;
            }
            for withdrawal in stored
                .withdrawals
                .iter_mut()
                .filter(|w| w.viability_test_id == Some(test_id))
            {
                withdrawal.withdrawn_quantity = Quantity::seeds(updated.seeds_tested);
            }
            for slot in stored.viability_tests.iter_mut().filter(|t| t.id == test_id) {
                *slot = updated.clone();
            }
            Ok(updated)
        })
    }

    async fn delete_viability_test(
        &self,
        accession_id: AccessionId,
        test_id: ViabilityTestId,
    ) -> Result<(), RepositoryError> {
        self.mutate(accession_id, |stored| {
            let removed = stored
                .viability_test(&test_id)
                .cloned()
                .ok_or_else(|| test_not_found(test_id))?;
            restore(stored, &Quantity::seeds(removed.seeds_tested), self.revive_state)?;
            stored.viability_tests.retain(|t| t.id != test_id);
            stored.withdrawals.retain(|w| w.viability_test_id != Some(test_id));
            Ok(())
        })
    }

    async fn delete(&self, accession_id: AccessionId) -> Result<(), RepositoryError> {
        self.accessions
            .write()
            .remove(&accession_id)
            .map(|_| ())
            .ok_or_else(|| not_found(accession_id))
    }
}
