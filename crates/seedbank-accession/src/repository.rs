//! # Persistence Collaborator
//!
//! The engine reads and writes accessions only through
//! [`AccessionRepository`]. Every mutation returns, or is followed by a
//! reload of, the backend's copy of the aggregate; the engine never keeps
//! a locally mutated copy as the source of truth.
//!
//! Implementations: [`InMemoryAccessionRepository`](crate::InMemoryAccessionRepository)
//! in this crate and the HTTP client in `seedbank-client`.

use std::future::Future;

use seedbank_core::{AccessionId, ViabilityTestId};

use crate::accession::Accession;
use crate::error::RepositoryError;
use crate::viability::{ViabilityTest, ViabilityTestPayload};
use crate::withdrawal::{NewWithdrawal, NurseryTransfer, Withdrawal};

/// Storage for accession aggregates.
///
/// A failed call leaves the backend unchanged. Callers do not retry.
pub trait AccessionRepository: Send + Sync {
    /// Fetch the current aggregate.
    fn load(
        &self,
        accession_id: AccessionId,
    ) -> impl Future<Output = Result<Accession, RepositoryError>> + Send;

    /// Replace the aggregate's editable fields. Fails with
    /// [`RepositoryError::Conflict`] when `accession.version` is not the
    /// persisted version.
    fn save(
        &self,
        accession: &Accession,
    ) -> impl Future<Output = Result<Accession, RepositoryError>> + Send;

    /// Move the accession out of `Awaiting Check-In`.
    fn check_in(
        &self,
        accession_id: AccessionId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Record a general withdrawal and decrement the remaining quantity.
    fn create_withdrawal(
        &self,
        accession_id: AccessionId,
        withdrawal: &NewWithdrawal,
    ) -> impl Future<Output = Result<Withdrawal, RepositoryError>> + Send;

    /// Send seeds to a nursery and decrement the remaining quantity.
    fn transfer_to_nursery(
        &self,
        accession_id: AccessionId,
        transfer: &NurseryTransfer,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Create a viability test, consuming its seeds.
    fn create_viability_test(
        &self,
        accession_id: AccessionId,
        test: &ViabilityTestPayload,
    ) -> impl Future<Output = Result<ViabilityTest, RepositoryError>> + Send;

    /// Replace a viability test.
    fn update_viability_test(
        &self,
        accession_id: AccessionId,
        test_id: ViabilityTestId,
        test: &ViabilityTestPayload,
    ) -> impl Future<Output = Result<ViabilityTest, RepositoryError>> + Send;

    /// Delete a viability test.
    fn delete_viability_test(
        &self,
        accession_id: AccessionId,
        test_id: ViabilityTestId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete the whole aggregate.
    fn delete(
        &self,
        accession_id: AccessionId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}
