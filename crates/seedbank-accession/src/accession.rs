//! # Accession Aggregate
//!
//! An [`Accession`] is the aggregate root: one seed collection tracked
//! through intake, processing, storage, and disposition. Viability tests
//! and withdrawals belong to exactly one accession and are never
//! re-parented.
//!
//! The aggregate is loaded from an [`AccessionRepository`], mutated on a
//! draft copy by the engine components, and persisted back. Its `version`
//! is bumped by the repository on every write and used to reject commits
//! made against a stale snapshot.
//!
//! [`AccessionRepository`]: crate::AccessionRepository

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use seedbank_core::{AccessionId, AccessionNumber, FacilityId, ViabilityTestId};

use crate::error::EngineError;
use crate::quantity::Quantity;
use crate::state::{self, AccessionState};
use crate::viability::ViabilityTest;
use crate::withdrawal::Withdrawal;

/// A seed accession with its tests and withdrawals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accession {
    /// Unique accession identifier.
    pub id: AccessionId,
    /// Human-facing accession number.
    pub accession_number: AccessionNumber,
    /// Current lifecycle state.
    pub state: AccessionState,
    /// Seed bank holding the accession.
    pub facility_id: FacilityId,
    /// Storage location within the facility.
    #[serde(default)]
    pub sub_location: Option<String>,
    /// IANA zone of the seed bank; falls back to the engine default.
    #[serde(default)]
    pub time_zone: Option<Tz>,
    /// Species, informational.
    #[serde(default)]
    pub species_name: Option<String>,
    /// When the seeds were collected.
    #[serde(default)]
    pub collected_date: Option<NaiveDate>,
    /// When the seeds were received at the seed bank.
    #[serde(default)]
    pub received_date: Option<NaiveDate>,
    /// When drying ended.
    #[serde(default)]
    pub drying_end_date: Option<NaiveDate>,
    /// Measured remaining quantity.
    #[serde(default)]
    pub remaining_quantity: Option<Quantity>,
    /// Seed count estimated from a weight.
    #[serde(default)]
    pub estimated_count: Option<u64>,
    /// Weight estimated from a seed count.
    #[serde(default)]
    pub estimated_weight: Option<Quantity>,
    /// Weight of the subset sample.
    #[serde(default)]
    pub subset_weight: Option<Quantity>,
    /// Seed count of the subset sample.
    #[serde(default)]
    pub subset_count: Option<u64>,
    /// Viability of the accession, as reported by the backend.
    #[serde(default)]
    pub viability_percent: Option<f64>,
    /// Free-text notes.
    #[serde(default)]
    pub notes: Option<String>,
    /// Viability tests run on this accession.
    #[serde(default)]
    pub viability_tests: Vec<ViabilityTest>,
    /// Withdrawals from this accession.
    #[serde(default)]
    pub withdrawals: Vec<Withdrawal>,
    /// Optimistic concurrency token.
    #[serde(default)]
    pub version: u64,
}

impl Accession {
    /// Create a new accession awaiting check-in.
    pub fn new(accession_number: AccessionNumber, facility_id: FacilityId) -> Self {
        Self {
            id: AccessionId::new(),
            accession_number,
            state: AccessionState::AwaitingCheckIn,
            facility_id,
            sub_location: None,
            time_zone: None,
            species_name: None,
            collected_date: None,
            received_date: None,
            drying_end_date: None,
            remaining_quantity: None,
            estimated_count: None,
            estimated_weight: None,
            subset_weight: None,
            subset_count: None,
            viability_percent: None,
            notes: None,
            viability_tests: Vec::new(),
            withdrawals: Vec::new(),
            version: 0,
        }
    }

    /// Look up a viability test by id.
    pub fn viability_test(&self, test_id: &ViabilityTestId) -> Option<&ViabilityTest> {
        self.viability_tests.iter().find(|t| &t.id == test_id)
    }

    /// Apply a user-chosen status change.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidTransition`] if `target` is not selectable
    /// from the current state.
    pub fn transition_to(&mut self, target: AccessionState) -> Result<(), EngineError> {
        state::validate_transition(self.state, target)?;
        self.state = target;
        Ok(())
    }

    /// Check the accession in (AWAITING CHECK-IN → `post_check_in`).
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidTransition`] unless the accession is awaiting
    /// check-in.
    pub fn check_in(&mut self, post_check_in: AccessionState) -> Result<(), EngineError> {
        state::validate_check_in(self.state, post_check_in)?;
        self.state = post_check_in;
        Ok(())
    }

    /// Apply depletion or revival after the remaining quantity changed.
    /// Returns the new state when it changed.
    pub fn apply_quantity_side_effects(
        &mut self,
        revive_state: AccessionState,
    ) -> Option<AccessionState> {
        let is_zero = self.remaining_quantity.map_or(false, |q| q.is_zero());
        let next = state::quantity_side_effect(self.state, is_zero, revive_state)?;
        self.state = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::{QuantityLedger, Unit};

    fn make_accession() -> Accession {
        Accession::new(AccessionNumber::new("22-1-001").unwrap(), FacilityId::new())
    }

    #[test]
    fn test_new_accession_awaits_check_in() {
        let a = make_accession();
        assert_eq!(a.state, AccessionState::AwaitingCheckIn);
        assert_eq!(a.version, 0);
        assert!(a.viability_tests.is_empty());
    }

    #[test]
    fn test_check_in_is_one_way() {
        let mut a = make_accession();
        a.check_in(AccessionState::AwaitingProcessing).unwrap();
        assert_eq!(a.state, AccessionState::AwaitingProcessing);
        let err = a.check_in(AccessionState::AwaitingProcessing).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn test_transition_leaves_state_on_rejection() {
        let mut a = make_accession();
        a.state = AccessionState::Drying;
        assert!(a.transition_to(AccessionState::UsedUp).is_err());
        assert_eq!(a.state, AccessionState::Drying);
        a.transition_to(AccessionState::InStorage).unwrap();
        assert_eq!(a.state, AccessionState::InStorage);
    }

    #[test]
    fn test_depletion_and_revival() {
        let mut a = make_accession();
        a.state = AccessionState::InStorage;
        QuantityLedger::set_remaining_quantity(&mut a, 0.0, Unit::Seeds).unwrap();
        assert_eq!(
            a.apply_quantity_side_effects(AccessionState::InStorage),
            Some(AccessionState::UsedUp)
        );
        QuantityLedger::set_remaining_quantity(&mut a, 10.0, Unit::Seeds).unwrap();
        assert_eq!(
            a.apply_quantity_side_effects(AccessionState::InStorage),
            Some(AccessionState::InStorage)
        );
        assert_eq!(a.apply_quantity_side_effects(AccessionState::InStorage), None);
    }

    #[test]
    fn test_deserialize_minimal_backend_payload() {
        let json = serde_json::json!({
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "accessionNumber": "22-1-001",
            "state": "Drying",
            "facilityId": "550e8400-e29b-41d4-a716-446655440001",
            "timeZone": "America/Chicago",
            "remainingQuantity": {"quantity": 12.5, "unit": "Grams"}
        });
        let a: Accession = serde_json::from_value(json).unwrap();
        assert_eq!(a.state, AccessionState::Drying);
        assert_eq!(a.time_zone, Some(chrono_tz::America::Chicago));
        assert_eq!(a.remaining_quantity.unwrap().unit, Unit::Grams);
        assert_eq!(a.version, 0);
        assert!(a.withdrawals.is_empty());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let a = make_accession();
        let json = serde_json::to_string(&a).unwrap();
        let parsed: Accession = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, a);
    }
}
