//! # Withdrawals
//!
//! A withdrawal removes seeds from an accession for one of three purposes:
//!
//! | purpose | unit | dispatched command |
//! |---|---|---|
//! | `Nursery` | always seeds | [`WithdrawalCommand::NurseryTransfer`] |
//! | `ViabilityTesting` | always seeds | [`WithdrawalCommand::ViabilityTest`] |
//! | `Other` | seeds when entered by count, else the chosen weight unit | [`WithdrawalCommand::General`] |
//!
//! The processor validates and builds the command. It never touches
//! `remainingQuantity`: the repository applies the decrement and the
//! aggregate is reloaded afterwards.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use seedbank_core::{
    parse_date, AccessionId, FacilityClock, FacilityId, ViabilityTestId, WithdrawalId,
};

use crate::accession::Accession;
use crate::config::EditBoundPolicy;
use crate::error::EngineError;
use crate::quantity::{Quantity, QuantityEntry, QuantityLedger, Unit};
use crate::validation::{check_past_date, fields, FieldError, ValidationResult};
use crate::viability::{
    SeedType, Substrate, Treatment, ViabilityTestPayload, ViabilityTestType,
    ViabilityTestValidator,
};

/// Why seeds are withdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WithdrawalPurpose {
    Nursery,
    #[serde(rename = "Viability Testing")]
    ViabilityTesting,
    Other,
}

impl WithdrawalPurpose {
    /// Whether the withdrawn amount is always a seed count.
    pub fn forces_seeds(&self) -> bool {
        matches!(self, Self::Nursery | Self::ViabilityTesting)
    }
}

/// The by-count / by-weight toggle of the withdrawal form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuantityEntryMode {
    ByCount,
    #[default]
    ByWeight,
}

/// A recorded withdrawal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub accession_id: AccessionId,
    pub purpose: WithdrawalPurpose,
    pub date: NaiveDate,
    pub withdrawn_quantity: Quantity,
    #[serde(default)]
    pub destination_facility_id: Option<FacilityId>,
    #[serde(default)]
    pub ready_by_date: Option<NaiveDate>,
    /// Test created by a viability-testing withdrawal.
    #[serde(default)]
    pub viability_test_id: Option<ViabilityTestId>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub withdrawn_by: Option<String>,
}

/// Transfer of seeds to a nursery for germination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NurseryTransfer {
    pub date: NaiveDate,
    pub destination_facility_id: FacilityId,
    pub germinating_quantity: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_by_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawn_by: Option<String>,
}

/// A general withdrawal as sent to the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWithdrawal {
    pub purpose: WithdrawalPurpose,
    pub date: NaiveDate,
    pub withdrawn_quantity: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawn_by: Option<String>,
}

/// The repository command a withdrawal dispatches.
#[derive(Debug, Clone, PartialEq)]
pub enum WithdrawalCommand {
    NurseryTransfer(NurseryTransfer),
    ViabilityTest(ViabilityTestPayload),
    General(NewWithdrawal),
}

impl WithdrawalCommand {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NurseryTransfer(_) => "nursery-transfer",
            Self::ViabilityTest(_) => "viability-test",
            Self::General(_) => "withdrawal",
        }
    }
}

/// Test settings entered on a viability-testing withdrawal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithdrawalTestDraft {
    pub test_type: Option<ViabilityTestType>,
    pub seed_type: Option<SeedType>,
    pub substrate: Option<Substrate>,
    pub treatment: Option<Treatment>,
    pub notes: Option<String>,
}

/// Withdrawal form state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WithdrawalDraft {
    pub purpose: Option<WithdrawalPurpose>,
    /// Entered date (`YYYY-MM-DD`).
    pub date: Option<String>,
    /// Entered amount. The unit is ignored where the purpose or entry mode
    /// forces seeds.
    pub quantity: QuantityEntry,
    pub entry_mode: QuantityEntryMode,
    pub destination_facility_id: Option<FacilityId>,
    pub ready_by_date: Option<String>,
    pub viability_test: WithdrawalTestDraft,
    pub notes: Option<String>,
    pub withdrawn_by: Option<String>,
}

impl WithdrawalDraft {
    /// A blank draft dated `today`.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            date: Some(seedbank_core::format_date(today)),
            ..Self::default()
        }
    }
}

/// Validates withdrawal drafts and builds the command to dispatch.
#[derive(Debug, Clone, Copy)]
pub struct WithdrawalProcessor {
    clock: FacilityClock,
    tests: ViabilityTestValidator,
}

impl WithdrawalProcessor {
    pub fn new(clock: FacilityClock, policy: EditBoundPolicy) -> Self {
        Self {
            clock,
            tests: ViabilityTestValidator::new(clock, policy),
        }
    }

    /// The unit the withdrawal is committed in.
    pub fn effective_unit(draft: &WithdrawalDraft) -> Option<Unit> {
        let forced = draft.purpose.map_or(false, |p| p.forces_seeds())
            || draft.entry_mode == QuantityEntryMode::ByCount;
        if forced {
            Some(Unit::Seeds)
        } else {
            draft.quantity.unit
        }
    }

    /// Validate `draft` against `accession`.
    pub fn validate(&self, draft: &WithdrawalDraft, accession: &Accession) -> ValidationResult {
        let mut result = ValidationResult::new();

        if draft.purpose.is_none() {
            result.add(fields::PURPOSE, FieldError::RequiredField);
        }
        check_past_date(&self.clock, draft.date.as_deref(), fields::DATE, &mut result);

        let entry = QuantityEntry::new(draft.quantity.quantity, Self::effective_unit(draft));
        let withdrawn = match entry.validate(fields::WITHDRAWN_QUANTITY, false) {
            Ok(quantity) => Some(quantity),
            Err(errors) => {
                result.merge(errors);
                None
            }
        };
        if let Some(withdrawn) = withdrawn {
            if let Some(available) = QuantityLedger::available_in(accession, withdrawn.unit) {
                if withdrawn.quantity > available + f64::EPSILON {
                    result.add(
                        fields::WITHDRAWN_QUANTITY,
                        FieldError::ExceedsBound { limit: available },
                    );
                }
            }
        }

        match draft.purpose {
            Some(WithdrawalPurpose::Nursery) => {
                if draft.destination_facility_id.is_none() {
                    result.add(fields::DESTINATION_FACILITY_ID, FieldError::RequiredField);
                }
                if let Some(raw) = draft.ready_by_date.as_deref().map(str::trim) {
                    if !raw.is_empty() && parse_date(raw).is_err() {
                        result.add(fields::READY_BY_DATE, FieldError::InvalidDate);
                    }
                }
            }
            Some(WithdrawalPurpose::ViabilityTesting) => {
                let seeds = withdrawn.map(|q| q.quantity as u64);
                let nested = self.tests.validate_for_withdrawal(
                    draft.viability_test.test_type,
                    draft.date.as_deref(),
                    seeds,
                    accession,
                );
                result.merge_prefixed(fields::VIABILITY_TEST, nested);
            }
            Some(WithdrawalPurpose::Other) | None => {}
        }
        result
    }

    /// Validate `draft` and build the command to dispatch.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidTransition`] when the accession's state does
    /// not allow withdrawals, [`EngineError::Validation`] when fields are
    /// invalid.
    pub fn prepare(
        &self,
        draft: &WithdrawalDraft,
        accession: &Accession,
    ) -> Result<WithdrawalCommand, EngineError> {
        if !accession.state.allows_withdrawal() {
            return Err(EngineError::InvalidTransition {
                from: accession.state.to_string(),
                to: "withdrawal".to_string(),
            });
        }
        let result = self.validate(draft, accession);
        if !result.is_valid() {
            return Err(EngineError::Validation(result));
        }

        let parsed = (
            draft.purpose,
            draft.date.as_deref().map(parse_date),
            draft.quantity.quantity,
            Self::effective_unit(draft),
        );
        let (Some(purpose), Some(Ok(date)), Some(amount), Some(unit)) = parsed else {
            return Err(EngineError::Validation(result));
        };
        let withdrawn = Quantity::new(amount, unit)?;

        let command = match purpose {
            WithdrawalPurpose::Nursery => {
                let Some(destination_facility_id) = draft.destination_facility_id else {
                    return Err(EngineError::Validation(result));
                };
                WithdrawalCommand::NurseryTransfer(NurseryTransfer {
                    date,
                    destination_facility_id,
                    germinating_quantity: withdrawn.quantity as u64,
                    ready_by_date: draft
                        .ready_by_date
                        .as_deref()
                        .and_then(|raw| parse_date(raw).ok()),
                    notes: draft.notes.clone(),
                    withdrawn_by: draft.withdrawn_by.clone(),
                })
            }
            WithdrawalPurpose::ViabilityTesting => {
                let Some(test_type) = draft.viability_test.test_type else {
                    return Err(EngineError::Validation(result));
                };
                WithdrawalCommand::ViabilityTest(ViabilityTestPayload {
                    test_type,
                    seed_type: draft.viability_test.seed_type,
                    substrate: draft.viability_test.substrate,
                    treatment: draft.viability_test.treatment,
                    start_date: date,
                    end_date: None,
                    seeds_tested: withdrawn.quantity as u64,
                    seeds_filled: None,
                    seeds_compromised: None,
                    seeds_empty: None,
                    test_results: Vec::new(),
                    notes: draft.viability_test.notes.clone(),
                })
            }
            WithdrawalPurpose::Other => WithdrawalCommand::General(NewWithdrawal {
                purpose,
                date,
                withdrawn_quantity: withdrawn,
                notes: draft.notes.clone(),
                withdrawn_by: draft.withdrawn_by.clone(),
            }),
        };
        Ok(command)
    }
}
