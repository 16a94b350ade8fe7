//! # Viability Tests
//!
//! A viability test measures the germination rate of a sample of an
//! accession's seeds. Two families exist:
//!
//! - **Lab-style** (`Lab`, `Nursery`): seeds are sown and germination is
//!   recorded over time as [`TestResult`] observations. The test is
//!   completed explicitly, which sets `endDate`.
//! - **Cut**: each seed in the sample is cut open and classified as
//!   filled, compromised, or empty. `seedsTested` is the sum of the three
//!   and is never entered directly. A Cut test has no completion flag; it
//!   is resolved once all three counts are recorded.
//!
//! ## Locking
//!
//! A test with an `endDate` and at least one result is read-only. Drafts
//! opened from a locked test reject every mutation with
//! [`EngineError::TestLocked`].
//!
//! ## Bounds
//!
//! A test cannot consume more seeds than the accession holds. For an
//! existing test, the seeds it already consumed are added back according
//! to the configured [`EditBoundPolicy`]. The germinated total across all
//! results cannot exceed `seedsTested`; the violation is reported on the
//! last result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use seedbank_core::{parse_date, AccessionId, FacilityClock, ViabilityTestId};

use crate::accession::Accession;
use crate::config::EditBoundPolicy;
use crate::error::EngineError;
use crate::quantity::QuantityLedger;
use crate::validation::{check_past_date, fields, FieldError, ValidationResult};

// ─── Test metadata ───────────────────────────────────────────────────

/// Kind of viability test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViabilityTestType {
    /// Germination in a lab.
    Lab,
    /// Germination in a nursery.
    Nursery,
    /// Cut test.
    Cut,
}

impl ViabilityTestType {
    /// Whether this is a Cut test.
    pub fn is_cut(&self) -> bool {
        matches!(self, Self::Cut)
    }
}

/// Age of the seeds tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeedType {
    Fresh,
    Stored,
}

/// Growing substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Substrate {
    #[serde(rename = "Agar")]
    Agar,
    #[serde(rename = "Paper")]
    Paper,
    #[serde(rename = "Nursery Media")]
    NurseryMedia,
    Sand,
    #[serde(rename = "Media Mix")]
    MediaMix,
    Moss,
    #[serde(rename = "Perlite/Vermiculite")]
    PerliteVermiculite,
    Other,
    None,
}

/// Pre-sowing treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Treatment {
    Soak,
    Scarify,
    Chemical,
    Stratification,
    Light,
    #[serde(rename = "GA3")]
    Ga3,
    Other,
}

// ─── Persisted tests ─────────────────────────────────────────────────

/// One germination observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// When the observation was made.
    pub recording_date: NaiveDate,
    /// Seeds germinated since the previous observation.
    pub seeds_germinated: u64,
}

/// A persisted viability test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViabilityTest {
    /// Unique test identifier.
    pub id: ViabilityTestId,
    /// Owning accession.
    pub accession_id: AccessionId,
    /// Test kind.
    pub test_type: ViabilityTestType,
    #[serde(default)]
    pub seed_type: Option<SeedType>,
    #[serde(default)]
    pub substrate: Option<Substrate>,
    #[serde(default)]
    pub treatment: Option<Treatment>,
    /// When the test started.
    pub start_date: NaiveDate,
    /// When the test was completed.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Seeds in the sample.
    pub seeds_tested: u64,
    #[serde(default)]
    pub seeds_filled: Option<u64>,
    #[serde(default)]
    pub seeds_compromised: Option<u64>,
    #[serde(default)]
    pub seeds_empty: Option<u64>,
    /// Germination observations.
    #[serde(default)]
    pub test_results: Vec<TestResult>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ViabilityTest {
    /// Build a test from a payload.
    pub fn from_payload(
        id: ViabilityTestId,
        accession_id: AccessionId,
        payload: ViabilityTestPayload,
    ) -> Self {
        Self {
            id,
            accession_id,
            test_type: payload.test_type,
            seed_type: payload.seed_type,
            substrate: payload.substrate,
            treatment: payload.treatment,
            start_date: payload.start_date,
            end_date: payload.end_date,
            seeds_tested: payload.seeds_tested,
            seeds_filled: payload.seeds_filled,
            seeds_compromised: payload.seeds_compromised,
            seeds_empty: payload.seeds_empty,
            test_results: payload.test_results,
            notes: payload.notes,
        }
    }

    /// Whether the test is read-only.
    pub fn is_locked(&self) -> bool {
        self.end_date.is_some() && !self.test_results.is_empty()
    }

    /// Total seeds germinated across all observations.
    pub fn total_germinated(&self) -> u64 {
        self.test_results.iter().map(|r| r.seeds_germinated).sum()
    }

    /// Whether the outcome is known: completed for lab-style tests, all
    /// three counts recorded for Cut tests.
    pub fn is_resolved(&self) -> bool {
        if self.test_type.is_cut() {
            self.seeds_filled.is_some()
                && self.seeds_compromised.is_some()
                && self.seeds_empty.is_some()
        } else {
            self.end_date.is_some()
        }
    }

    /// Viability percentage: germinated share for lab-style tests, filled
    /// share for Cut tests. `None` without seeds tested.
    pub fn viability_percent(&self) -> Option<u64> {
        if self.seeds_tested == 0 {
            return None;
        }
        let viable = if self.test_type.is_cut() {
            self.seeds_filled?
        } else {
            self.total_germinated()
        };
        Some((viable as f64 / self.seeds_tested as f64 * 100.0).round() as u64)
    }
}

/// The writable fields of a viability test, as sent to the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViabilityTestPayload {
    pub test_type: ViabilityTestType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_type: Option<SeedType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substrate: Option<Substrate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment: Option<Treatment>,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub seeds_tested: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeds_filled: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeds_compromised: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeds_empty: Option<u64>,
    #[serde(default)]
    pub test_results: Vec<TestResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ─── Drafts ──────────────────────────────────────────────────────────

/// A germination observation as entered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestResultDraft {
    /// Entered recording date (`YYYY-MM-DD`).
    pub recording_date: Option<String>,
    /// Entered germinated count.
    pub seeds_germinated: Option<i64>,
}

/// Editor state for creating or editing a viability test.
///
/// Fields are private so that every mutation passes the lock check and
/// keeps the Cut-test sum current.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViabilityTestDraft {
    test_id: Option<ViabilityTestId>,
    locked: bool,
    test_type: Option<ViabilityTestType>,
    seed_type: Option<SeedType>,
    substrate: Option<Substrate>,
    treatment: Option<Treatment>,
    start_date: Option<String>,
    seeds_tested: Option<i64>,
    seeds_filled: Option<i64>,
    seeds_compromised: Option<i64>,
    seeds_empty: Option<i64>,
    test_results: Vec<TestResultDraft>,
    completed: bool,
    notes: Option<String>,
}

impl ViabilityTestDraft {
    /// A blank draft for a new test.
    pub fn new() -> Self {
        Self::default()
    }

    /// A draft seeded from a persisted test.
    pub fn from_test(test: &ViabilityTest) -> Self {
        let count = |v: Option<u64>| v.map(|n| n as i64);
        Self {
            test_id: Some(test.id),
            locked: test.is_locked(),
            test_type: Some(test.test_type),
            seed_type: test.seed_type,
            substrate: test.substrate,
            treatment: test.treatment,
            start_date: Some(seedbank_core::format_date(test.start_date)),
            seeds_tested: Some(test.seeds_tested as i64),
            seeds_filled: count(test.seeds_filled),
            seeds_compromised: count(test.seeds_compromised),
            seeds_empty: count(test.seeds_empty),
            test_results: test
                .test_results
                .iter()
                .map(|r| TestResultDraft {
                    recording_date: Some(seedbank_core::format_date(r.recording_date)),
                    seeds_germinated: Some(r.seeds_germinated as i64),
                })
                .collect(),
            completed: test.end_date.is_some(),
            notes: test.notes.clone(),
        }
    }

    /// The test being edited, `None` for a new test.
    pub fn test_id(&self) -> Option<ViabilityTestId> {
        self.test_id
    }

    /// Whether the draft was opened from a locked test.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// The chosen test type.
    pub fn test_type(&self) -> Option<ViabilityTestType> {
        self.test_type
    }

    /// Seed preparation, if recorded.
    pub fn seed_type(&self) -> Option<SeedType> {
        self.seed_type
    }

    /// Germination substrate, if recorded.
    pub fn substrate(&self) -> Option<Substrate> {
        self.substrate
    }

    /// Pre-test treatment, if recorded.
    pub fn treatment(&self) -> Option<Treatment> {
        self.treatment
    }

    /// Start date as entered, `YYYY-MM-DD`.
    pub fn start_date(&self) -> Option<&str> {
        self.start_date.as_deref()
    }

    /// Seeds tested: entered for lab-style tests, computed for Cut tests.
    pub fn seeds_tested(&self) -> Option<i64> {
        self.seeds_tested
    }

    /// Cut test: seeds found filled.
    pub fn seeds_filled(&self) -> Option<i64> {
        self.seeds_filled
    }

    /// Cut test: seeds found compromised.
    pub fn seeds_compromised(&self) -> Option<i64> {
        self.seeds_compromised
    }

    /// Cut test: seeds found empty.
    pub fn seeds_empty(&self) -> Option<i64> {
        self.seeds_empty
    }

    /// Observations in entry order.
    pub fn test_results(&self) -> &[TestResultDraft] {
        &self.test_results
    }

    /// Whether a lab-style test is marked complete.
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Whether the completion toggle is offered.
    pub fn completion_available(&self) -> bool {
        !self.locked && !self.is_cut() && !self.test_results.is_empty()
    }

    fn is_cut(&self) -> bool {
        self.test_type.map_or(false, |t| t.is_cut())
    }

    fn guard(&self) -> Result<(), EngineError> {
        match self.test_id {
            Some(test_id) if self.locked => Err(EngineError::TestLocked { test_id }),
            _ => Ok(()),
        }
    }

    /// Cut tests only. An overflowing sum leaves `seedsTested` unset and
    /// validation reports it.
    fn recompute_cut_total(&mut self) {
        if self.is_cut() {
            self.seeds_tested = self
                .seeds_filled
                .unwrap_or(0)
                .checked_add(self.seeds_compromised.unwrap_or(0))
                .and_then(|sum| sum.checked_add(self.seeds_empty.unwrap_or(0)));
        }
    }

    /// Change the test type. Switching to Cut recomputes `seedsTested` and
    /// clears the completion flag.
    ///
    /// # Errors
    ///
    /// [`EngineError::TestLocked`] when the draft was opened from a locked test.
    pub fn set_test_type(&mut self, test_type: ViabilityTestType) -> Result<(), EngineError> {
        self.guard()?;
        self.test_type = Some(test_type);
        if test_type.is_cut() {
            self.completed = false;
            self.recompute_cut_total();
        }
        Ok(())
    }

    /// Set or clear the seed preparation.
    ///
    /// # Errors
    ///
    /// [`EngineError::TestLocked`] when the draft was opened from a locked test.
    pub fn set_seed_type(&mut self, seed_type: Option<SeedType>) -> Result<(), EngineError> {
        self.guard()?;
        self.seed_type = seed_type;
        Ok(())
    }

    /// Set or clear the substrate.
    ///
    /// # Errors
    ///
    /// [`EngineError::TestLocked`] when the draft was opened from a locked test.
    pub fn set_substrate(&mut self, substrate: Option<Substrate>) -> Result<(), EngineError> {
        self.guard()?;
        self.substrate = substrate;
        Ok(())
    }

    /// Set or clear the treatment.
    ///
    /// # Errors
    ///
    /// [`EngineError::TestLocked`] when the draft was opened from a locked test.
    pub fn set_treatment(&mut self, treatment: Option<Treatment>) -> Result<(), EngineError> {
        self.guard()?;
        self.treatment = treatment;
        Ok(())
    }

    /// Set the start date. Format and range are checked by validation.
    ///
    /// # Errors
    ///
    /// [`EngineError::TestLocked`] when the draft was opened from a locked test.
    pub fn set_start_date(&mut self, date: Option<String>) -> Result<(), EngineError> {
        self.guard()?;
        self.start_date = date;
        Ok(())
    }

    /// Set or clear free-text notes.
    ///
    /// # Errors
    ///
    /// [`EngineError::TestLocked`] when the draft was opened from a locked test.
    pub fn set_notes(&mut self, notes: Option<String>) -> Result<(), EngineError> {
        self.guard()?;
        self.notes = notes;
        Ok(())
    }

    /// Enter `seedsTested` for a lab-style test.
    ///
    /// # Errors
    ///
    /// [`EngineError::ComputedField`] on a Cut test, or
    /// [`EngineError::TestLocked`] when the draft was opened from a locked
    /// test.
    pub fn set_seeds_tested(&mut self, seeds: Option<i64>) -> Result<(), EngineError> {
        self.guard()?;
        if self.is_cut() {
            return Err(EngineError::ComputedField {
                field: fields::SEEDS_TESTED,
            });
        }
        self.seeds_tested = seeds;
        Ok(())
    }

    /// Cut test count. Recomputes `seedsTested` on a Cut test.
    ///
    /// # Errors
    ///
    /// [`EngineError::TestLocked`] when the draft was opened from a locked test.
    pub fn set_seeds_filled(&mut self, seeds: Option<i64>) -> Result<(), EngineError> {
        self.guard()?;
        self.seeds_filled = seeds;
        self.recompute_cut_total();
        Ok(())
    }

    /// Cut test count. Recomputes `seedsTested` on a Cut test.
    ///
    /// # Errors
    ///
    /// [`EngineError::TestLocked`] when the draft was opened from a locked test.
    pub fn set_seeds_compromised(&mut self, seeds: Option<i64>) -> Result<(), EngineError> {
        self.guard()?;
        self.seeds_compromised = seeds;
        self.recompute_cut_total();
        Ok(())
    }

    /// Cut test count. Recomputes `seedsTested` on a Cut test.
    ///
    /// # Errors
    ///
    /// [`EngineError::TestLocked`] when the draft was opened from a locked test.
    pub fn set_seeds_empty(&mut self, seeds: Option<i64>) -> Result<(), EngineError> {
        self.guard()?;
        self.seeds_empty = seeds;
        self.recompute_cut_total();
        Ok(())
    }

    /// Append an observation. Returns its index.
    ///
    /// # Errors
    ///
    /// [`EngineError::TestLocked`] when the draft was opened from a locked test.
    pub fn add_result(&mut self, result: TestResultDraft) -> Result<usize, EngineError> {
        self.guard()?;
        self.test_results.push(result);
        Ok(self.test_results.len() - 1)
    }

    /// Replace the observation at `index`. Out-of-range indexes are ignored.
    ///
    /// # Errors
    ///
    /// [`EngineError::TestLocked`] when the draft was opened from a locked test.
    pub fn set_result(&mut self, index: usize, result: TestResultDraft) -> Result<(), EngineError> {
        self.guard()?;
        if let Some(slot) = self.test_results.get_mut(index) {
            *slot = result;
        }
        Ok(())
    }

    /// Remove the observation at `index`. Removing the last observation
    /// clears the completion flag.
    ///
    /// # Errors
    ///
    /// [`EngineError::TestLocked`] when the draft was opened from a locked test.
    pub fn remove_result(&mut self, index: usize) -> Result<(), EngineError> {
        self.guard()?;
        if index < self.test_results.len() {
            self.test_results.remove(index);
        }
        if self.test_results.is_empty() {
            self.completed = false;
        }
        Ok(())
    }

    /// Toggle completion of a lab-style test.
    ///
    /// # Errors
    ///
    /// [`EngineError::CompletionUnavailable`] when completing a Cut test or
    /// a test without observations, or [`EngineError::TestLocked`] when the
    /// draft was opened from a locked test.
    pub fn set_completed(&mut self, completed: bool) -> Result<(), EngineError> {
        self.guard()?;
        if completed {
            if self.is_cut() {
                return Err(EngineError::CompletionUnavailable {
                    reason: "cut tests have no completion step",
                });
            }
            if self.test_results.is_empty() {
                return Err(EngineError::CompletionUnavailable {
                    reason: "at least one result is required",
                });
            }
        }
        self.completed = completed;
        Ok(())
    }
}

// ─── Validator ───────────────────────────────────────────────────────

/// Validates viability-test drafts and turns them into payloads.
#[derive(Debug, Clone, Copy)]
pub struct ViabilityTestValidator {
    clock: FacilityClock,
    policy: EditBoundPolicy,
}

impl ViabilityTestValidator {
    /// A validator using `clock` for no-future-date rules and `policy` for
    /// the edit-time seed bound.
    pub fn new(clock: FacilityClock, policy: EditBoundPolicy) -> Self {
        Self { clock, policy }
    }

    /// Largest `seedsTested` accepted, `None` when unbounded.
    pub fn seeds_tested_bound(
        &self,
        accession: &Accession,
        existing: Option<&ViabilityTest>,
    ) -> Option<u64> {
        let seed_count = QuantityLedger::seed_count_bound(accession);
        match existing {
            None => seed_count,
            Some(test) => Some(self.policy.edit_bound(seed_count, test.seeds_tested)),
        }
    }

    /// Validate `draft` against `accession`.
    pub fn validate(&self, draft: &ViabilityTestDraft, accession: &Accession) -> ValidationResult {
        let mut result = ValidationResult::new();
        let existing = draft.test_id.and_then(|id| accession.viability_test(&id));

        if draft.test_type.is_none() {
            result.add(fields::TEST_TYPE, FieldError::RequiredField);
        }
        let start = self.check_start_date(draft.start_date.as_deref(), accession, &mut result);

        let seeds_tested = if draft.is_cut() {
            self.check_cut_counts(draft, &mut result)
        } else {
            check_count(draft.seeds_tested, fields::SEEDS_TESTED, &mut result)
        };
        if let Some(seeds) = seeds_tested {
            self.check_seeds_bound(seeds, self.seeds_tested_bound(accession, existing), &mut result);
        }

        if !draft.is_cut() {
            self.check_results(&draft.test_results, start, seeds_tested, &mut result);
        }
        result
    }

    /// Validate the test implied by a viability-testing withdrawal:
    /// `seedsTested` is the withdrawn count and the start date is the
    /// withdrawal date.
    pub fn validate_for_withdrawal(
        &self,
        test_type: Option<ViabilityTestType>,
        start_date: Option<&str>,
        seeds_tested: Option<u64>,
        accession: &Accession,
    ) -> ValidationResult {
        let mut result = ValidationResult::new();
        if test_type.is_none() {
            result.add(fields::TEST_TYPE, FieldError::RequiredField);
        }
        self.check_start_date(start_date, accession, &mut result);
        if let Some(seeds) = seeds_tested {
            self.check_seeds_bound(seeds, self.seeds_tested_bound(accession, None), &mut result);
        }
        result
    }

    /// Validate `draft` and build the payload to persist.
    ///
    /// A lab-style test marked complete gets `endDate = today` unless it
    /// was already completed.
    ///
    /// # Errors
    ///
    /// [`EngineError::TestLocked`] for a locked test,
    /// [`EngineError::Validation`] when fields are invalid.
    pub fn build_payload(
        &self,
        draft: &ViabilityTestDraft,
        accession: &Accession,
    ) -> Result<ViabilityTestPayload, EngineError> {
        draft.guard()?;
        let result = self.validate(draft, accession);
        if !result.is_valid() {
            return Err(EngineError::Validation(result));
        }
        let existing = draft.test_id.and_then(|id| accession.viability_test(&id));

        // Validation guarantees these are present and well-formed.
        let (Some(test_type), Some(start_raw), Some(seeds_tested)) =
            (draft.test_type, draft.start_date.as_deref(), draft.seeds_tested)
        else {
            return Err(EngineError::Validation(result));
        };
        let start_date = parse_date(start_raw).map_err(|_| {
            let mut r = ValidationResult::new();
            r.add(fields::START_DATE, FieldError::InvalidDate);
            EngineError::Validation(r)
        })?;

        let count = |v: Option<i64>| v.and_then(|n| u64::try_from(n).ok());
        let (end_date, test_results, filled, compromised, empty) = if test_type.is_cut() {
            (
                None,
                Vec::new(),
                count(draft.seeds_filled),
                count(draft.seeds_compromised),
                count(draft.seeds_empty),
            )
        } else {
            let results = draft
                .test_results
                .iter()
                .filter_map(|r| {
                    Some(TestResult {
                        recording_date: parse_date(r.recording_date.as_deref()?).ok()?,
                        seeds_germinated: u64::try_from(r.seeds_germinated?).ok()?,
                    })
                })
                .collect();
            let end_date = if draft.completed {
                Some(
                    existing
                        .and_then(|t| t.end_date)
                        .unwrap_or_else(|| self.clock.today()),
                )
            } else {
                None
            };
            (end_date, results, None, None, None)
        };

        Ok(ViabilityTestPayload {
            test_type,
            seed_type: draft.seed_type,
            substrate: draft.substrate,
            treatment: draft.treatment,
            start_date,
            end_date,
            seeds_tested: u64::try_from(seeds_tested).map_err(|_| {
                let mut r = ValidationResult::new();
                r.add(fields::SEEDS_TESTED, FieldError::InvalidValue);
                EngineError::Validation(r)
            })?,
            seeds_filled: filled,
            seeds_compromised: compromised,
            seeds_empty: empty,
            test_results,
            notes: draft.notes.clone(),
        })
    }

    /// Whether saving `saved` should be followed by the results view.
    ///
    /// True when a lab-style test was just completed, or when a Cut test's
    /// filled, compromised, or total count differs from `previous`.
    pub fn should_present_results(
        previous: Option<&ViabilityTest>,
        saved: &ViabilityTestPayload,
    ) -> bool {
        if saved.test_type.is_cut() {
            let before = previous.map(|t| (t.seeds_filled, t.seeds_compromised, Some(t.seeds_tested)));
            let after = (saved.seeds_filled, saved.seeds_compromised, Some(saved.seeds_tested));
            before != Some(after)
        } else {
            saved.end_date.is_some() && previous.map_or(true, |t| t.end_date.is_none())
        }
    }

    fn check_start_date(
        &self,
        raw: Option<&str>,
        accession: &Accession,
        result: &mut ValidationResult,
    ) -> Option<NaiveDate> {
        let start = check_past_date(&self.clock, raw, fields::START_DATE, result)?;
        match accession.collected_date {
            Some(collected) if start < collected => {
                result.add(
                    fields::START_DATE,
                    FieldError::DateBefore {
                        earliest: collected,
                    },
                );
                None
            }
            _ => Some(start),
        }
    }

    fn check_cut_counts(
        &self,
        draft: &ViabilityTestDraft,
        result: &mut ValidationResult,
    ) -> Option<u64> {
        let filled = check_non_negative(draft.seeds_filled, fields::SEEDS_FILLED, result);
        let compromised =
            check_non_negative(draft.seeds_compromised, fields::SEEDS_COMPROMISED, result);
        let empty = check_non_negative(draft.seeds_empty, fields::SEEDS_EMPTY, result);
        let (filled, compromised, empty) = (filled?, compromised?, empty?);
        // The sum must also fit the draft's signed seedsTested.
        let total = filled
            .checked_add(compromised)
            .and_then(|sum| sum.checked_add(empty))
            .filter(|sum| i64::try_from(*sum).is_ok());
        let Some(total) = total else {
            result.add(fields::SEEDS_TESTED, FieldError::InvalidValue);
            return None;
        };
        if total == 0 {
            result.add(fields::SEEDS_TESTED, FieldError::InvalidValue);
            return None;
        }
        Some(total)
    }

    fn check_seeds_bound(&self, seeds: u64, bound: Option<u64>, result: &mut ValidationResult) {
        if let Some(bound) = bound {
            if seeds > bound {
                result.add(
                    fields::SEEDS_TESTED,
                    FieldError::ExceedsBound {
                        limit: bound as f64,
                    },
                );
            }
        }
    }

    fn check_results(
        &self,
        results: &[TestResultDraft],
        start: Option<NaiveDate>,
        seeds_tested: Option<u64>,
        result: &mut ValidationResult,
    ) {
        let mut running_total: u64 = 0;
        for (index, entry) in results.iter().enumerate() {
            let date_field = fields::test_result(index, fields::RECORDING_DATE);
            if let Some(recorded) = check_past_date(
                &self.clock,
                entry.recording_date.as_deref(),
                &date_field,
                result,
            ) {
                if let Some(start) = start.filter(|s| recorded < *s) {
                    result.add(date_field, FieldError::DateBefore { earliest: start });
                }
            }
            let count_field = fields::test_result(index, fields::SEEDS_GERMINATED);
            if let Some(germinated) = check_non_negative(entry.seeds_germinated, &count_field, result)
            {
                // Saturates, so an overflow always reads as over the bound.
                running_total = running_total.saturating_add(germinated);
            }
        }
        // Reported on the most recent entry, not the one that crossed.
        if let (Some(seeds_tested), Some(last)) = (seeds_tested, results.len().checked_sub(1)) {
            if running_total > seeds_tested {
                result.add(
                    fields::test_result(last, fields::SEEDS_GERMINATED),
                    FieldError::ExceedsBound {
                        limit: seeds_tested as f64,
                    },
                );
            }
        }
    }
}

fn check_non_negative(value: Option<i64>, field: &str, result: &mut ValidationResult) -> Option<u64> {
    match value {
        None => {
            result.add(field, FieldError::RequiredField);
            None
        }
        Some(v) => match u64::try_from(v) {
            Ok(v) => Some(v),
            Err(_) => {
                result.add(field, FieldError::InvalidValue);
                None
            }
        },
    }
}

fn check_count(value: Option<i64>, field: &str, result: &mut ValidationResult) -> Option<u64> {
    let count = check_non_negative(value, field, result)?;
    if count == 0 {
        result.add(field, FieldError::InvalidValue);
        return None;
    }
    Some(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::{Quantity, Unit};
    use crate::state::AccessionState;
    use chrono::{TimeZone, Utc};
    use seedbank_core::{AccessionNumber, Clock, FacilityId};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 20).unwrap()
    }

    fn validator(policy: EditBoundPolicy) -> ViabilityTestValidator {
        let clock = Clock::Fixed(Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap());
        ViabilityTestValidator::new(FacilityClock::new(clock, chrono_tz::UTC), policy)
    }

    fn make_accession(estimated_count: Option<u64>) -> Accession {
        let mut a = Accession::new(AccessionNumber::new("A-1").unwrap(), FacilityId::new());
        a.state = AccessionState::InStorage;
        a.collected_date = NaiveDate::from_ymd_opt(2026, 1, 10);
        a.remaining_quantity = Some(Quantity {
            quantity: 50.0,
            unit: Unit::Grams,
        });
        a.estimated_count = estimated_count;
        a
    }

    fn lab_draft(seeds: i64) -> ViabilityTestDraft {
        let mut d = ViabilityTestDraft::new();
        d.set_test_type(ViabilityTestType::Lab).unwrap();
        d.set_start_date(Some("2026-05-01".into())).unwrap();
        d.set_seeds_tested(Some(seeds)).unwrap();
        d
    }

    fn result(date: &str, germinated: i64) -> TestResultDraft {
        TestResultDraft {
            recording_date: Some(date.into()),
            seeds_germinated: Some(germinated),
        }
    }

    fn existing_test(accession: &Accession, seeds_tested: u64) -> ViabilityTest {
        ViabilityTest {
            id: ViabilityTestId::new(),
            accession_id: accession.id,
            test_type: ViabilityTestType::Lab,
            seed_type: None,
            substrate: None,
            treatment: None,
            start_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            end_date: None,
            seeds_tested,
            seeds_filled: None,
            seeds_compromised: None,
            seeds_empty: None,
            test_results: Vec::new(),
            notes: None,
        }
    }

    #[test]
    fn test_new_lab_test_bound_scenario() {
        let v = validator(EditBoundPolicy::IncludeExisting);
        let a = make_accession(Some(100));

        let over = v.validate(&lab_draft(150), &a);
        assert_eq!(
            over.get(fields::SEEDS_TESTED),
            Some(&FieldError::ExceedsBound { limit: 100.0 })
        );

        let exact = v.validate(&lab_draft(100), &a);
        assert!(exact.is_valid(), "{exact:?}");
    }

    #[test]
    fn test_unknown_seed_count_is_unbounded_for_new_tests() {
        let v = validator(EditBoundPolicy::IncludeExisting);
        let a = make_accession(None);
        assert!(v.validate(&lab_draft(10_000), &a).is_valid());
    }

    #[test]
    fn test_edit_bound_includes_existing_consumption() {
        let v = validator(EditBoundPolicy::IncludeExisting);
        let mut a = make_accession(Some(40));
        let test = existing_test(&a, 25);
        a.viability_tests.push(test.clone());

        let mut d = ViabilityTestDraft::from_test(&test);
        d.set_seeds_tested(Some(65)).unwrap();
        assert!(v.validate(&d, &a).is_valid());
        d.set_seeds_tested(Some(66)).unwrap();
        assert!(!v.validate(&d, &a).is_valid());
    }

    #[test]
    fn test_edit_bound_legacy_reading() {
        let v = validator(EditBoundPolicy::Legacy);
        let mut a = make_accession(Some(40));
        let test = existing_test(&a, 25);
        a.viability_tests.push(test.clone());

        let mut d = ViabilityTestDraft::from_test(&test);
        d.set_seeds_tested(Some(41)).unwrap();
        assert!(!v.validate(&d, &a).is_valid());
    }

    #[test]
    fn test_required_fields() {
        let v = validator(EditBoundPolicy::IncludeExisting);
        let r = v.validate(&ViabilityTestDraft::new(), &make_accession(None));
        assert_eq!(r.get(fields::TEST_TYPE), Some(&FieldError::RequiredField));
        assert_eq!(r.get(fields::START_DATE), Some(&FieldError::RequiredField));
        assert_eq!(r.get(fields::SEEDS_TESTED), Some(&FieldError::RequiredField));
    }

    #[test]
    fn test_start_date_rules() {
        let v = validator(EditBoundPolicy::IncludeExisting);
        let a = make_accession(None);
        let mut d = lab_draft(10);

        d.set_start_date(Some("not a date".into())).unwrap();
        assert_eq!(v.validate(&d, &a).get(fields::START_DATE), Some(&FieldError::InvalidDate));

        d.set_start_date(Some("2026-05-21".into())).unwrap();
        assert_eq!(v.validate(&d, &a).get(fields::START_DATE), Some(&FieldError::NoFutureDates));

        d.set_start_date(Some("2026-01-09".into())).unwrap();
        assert_eq!(
            v.validate(&d, &a).get(fields::START_DATE),
            Some(&FieldError::DateBefore {
                earliest: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap()
            })
        );

        d.set_start_date(Some("2026-01-10".into())).unwrap();
        assert!(v.validate(&d, &a).is_valid());
    }

    #[test]
    fn test_result_dates_must_follow_start() {
        let v = validator(EditBoundPolicy::IncludeExisting);
        let a = make_accession(None);
        let mut d = lab_draft(10);
        d.add_result(result("2026-04-30", 1)).unwrap();
        d.add_result(result("2026-05-25", 1)).unwrap();
        d.add_result(result("2026-05-02", 1)).unwrap();
        let r = v.validate(&d, &a);
        assert!(matches!(
            r.get("testResults[0].recordingDate"),
            Some(FieldError::DateBefore { .. })
        ));
        assert_eq!(r.get("testResults[1].recordingDate"), Some(&FieldError::NoFutureDates));
        assert_eq!(r.get("testResults[2].recordingDate"), None);
    }

    #[test]
    fn test_running_total_error_lands_on_last_result() {
        let v = validator(EditBoundPolicy::IncludeExisting);
        let a = make_accession(None);
        let mut d = lab_draft(10);
        d.add_result(result("2026-05-02", 8)).unwrap();
        d.add_result(result("2026-05-03", 5)).unwrap(); // crosses the bound
        d.add_result(result("2026-05-04", 0)).unwrap();
        let r = v.validate(&d, &a);
        assert_eq!(r.len(), 1);
        assert_eq!(
            r.get("testResults[2].seedsGerminated"),
            Some(&FieldError::ExceedsBound { limit: 10.0 })
        );
    }

    #[test]
    fn test_result_requires_numeric_germination() {
        let v = validator(EditBoundPolicy::IncludeExisting);
        let mut d = lab_draft(10);
        d.add_result(TestResultDraft {
            recording_date: Some("2026-05-02".into()),
            seeds_germinated: None,
        })
        .unwrap();
        d.add_result(result("2026-05-03", -2)).unwrap();
        let r = v.validate(&d, &make_accession(None));
        assert_eq!(r.get("testResults[0].seedsGerminated"), Some(&FieldError::RequiredField));
        assert_eq!(r.get("testResults[1].seedsGerminated"), Some(&FieldError::InvalidValue));
    }

    #[test]
    fn test_cut_total_is_computed() {
        let mut d = ViabilityTestDraft::new();
        d.set_test_type(ViabilityTestType::Cut).unwrap();
        d.set_seeds_filled(Some(7)).unwrap();
        assert_eq!(d.seeds_tested(), Some(7));
        d.set_seeds_compromised(Some(2)).unwrap();
        d.set_seeds_empty(Some(1)).unwrap();
        assert_eq!(d.seeds_tested(), Some(10));
        assert!(matches!(
            d.set_seeds_tested(Some(3)),
            Err(EngineError::ComputedField { .. })
        ));
    }

    #[test]
    fn test_cut_requires_all_three_counts() {
        let v = validator(EditBoundPolicy::IncludeExisting);
        let mut d = ViabilityTestDraft::new();
        d.set_test_type(ViabilityTestType::Cut).unwrap();
        d.set_start_date(Some("2026-05-01".into())).unwrap();
        d.set_seeds_filled(Some(7)).unwrap();
        let r = v.validate(&d, &make_accession(None));
        assert_eq!(r.get(fields::SEEDS_COMPROMISED), Some(&FieldError::RequiredField));
        assert_eq!(r.get(fields::SEEDS_EMPTY), Some(&FieldError::RequiredField));
        assert_eq!(r.get(fields::SEEDS_FILLED), None);
    }

    #[test]
    fn test_cut_bound_applies_to_sum() {
        let v = validator(EditBoundPolicy::IncludeExisting);
        let mut d = ViabilityTestDraft::new();
        d.set_test_type(ViabilityTestType::Cut).unwrap();
        d.set_start_date(Some("2026-05-01".into())).unwrap();
        d.set_seeds_filled(Some(5)).unwrap();
        d.set_seeds_compromised(Some(3)).unwrap();
        d.set_seeds_empty(Some(3)).unwrap();
        let r = v.validate(&d, &make_accession(Some(10)));
        assert_eq!(
            r.get(fields::SEEDS_TESTED),
            Some(&FieldError::ExceedsBound { limit: 10.0 })
        );
    }

    #[test]
    fn test_completion_needs_a_result() {
        let mut d = lab_draft(10);
        assert!(!d.completion_available());
        assert!(matches!(
            d.set_completed(true),
            Err(EngineError::CompletionUnavailable { .. })
        ));
        d.add_result(result("2026-05-02", 3)).unwrap();
        assert!(d.completion_available());
        d.set_completed(true).unwrap();
        d.remove_result(0).unwrap();
        assert!(!d.is_completed());
    }

    #[test]
    fn test_build_payload_sets_end_date_today() {
        let v = validator(EditBoundPolicy::IncludeExisting);
        let a = make_accession(None);
        let mut d = lab_draft(10);
        d.add_result(result("2026-05-02", 3)).unwrap();
        d.set_completed(true).unwrap();
        let payload = v.build_payload(&d, &a).unwrap();
        assert_eq!(payload.end_date, Some(today()));
        assert_eq!(payload.test_results.len(), 1);
        assert!(ViabilityTestValidator::should_present_results(None, &payload));
    }

    #[test]
    fn test_build_payload_rejects_invalid_draft() {
        let v = validator(EditBoundPolicy::IncludeExisting);
        let err = v
            .build_payload(&ViabilityTestDraft::new(), &make_accession(None))
            .unwrap_err();
        match err {
            EngineError::Validation(r) => assert!(r.len() >= 3),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_locked_test_rejects_mutation() {
        let a = make_accession(None);
        let mut test = existing_test(&a, 10);
        test.end_date = Some(today());
        test.test_results.push(TestResult {
            recording_date: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            seeds_germinated: 4,
        });
        assert!(test.is_locked());

        let mut d = ViabilityTestDraft::from_test(&test);
        assert!(d.is_locked());
        assert!(matches!(
            d.set_notes(Some("late note".into())),
            Err(EngineError::TestLocked { .. })
        ));
        assert!(matches!(
            d.add_result(result("2026-05-02", 1)),
            Err(EngineError::TestLocked { .. })
        ));
        let v = validator(EditBoundPolicy::IncludeExisting);
        assert!(matches!(
            v.build_payload(&d, &a),
            Err(EngineError::TestLocked { .. })
        ));
    }

    #[test]
    fn test_every_setter_is_guarded_when_locked() {
        let a = make_accession(None);
        let mut test = existing_test(&a, 10);
        test.end_date = Some(today());
        test.test_results.push(TestResult {
            recording_date: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            seeds_germinated: 4,
        });
        let mut d = ViabilityTestDraft::from_test(&test);
        let before = d.clone();

        let outcomes = [
            d.set_test_type(ViabilityTestType::Cut),
            d.set_seed_type(None),
            d.set_substrate(None),
            d.set_treatment(None),
            d.set_start_date(Some("2026-04-01".into())),
            d.set_notes(None),
            d.set_seeds_tested(Some(3)),
            d.set_seeds_filled(Some(1)),
            d.set_seeds_compromised(Some(1)),
            d.set_seeds_empty(Some(1)),
            d.add_result(result("2026-05-02", 1)).map(|_| ()),
            d.set_result(0, result("2026-05-02", 1)),
            d.remove_result(0),
            d.set_completed(false),
        ];
        for outcome in outcomes {
            assert!(matches!(outcome, Err(EngineError::TestLocked { .. })));
        }
        assert_eq!(d, before);
    }

    #[test]
    fn test_completed_without_results_is_not_locked() {
        let a = make_accession(None);
        let mut test = existing_test(&a, 10);
        test.end_date = Some(today());
        assert!(!test.is_locked());
    }

    #[test]
    fn test_cut_result_presentation_on_change() {
        let a = make_accession(None);
        let mut previous = existing_test(&a, 10);
        previous.test_type = ViabilityTestType::Cut;
        previous.seeds_filled = Some(6);
        previous.seeds_compromised = Some(2);
        previous.seeds_empty = Some(2);

        let mut payload = ViabilityTestPayload {
            test_type: ViabilityTestType::Cut,
            seed_type: None,
            substrate: None,
            treatment: None,
            start_date: previous.start_date,
            end_date: None,
            seeds_tested: 10,
            seeds_filled: Some(6),
            seeds_compromised: Some(2),
            seeds_empty: Some(2),
            test_results: Vec::new(),
            notes: Some("only notes changed".into()),
        };
        assert!(!ViabilityTestValidator::should_present_results(Some(&previous), &payload));
        payload.seeds_filled = Some(7);
        payload.seeds_tested = 11;
        assert!(ViabilityTestValidator::should_present_results(Some(&previous), &payload));
    }

    #[test]
    fn test_lab_result_presentation_only_when_freshly_completed() {
        let a = make_accession(None);
        let mut previous = existing_test(&a, 10);
        previous.end_date = Some(today());
        let payload = ViabilityTestPayload {
            test_type: ViabilityTestType::Lab,
            seed_type: None,
            substrate: None,
            treatment: None,
            start_date: previous.start_date,
            end_date: Some(today()),
            seeds_tested: 10,
            seeds_filled: None,
            seeds_compromised: None,
            seeds_empty: None,
            test_results: Vec::new(),
            notes: None,
        };
        assert!(!ViabilityTestValidator::should_present_results(Some(&previous), &payload));
    }

    #[test]
    fn test_viability_percent() {
        let a = make_accession(None);
        let mut t = existing_test(&a, 20);
        t.test_results.push(TestResult {
            recording_date: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            seeds_germinated: 5,
        });
        assert_eq!(t.viability_percent(), Some(25));
        t.test_type = ViabilityTestType::Cut;
        t.seeds_filled = Some(15);
        assert_eq!(t.viability_percent(), Some(75));
        t.seeds_tested = 0;
        assert_eq!(t.viability_percent(), None);
    }

    #[test]
    fn cut_counts_that_overflow_are_invalid() {
        let v = validator(EditBoundPolicy::IncludeExisting);
        let a = make_accession(None);
        let mut d = ViabilityTestDraft::new();
        d.set_test_type(ViabilityTestType::Cut).unwrap();
        d.set_start_date(Some("2026-05-01".into())).unwrap();
        d.set_seeds_filled(Some(i64::MAX)).unwrap();
        d.set_seeds_compromised(Some(1)).unwrap();
        d.set_seeds_empty(Some(0)).unwrap();
        assert_eq!(d.seeds_tested(), None);

        let r = v.validate(&d, &a);
        assert_eq!(r.get(fields::SEEDS_TESTED), Some(&FieldError::InvalidValue));
        assert!(matches!(
            v.build_payload(&d, &a),
            Err(EngineError::Validation(_))
        ));

        d.set_seeds_filled(Some(8)).unwrap();
        assert_eq!(d.seeds_tested(), Some(9));
    }

    #[test]
    fn germinated_total_that_overflows_exceeds_bound() {
        let v = validator(EditBoundPolicy::IncludeExisting);
        let a = make_accession(None);
        let mut d = lab_draft(10);
        d.add_result(result("2026-05-02", i64::MAX)).unwrap();
        d.add_result(result("2026-05-03", i64::MAX)).unwrap();
        d.add_result(result("2026-05-04", i64::MAX)).unwrap();
        let r = v.validate(&d, &a);
        assert_eq!(
            r.get(&fields::test_result(2, fields::SEEDS_GERMINATED)),
            Some(&FieldError::ExceedsBound { limit: 10.0 })
        );
    }

    #[test]
    fn edit_bound_saturates() {
        let bound = EditBoundPolicy::IncludeExisting.edit_bound(Some(u64::MAX), 5);
        assert_eq!(bound, u64::MAX);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use seedbank_core::{AccessionNumber, Clock, FacilityId};

    fn validator() -> ViabilityTestValidator {
        let clock = Clock::Fixed(Utc.with_ymd_and_hms(2026, 5, 20, 12, 0, 0).unwrap());
        ViabilityTestValidator::new(
            FacilityClock::new(clock, chrono_tz::UTC),
            EditBoundPolicy::IncludeExisting,
        )
    }

    proptest! {
        /// After any sequence of edits to the three Cut counts, seedsTested
        /// equals their sum.
        #[test]
        fn cut_total_tracks_inputs(edits in prop::collection::vec((0u8..3, 0i64..500), 1..20)) {
            let mut d = ViabilityTestDraft::new();
            d.set_test_type(ViabilityTestType::Cut).unwrap();
            for (which, value) in edits {
                match which {
                    0 => d.set_seeds_filled(Some(value)).unwrap(),
                    1 => d.set_seeds_compromised(Some(value)).unwrap(),
                    _ => d.set_seeds_empty(Some(value)).unwrap(),
                }
                let expected = d.seeds_filled().unwrap_or(0)
                    + d.seeds_compromised().unwrap_or(0)
                    + d.seeds_empty().unwrap_or(0);
                prop_assert_eq!(d.seeds_tested(), Some(expected));
            }
        }

        /// A draft is accepted only if the germinated total fits in
        /// seedsTested, and a violation is always reported on the last
        /// result.
        #[test]
        fn germinated_total_never_exceeds_seeds_tested(
            seeds in 1i64..200,
            counts in prop::collection::vec(0i64..80, 1..8),
        ) {
            let accession = Accession::new(AccessionNumber::new("P-1").unwrap(), FacilityId::new());
            let mut d = ViabilityTestDraft::new();
            d.set_test_type(ViabilityTestType::Lab).unwrap();
            d.set_start_date(Some("2026-05-01".into())).unwrap();
            d.set_seeds_tested(Some(seeds)).unwrap();
            for c in &counts {
                d.add_result(TestResultDraft {
                    recording_date: Some("2026-05-02".into()),
                    seeds_germinated: Some(*c),
                }).unwrap();
            }
            let total: i64 = counts.iter().sum();
            let r = validator().validate(&d, &accession);
            let last = fields::test_result(counts.len() - 1, fields::SEEDS_GERMINATED);
            prop_assert_eq!(r.is_valid(), total <= seeds);
            if total > seeds {
                prop_assert_eq!(r.len(), 1);
                prop_assert!(r.get(&last).is_some());
            }
        }
    }
}
