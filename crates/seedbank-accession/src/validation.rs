//! # Validation Results
//!
//! Every editor draft is validated by a pure function that returns a
//! [`ValidationResult`]: a map from field path to the first
//! [`FieldError`] found for that field. Validation never throws. A
//! non-empty result blocks commit.
//!
//! ## Field Paths
//!
//! Paths use the wire field names (`startDate`, `seedsTested`), index
//! notation for repeated entries (`testResults[2].seedsGerminated`), and a
//! dotted prefix for nested validators (`viabilityTest.testType`).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use seedbank_core::{parse_date, FacilityClock};

/// Field path constants shared by the validators.
pub mod fields {
    /// Accession state selection.
    pub const STATE: &str = "state";
    /// Quantity amount.
    pub const QUANTITY: &str = "quantity";
    /// Quantity unit.
    pub const UNIT: &str = "unit";
    /// Subset sample weight.
    pub const SUBSET_WEIGHT: &str = "subsetWeight";
    /// Subset sample seed count.
    pub const SUBSET_COUNT: &str = "subsetCount";
    /// Viability test type.
    pub const TEST_TYPE: &str = "testType";
    /// Viability test start date.
    pub const START_DATE: &str = "startDate";
    /// Seeds tested.
    pub const SEEDS_TESTED: &str = "seedsTested";
    /// Cut test: filled seeds.
    pub const SEEDS_FILLED: &str = "seedsFilled";
    /// Cut test: compromised seeds.
    pub const SEEDS_COMPROMISED: &str = "seedsCompromised";
    /// Cut test: empty seeds.
    pub const SEEDS_EMPTY: &str = "seedsEmpty";
    /// Test result recording date.
    pub const RECORDING_DATE: &str = "recordingDate";
    /// Test result germinated seeds.
    pub const SEEDS_GERMINATED: &str = "seedsGerminated";
    /// Withdrawal purpose.
    pub const PURPOSE: &str = "purpose";
    /// Withdrawal date.
    pub const DATE: &str = "date";
    /// Withdrawn quantity.
    pub const WITHDRAWN_QUANTITY: &str = "withdrawnQuantity";
    /// Nursery destination.
    pub const DESTINATION_FACILITY_ID: &str = "destinationFacilityId";
    /// Nursery ready-by date.
    pub const READY_BY_DATE: &str = "readyByDate";
    /// Prefix for the nested viability test of a testing withdrawal.
    pub const VIABILITY_TEST: &str = "viabilityTest";

    /// Path of a field inside `testResults[index]`.
    pub fn test_result(index: usize, field: &str) -> String {
        format!("testResults[{index}].{field}")
    }
}

/// A problem with a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldError {
    /// The field is mandatory and empty.
    RequiredField,
    /// The field does not parse as a date.
    InvalidDate,
    /// The date lies after today in the facility's time zone.
    NoFutureDates,
    /// The value is not acceptable for this field.
    InvalidValue,
    /// The value is larger than the allowed maximum.
    ExceedsBound {
        /// The largest accepted value.
        limit: f64,
    },
    /// The date lies before an earlier anchor date.
    DateBefore {
        /// The earliest accepted date.
        earliest: NaiveDate,
    },
}

impl FieldError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RequiredField => "REQUIRED_FIELD",
            Self::InvalidDate => "INVALID_DATE",
            Self::NoFutureDates => "NO_FUTURE_DATES",
            Self::InvalidValue => "INVALID_VALUE",
            Self::ExceedsBound { .. } => "EXCEEDS_BOUND",
            Self::DateBefore { .. } => "DATE_BEFORE",
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExceedsBound { limit } => write!(f, "{} (max {limit})", self.code()),
            Self::DateBefore { earliest } => write!(f, "{} ({earliest})", self.code()),
            _ => f.write_str(self.code()),
        }
    }
}

/// Field errors for one draft, keyed by field path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationResult {
    errors: BTreeMap<String, FieldError>,
}

impl ValidationResult {
    /// An empty (valid) result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no field errors were recorded.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of fields with errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether the result is empty.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record an error. The first error recorded for a field is kept.
    pub fn add(&mut self, field: impl Into<String>, error: FieldError) {
        self.errors.entry(field.into()).or_insert(error);
    }

    /// The error recorded for `field`, if any.
    pub fn get(&self, field: &str) -> Option<&FieldError> {
        self.errors.get(field)
    }

    /// Iterate over `(field, error)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldError)> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge another result into this one, prefixing its field paths
    /// with `prefix.`.
    pub fn merge_prefixed(&mut self, prefix: &str, other: ValidationResult) {
        for (field, error) in other.errors {
            self.add(format!("{prefix}.{field}"), error);
        }
    }

    /// Merge another result into this one unchanged.
    pub fn merge(&mut self, other: ValidationResult) {
        for (field, error) in other.errors {
            self.add(field, error);
        }
    }
}

/// Check a required date that may not lie after the facility's today.
/// Records at most one error on `field` and returns the date when valid.
pub(crate) fn check_past_date(
    clock: &FacilityClock,
    raw: Option<&str>,
    field: &str,
    result: &mut ValidationResult,
) -> Option<NaiveDate> {
    let raw = match raw.map(str::trim) {
        None | Some("") => {
            result.add(field, FieldError::RequiredField);
            return None;
        }
        Some(raw) => raw,
    };
    let Ok(date) = parse_date(raw) else {
        result.add(field, FieldError::InvalidDate);
        return None;
    };
    if clock.is_future(date) {
        result.add(field, FieldError::NoFutureDates);
        return None;
    }
    Some(date)
}
