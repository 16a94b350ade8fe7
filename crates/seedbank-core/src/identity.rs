//! # Domain Identity Newtypes
//!
//! Newtype wrappers for every identifier the accession engine handles.
//! These prevent identifier confusion: you cannot pass a `WithdrawalId`
//! where a `ViabilityTestId` is expected, and a nursery destination is a
//! `FacilityId`, never a bare string.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Unique identifier for a seed accession.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccessionId(pub Uuid);

/// Unique identifier for a facility (seed bank or nursery).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FacilityId(pub Uuid);

/// Unique identifier for a viability test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViabilityTestId(pub Uuid);

/// Unique identifier for a withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WithdrawalId(pub Uuid);

impl AccessionId {
    /// Generate a new random accession identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl FacilityId {
    /// Generate a new random facility identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl ViabilityTestId {
    /// Generate a new random viability test identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl WithdrawalId {
    /// Generate a new random withdrawal identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for AccessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "accession:{}", self.0)
    }
}

impl std::fmt::Display for FacilityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "facility:{}", self.0)
    }
}

impl std::fmt::Display for ViabilityTestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "viability-test:{}", self.0)
    }
}

impl std::fmt::Display for WithdrawalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "withdrawal:{}", self.0)
    }
}

/// Maximum length of an accession number.
pub const MAX_ACCESSION_NUMBER_LEN: usize = 64;

/// Human-facing accession number (e.g. `"22-1-1-001"`).
///
/// Assigned once when the accession is created and never changed
/// afterwards, so the type exposes no mutator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessionNumber(String);

impl AccessionNumber {
    /// Validate and wrap an accession number. Surrounding whitespace is
    /// trimmed.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidIdentifier {
                kind: "accession number",
                reason: "must not be empty".to_string(),
            });
        }
        if trimmed.chars().count() > MAX_ACCESSION_NUMBER_LEN {
            return Err(CoreError::InvalidIdentifier {
                kind: "accession number",
                reason: format!("must be at most {MAX_ACCESSION_NUMBER_LEN} characters"),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The accession number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AccessionNumber {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccessionNumber> for String {
    fn from(value: AccessionNumber) -> Self {
        value.0
    }
}

impl std::fmt::Display for AccessionNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
