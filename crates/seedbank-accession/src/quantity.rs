//! # Quantity Ledger
//!
//! Seed quantities are recorded either as a seed count or as a weight.
//! Whichever side is measured, the other side is estimated from a subset
//! sample: a small lot that was both weighed and counted.
//!
//! ## Units
//!
//! [`Unit`] splits into two families that never convert into each other
//! directly:
//!
//! ```text
//! Seeds                                  (count)
//! Milligrams, Grams, Kilograms           (metric weight)
//! Ounces, Pounds                         (imperial weight)
//! ```
//!
//! Weights carry an SI factor (grams per unit), so [`Quantity::convert_to`]
//! converts any weight into any other. Crossing between seeds and weight
//! always goes through the subset ratio.
//!
//! ## Display Conversion
//!
//! [`QuantityLedger::convert`] is the display conversion shown next to a
//! weight in the other measurement system. It is a fixed pairwise table,
//! rounded to two decimals:
//!
//! | from | to |
//! |---|---|
//! | Grams | Ounces |
//! | Milligrams | Ounces |
//! | Kilograms | Pounds |
//! | Ounces | Grams |
//! | Pounds | Kilograms |
//!
//! Units outside the table (`Seeds`) are returned unchanged.

use serde::{Deserialize, Serialize};

use crate::accession::Accession;
use crate::error::EngineError;
use crate::validation::{fields, FieldError, ValidationResult};

/// Grams in one avoirdupois ounce.
const GRAMS_PER_OUNCE: f64 = 28.349_523_125;

/// Grams in one avoirdupois pound.
const GRAMS_PER_POUND: f64 = 453.592_37;

/// Unit of an accession quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// A seed count.
    Seeds,
    /// Grams.
    Grams,
    /// Milligrams.
    Milligrams,
    /// Kilograms.
    Kilograms,
    /// Avoirdupois pounds.
    Pounds,
    /// Avoirdupois ounces.
    Ounces,
}

impl Unit {
    /// Every unit.
    pub const ALL: [Unit; 6] = [
        Self::Seeds,
        Self::Grams,
        Self::Milligrams,
        Self::Kilograms,
        Self::Pounds,
        Self::Ounces,
    ];

    /// Whether this is a weight unit.
    pub fn is_weight(&self) -> bool {
        !matches!(self, Self::Seeds)
    }

    /// Grams per one of this unit, or `None` for `Seeds`.
    pub fn grams_per_unit(&self) -> Option<f64> {
        match self {
            Self::Seeds => None,
            Self::Grams => Some(1.0),
            Self::Milligrams => Some(0.001),
            Self::Kilograms => Some(1000.0),
            Self::Pounds => Some(GRAMS_PER_POUND),
            Self::Ounces => Some(GRAMS_PER_OUNCE),
        }
    }

    /// The measurement system of a weight unit. `Seeds` belongs to none.
    pub fn system(&self) -> Option<UnitSystem> {
        match self {
            Self::Seeds => None,
            Self::Grams | Self::Milligrams | Self::Kilograms => Some(UnitSystem::Metric),
            Self::Pounds | Self::Ounces => Some(UnitSystem::Imperial),
        }
    }

    /// Counterpart unit in the display conversion table.
    pub fn display_counterpart(&self) -> Option<Unit> {
        match self {
            Self::Grams => Some(Self::Ounces),
            Self::Milligrams => Some(Self::Ounces),
            Self::Kilograms => Some(Self::Pounds),
            Self::Ounces => Some(Self::Grams),
            Self::Pounds => Some(Self::Kilograms),
            Self::Seeds => None,
        }
    }

    /// Short label (`g`, `lb`, `seeds`).
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Self::Seeds => "seeds",
            Self::Grams => "g",
            Self::Milligrams => "mg",
            Self::Kilograms => "kg",
            Self::Pounds => "lb",
            Self::Ounces => "oz",
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Seeds => "Seeds",
            Self::Grams => "Grams",
            Self::Milligrams => "Milligrams",
            Self::Kilograms => "Kilograms",
            Self::Pounds => "Pounds",
            Self::Ounces => "Ounces",
        };
        f.write_str(s)
    }
}

/// A user's preferred weight system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    /// Grams, milligrams, kilograms.
    Metric,
    /// Pounds, ounces.
    Imperial,
}

/// An amount with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    /// The amount.
    pub quantity: f64,
    /// The unit.
    pub unit: Unit,
}

impl Quantity {
    /// Build a quantity, rejecting non-finite or negative amounts.
    pub fn new(quantity: f64, unit: Unit) -> Result<Self, EngineError> {
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(EngineError::InvalidQuantity { value: quantity });
        }
        Ok(Self { quantity, unit })
    }

    /// A seed count.
    pub fn seeds(count: u64) -> Self {
        Self {
            quantity: count as f64,
            unit: Unit::Seeds,
        }
    }

    /// Whether the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.quantity == 0.0
    }

    /// The amount in grams, or `None` for seed counts.
    pub fn in_grams(&self) -> Option<f64> {
        self.unit.grams_per_unit().map(|g| self.quantity * g)
    }

    /// Convert into `unit` through SI factors.
    ///
    /// Seeds convert only to seeds; weights convert to any weight.
    pub fn convert_to(&self, unit: Unit) -> Result<Quantity, EngineError> {
        if self.unit == unit {
            return Ok(*self);
        }
        match (self.in_grams(), unit.grams_per_unit()) {
            (Some(grams), Some(per_unit)) => Ok(Quantity {
                quantity: grams / per_unit,
                unit,
            }),
            _ => Err(EngineError::IncompatibleUnits {
                from: self.unit.to_string(),
                to: unit.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.quantity, self.unit.abbreviation())
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ─── Quantity entry ──────────────────────────────────────────────────

/// The amount-and-unit pair entered in a quantity widget.
///
/// [`QuantityEntry::validate`] is the gate an enclosing form composes:
/// the form may not save until the entry yields a [`Quantity`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuantityEntry {
    /// Entered amount.
    pub quantity: Option<f64>,
    /// Selected unit.
    pub unit: Option<Unit>,
}

impl QuantityEntry {
    /// Build an entry.
    pub fn new(quantity: Option<f64>, unit: Option<Unit>) -> Self {
        Self { quantity, unit }
    }

    /// Validate the entry. Errors are keyed by `field` for the amount and
    /// by `unit` for the unit selection.
    ///
    /// `allow_zero` admits an amount of zero (remaining quantity may be
    /// zero, a withdrawal may not). Seed counts must be whole numbers.
    pub fn validate(&self, field: &str, allow_zero: bool) -> Result<Quantity, ValidationResult> {
        let mut result = ValidationResult::new();
        match self.quantity {
            None => result.add(field, FieldError::RequiredField),
            Some(q) if !q.is_finite() || q < 0.0 || (!allow_zero && q == 0.0) => {
                result.add(field, FieldError::InvalidValue)
            }
            Some(q) if self.unit == Some(Unit::Seeds) && q.fract() != 0.0 => {
                result.add(field, FieldError::InvalidValue)
            }
            Some(_) => {}
        }
        if self.unit.is_none() {
            result.add(fields::UNIT, FieldError::RequiredField);
        }
        match (self.quantity, self.unit) {
            (Some(quantity), Some(unit)) if result.is_valid() => Ok(Quantity { quantity, unit }),
            _ => Err(result),
        }
    }
}

// ─── Ledger ──────────────────────────────────────────────────────────

/// Remaining-quantity bookkeeping and estimates for an accession.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuantityLedger;

impl QuantityLedger {
    /// Record a new remaining quantity and refresh the derived estimate.
    ///
    /// State side effects (depletion, revival) are applied separately by
    /// [`Accession::apply_quantity_side_effects`].
    pub fn set_remaining_quantity(
        accession: &mut Accession,
        quantity: f64,
        unit: Unit,
    ) -> Result<(), EngineError> {
        let quantity = Quantity::new(quantity, unit)?;
        accession.remaining_quantity = Some(quantity);
        Self::refresh_estimates(accession);
        Ok(())
    }

    /// Estimated seed count of `total_weight`, from a subset sample of
    /// `subset_count` seeds weighing `subset_weight`.
    ///
    /// Returns `None` ("estimate unavailable") when the subset is empty or
    /// weightless, or when either weight is not a weight.
    pub fn estimate_from_subset(
        subset_weight: &Quantity,
        subset_count: u64,
        total_weight: &Quantity,
    ) -> Option<u64> {
        let subset_grams = subset_weight.in_grams()?;
        let total_grams = total_weight.in_grams()?;
        if subset_grams <= 0.0 || subset_count == 0 || !total_grams.is_finite() || total_grams < 0.0
        {
            return None;
        }
        Some((total_grams / subset_grams * subset_count as f64).round() as u64)
    }

    /// Estimated weight of `count` seeds, expressed in the subset weight's
    /// unit and rounded to two decimals.
    pub fn estimate_weight_from_subset(
        subset_weight: &Quantity,
        subset_count: u64,
        count: f64,
    ) -> Option<Quantity> {
        if !subset_weight.unit.is_weight()
            || subset_weight.quantity <= 0.0
            || subset_count == 0
            || !count.is_finite()
            || count < 0.0
        {
            return None;
        }
        Some(Quantity {
            quantity: round2(count / subset_count as f64 * subset_weight.quantity),
            unit: subset_weight.unit,
        })
    }

    /// Recompute whichever side of the accession is estimated.
    ///
    /// A seed count derives `estimated_weight` and clears
    /// `estimated_count`; a weight derives `estimated_count` and clears
    /// `estimated_weight`. Without a usable subset the estimate is cleared.
    pub fn refresh_estimates(accession: &mut Accession) {
        let subset = accession.subset_weight.zip(accession.subset_count);
        match accession.remaining_quantity {
            None => {
                accession.estimated_count = None;
                accession.estimated_weight = None;
            }
            Some(remaining) if remaining.unit == Unit::Seeds => {
                accession.estimated_count = None;
                accession.estimated_weight = subset.and_then(|(weight, count)| {
                    Self::estimate_weight_from_subset(&weight, count, remaining.quantity)
                });
            }
            Some(remaining) => {
                accession.estimated_weight = None;
                accession.estimated_count = subset.and_then(|(weight, count)| {
                    Self::estimate_from_subset(&weight, count, &remaining)
                });
            }
        }
    }

    /// Upper bound on seeds that a viability test may consume: the
    /// measured count for seed-denominated accessions, otherwise the
    /// estimated count. `None` when neither is known.
    pub fn seed_count_bound(accession: &Accession) -> Option<u64> {
        match accession.remaining_quantity {
            Some(remaining) if remaining.unit == Unit::Seeds => {
                Some(remaining.quantity.round() as u64)
            }
            _ => accession.estimated_count,
        }
    }

    /// How much of `withdrawn.unit` is available to withdraw, when that
    /// can be determined.
    pub fn available_in(accession: &Accession, unit: Unit) -> Option<f64> {
        let remaining = accession.remaining_quantity?;
        match (remaining.unit.is_weight(), unit.is_weight()) {
            (false, false) => Some(remaining.quantity),
            (true, true) => remaining.convert_to(unit).ok().map(|q| q.quantity),
            (true, false) => accession.estimated_count.map(|c| c as f64),
            (false, true) => accession
                .estimated_weight
                .and_then(|w| w.convert_to(unit).ok())
                .map(|q| q.quantity),
        }
    }

    /// Display conversion through the fixed pairwise table.
    ///
    /// Units without a table entry are returned unchanged.
    pub fn convert(quantity: &Quantity) -> Quantity {
        match quantity.unit.display_counterpart() {
            Some(target) => quantity
                .convert_to(target)
                .map(|q| Quantity {
                    quantity: round2(q.quantity),
                    unit: target,
                })
                .unwrap_or(*quantity),
            None => *quantity,
        }
    }

    /// Whether `unit` needs no conversion for a user preferring `system`.
    /// Seed counts belong to every system.
    pub fn is_in_preferred_system(unit: Unit, system: UnitSystem) -> bool {
        unit.system().map_or(true, |s| s == system)
    }

    /// Display `quantity` in the user's preferred system.
    pub fn to_preferred_system(quantity: &Quantity, system: UnitSystem) -> Quantity {
        if Self::is_in_preferred_system(quantity.unit, system) {
            *quantity
        } else {
            Self::convert(quantity)
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Table pairs round-trip within the error introduced by rounding
        /// the intermediate value to two decimals.
        #[test]
        fn display_conversion_round_trips(q in 0.0f64..100_000.0) {
            for (unit, back) in [(Unit::Grams, Unit::Ounces), (Unit::Kilograms, Unit::Pounds)] {
                let original = Quantity { quantity: q, unit };
                let there = QuantityLedger::convert(&original);
                prop_assert_eq!(there.unit, back);
                let again = QuantityLedger::convert(&there);
                prop_assert_eq!(again.unit, unit);
                let factor = back.grams_per_unit().unwrap() / unit.grams_per_unit().unwrap();
                let tolerance = 0.005 * factor + 0.005 + 1e-9;
                prop_assert!((again.quantity - q).abs() <= tolerance,
                    "{} {:?} came back as {}", q, unit, again.quantity);
            }
        }

        /// Seed counts never change under display conversion.
        #[test]
        fn seeds_are_never_converted(n in 0u64..1_000_000) {
            let seeds = Quantity::seeds(n);
            prop_assert_eq!(QuantityLedger::convert(&seeds), seeds);
        }

        /// Subset estimates scale linearly with the total weight.
        #[test]
        fn subset_estimate_matches_ratio(count in 1u64..1000, subset in 1u32..1000, multiple in 0u32..50) {
            let subset_weight = Quantity { quantity: subset as f64, unit: Unit::Grams };
            let total = Quantity { quantity: subset as f64 * multiple as f64, unit: Unit::Grams };
            prop_assert_eq!(
                QuantityLedger::estimate_from_subset(&subset_weight, count, &total),
                Some(count * multiple as u64)
            );
        }
    }
}
