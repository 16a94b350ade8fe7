//! # Engine Configuration
//!
//! Settings that change engine behavior without code changes. Built with
//! [`EngineConfig::default`] or loaded from the environment.
//!
//! | variable | default | meaning |
//! |---|---|---|
//! | `SEEDBANK_DEFAULT_TIME_ZONE` | `UTC` | zone for accessions without one |
//! | `SEEDBANK_EDIT_BOUND_POLICY` | `include-existing` | see [`EditBoundPolicy`] |
//! | `SEEDBANK_POST_CHECK_IN_STATE` | `Awaiting Processing` | state after check-in |
//! | `SEEDBANK_REVIVE_STATE` | `In Storage` | state after quantity is added to a used-up accession |

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use seedbank_core::{parse_time_zone, Clock, FacilityClock};

use crate::accession::Accession;
use crate::state::AccessionState;

/// How the `seedsTested` bound is computed when editing an existing test.
///
/// The bound for a new test is the accession's seed count. For an
/// existing test the seeds it already consumed are available again, but
/// the legacy editor computed this with an operator-precedence slip.
/// Both readings are selectable until product confirms the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditBoundPolicy {
    /// `(estimatedCount || 0) + existing.seedsTested`.
    #[default]
    IncludeExisting,
    /// `estimatedCount || existing.seedsTested`, as the legacy editor
    /// evaluated it.
    Legacy,
}

impl EditBoundPolicy {
    /// Upper bound for `seedsTested` on an existing test that already
    /// consumed `existing_seeds_tested`, given the accession's seed count.
    pub fn edit_bound(&self, seed_count: Option<u64>, existing_seeds_tested: u64) -> u64 {
        match self {
            Self::IncludeExisting => seed_count.unwrap_or(0).saturating_add(existing_seeds_tested),
            Self::Legacy => match seed_count {
                Some(count) if count > 0 => count,
                _ => existing_seeds_tested,
            },
        }
    }
}

impl std::str::FromStr for EditBoundPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "include-existing" => Ok(Self::IncludeExisting),
            "legacy" => Ok(Self::Legacy),
            other => Err(ConfigError::InvalidPolicy(other.to_string())),
        }
    }
}

/// Engine settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Zone used for accessions that carry none.
    pub default_time_zone: Tz,
    /// State an accession enters on check-in.
    pub post_check_in_state: AccessionState,
    /// State a used-up accession enters when quantity is added back.
    pub revive_state: AccessionState,
    /// `seedsTested` bound rule for existing tests.
    pub edit_bound_policy: EditBoundPolicy,
    /// Source of "now" for no-future-date rules.
    pub clock: Clock,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_time_zone: chrono_tz::UTC,
            post_check_in_state: AccessionState::AwaitingProcessing,
            revive_state: AccessionState::InStorage,
            edit_bound_policy: EditBoundPolicy::IncludeExisting,
            clock: Clock::System,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(zone) = lookup("SEEDBANK_DEFAULT_TIME_ZONE") {
            config.default_time_zone =
                parse_time_zone(&zone).map_err(|_| ConfigError::UnknownTimeZone(zone))?;
        }
        if let Some(policy) = lookup("SEEDBANK_EDIT_BOUND_POLICY") {
            config.edit_bound_policy = policy.parse()?;
        }
        if let Some(state) = lookup("SEEDBANK_POST_CHECK_IN_STATE") {
            config.post_check_in_state = parse_active_state(&state)?;
        }
        if let Some(state) = lookup("SEEDBANK_REVIVE_STATE") {
            config.revive_state = parse_active_state(&state)?;
        }
        Ok(config)
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The clock for `accession`'s seed bank.
    pub fn facility_clock(&self, accession: &Accession) -> FacilityClock {
        FacilityClock::new(
            self.clock,
            accession.time_zone.unwrap_or(self.default_time_zone),
        )
    }
}

fn parse_active_state(raw: &str) -> Result<AccessionState, ConfigError> {
    AccessionState::ACTIVE
        .into_iter()
        .find(|s| s.to_string().eq_ignore_ascii_case(raw.trim()))
        .ok_or_else(|| ConfigError::InvalidState(raw.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown time zone {0:?}")]
    UnknownTimeZone(String),
    #[error("invalid edit bound policy {0:?}: expected include-existing or legacy")]
    InvalidPolicy(String),
    #[error("invalid state {0:?}: expected one of Awaiting Processing, Processing, Drying, In Storage")]
    InvalidState(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.post_check_in_state, AccessionState::AwaitingProcessing);
    }

    #[test]
    fn reads_overrides() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            ("SEEDBANK_DEFAULT_TIME_ZONE", "Africa/Nairobi"),
            ("SEEDBANK_EDIT_BOUND_POLICY", "legacy"),
            ("SEEDBANK_POST_CHECK_IN_STATE", "processing"),
            ("SEEDBANK_REVIVE_STATE", "Drying"),
        ]))
        .unwrap();
        assert_eq!(cfg.default_time_zone, chrono_tz::Africa::Nairobi);
        assert_eq!(cfg.edit_bound_policy, EditBoundPolicy::Legacy);
        assert_eq!(cfg.post_check_in_state, AccessionState::Processing);
        assert_eq!(cfg.revive_state, AccessionState::Drying);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[("SEEDBANK_DEFAULT_TIME_ZONE", "Nowhere")])),
            Err(ConfigError::UnknownTimeZone(_))
        ));
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[("SEEDBANK_EDIT_BOUND_POLICY", "max")])),
            Err(ConfigError::InvalidPolicy(_))
        ));
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[("SEEDBANK_POST_CHECK_IN_STATE", "Used Up")])),
            Err(ConfigError::InvalidState(_))
        ));
    }

    #[test]
    fn edit_bound_readings_differ() {
        // estimatedCount = 40, existing test consumed 25.
        assert_eq!(EditBoundPolicy::IncludeExisting.edit_bound(Some(40), 25), 65);
        assert_eq!(EditBoundPolicy::Legacy.edit_bound(Some(40), 25), 40);
        // No count known: both fall back to what the test consumed.
        assert_eq!(EditBoundPolicy::IncludeExisting.edit_bound(None, 25), 25);
        assert_eq!(EditBoundPolicy::Legacy.edit_bound(None, 25), 25);
        assert_eq!(EditBoundPolicy::Legacy.edit_bound(Some(0), 25), 25);
    }
}
