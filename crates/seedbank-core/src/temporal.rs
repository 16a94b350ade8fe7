//! # Temporal Types — Facility-Local Calendar
//!
//! Seed bank records carry calendar dates (`collectedDate`, `startDate`,
//! `recordingDate`, ...), not instants. Whether a date is "in the future"
//! depends on the seed bank's own time zone: an entry made at 23:30 in
//! Honolulu is already "tomorrow" in UTC.
//!
//! [`FacilityClock`] pins a [`Clock`] to an IANA zone and answers
//! `today()` in that zone. Tests use [`Clock::Fixed`] so that "no future
//! dates" rules are deterministic.
//!
//! ## Form Format
//!
//! Dates travel through editor drafts as `YYYY-MM-DD` strings. They are
//! parsed with [`parse_date`] and rendered with [`format_date`].

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::CoreError;

/// Format used by editor drafts and the wire.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Source of the current instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Clock {
    /// The host's system clock.
    #[default]
    System,
    /// A fixed instant.
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// The current instant according to this clock.
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => Utc::now(),
            Self::Fixed(instant) => *instant,
        }
    }
}

/// A clock bound to a facility's time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacilityClock {
    clock: Clock,
    time_zone: Tz,
}

impl FacilityClock {
    /// Bind `clock` to `time_zone`.
    pub fn new(clock: Clock, time_zone: Tz) -> Self {
        Self { clock, time_zone }
    }

    /// The facility's time zone.
    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    /// Today's calendar date in the facility's time zone.
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.time_zone).date_naive()
    }

    /// Whether `date` lies after today in the facility's time zone.
    pub fn is_future(&self, date: NaiveDate) -> bool {
        date > self.today()
    }
}

/// Parse a `YYYY-MM-DD` date. Surrounding whitespace is ignored.
pub fn parse_date(input: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| CoreError::InvalidDate {
        input: input.to_string(),
    })
}

/// Render a date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse an IANA time zone name such as `"America/Los_Angeles"`.
pub fn parse_time_zone(name: &str) -> Result<Tz, CoreError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| CoreError::UnknownTimeZone(name.to_string()))
}
