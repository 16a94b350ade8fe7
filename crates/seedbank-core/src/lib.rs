//! # seedbank-core — Foundational Types for the Accession Engine
//!
//! This crate is the leaf of the workspace. It defines the primitives every
//! other crate shares and depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `AccessionId`, `FacilityId`,
//!    `ViabilityTestId`, `WithdrawalId` are distinct UUID newtypes, so a
//!    withdrawal id can never be passed where a test id is expected.
//!    `AccessionNumber` is validated at construction.
//!
//! 2. **Facility-local calendar.** Seed bank dates are calendar dates in the
//!    facility's own time zone. "Today" is always computed through
//!    [`FacilityClock`], never from the host's local zone.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `seedbank-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod temporal;

pub use error::CoreError;
pub use identity::{AccessionId, AccessionNumber, FacilityId, ViabilityTestId, WithdrawalId};
pub use temporal::{format_date, parse_date, parse_time_zone, Clock, FacilityClock};
