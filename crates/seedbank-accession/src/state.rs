//! # Accession Lifecycle State Machine
//!
//! ## States
//!
//! ```text
//!                    check-in (one way)
//! AwaitingCheckIn ─────────────────────▶ AwaitingProcessing
//!        │                                     ▲ │
//!        │ generic edit                        │ ▼  generic edit among the
//!        ├──────────────▶ { AwaitingProcessing, Processing, Drying, InStorage }
//!        │                                     │
//!        ▼                                     │ quantity reaches zero
//!     UsedUp ◀─────────────────────────────────┘
//!        │
//!        └── quantity added back (revival) ──▶ InStorage
//! ```
//!
//! ## Design Decision
//!
//! The lifecycle uses an enum with a pure transition table
//! ([`AccessionState::allowed_targets`]) rather than typestate types: the
//! state arrives from the backend at runtime, and editors need the set of
//! selectable targets as data.
//!
//! Two rules sit outside the table on purpose:
//!
//! - `UsedUp` is reached only as a side effect of quantity depletion, never
//!   picked from an active state ([`validate_transition`]).
//! - A `UsedUp` accession is revived by adding quantity back, so its
//!   status action is [`StatusEditAction::AdjustQuantity`].

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// The lifecycle state of an accession.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessionState {
    /// Created, seeds not yet received at the seed bank.
    #[serde(rename = "Awaiting Check-In")]
    AwaitingCheckIn,
    /// Received, waiting to be cleaned and processed.
    #[serde(rename = "Awaiting Processing")]
    AwaitingProcessing,
    /// Being cleaned and processed.
    Processing,
    /// Drying before storage.
    Drying,
    /// Stored.
    #[serde(rename = "In Storage")]
    InStorage,
    /// No seeds remain.
    #[serde(rename = "Used Up")]
    UsedUp,
    /// A state this engine does not recognise.
    #[serde(other)]
    Unknown,
}

impl AccessionState {
    /// Every recognised state.
    pub const ALL: [AccessionState; 6] = [
        Self::AwaitingCheckIn,
        Self::AwaitingProcessing,
        Self::Processing,
        Self::Drying,
        Self::InStorage,
        Self::UsedUp,
    ];

    /// States that are freely editable among themselves.
    pub const ACTIVE: [AccessionState; 4] = [
        Self::AwaitingProcessing,
        Self::Processing,
        Self::Drying,
        Self::InStorage,
    ];

    /// What an unrecognised state offers in the status edit: every known
    /// state except `UsedUp`.
    pub const FALLBACK_SELECTABLE: [AccessionState; 5] = [
        Self::AwaitingCheckIn,
        Self::AwaitingProcessing,
        Self::Processing,
        Self::Drying,
        Self::InStorage,
    ];

    /// States selectable in a generic status edit from `self`.
    ///
    /// `UsedUp` has no entries: it is edited through quantity adjustment.
    /// Unrecognised states fall back to the full state set.
    pub fn allowed_targets(&self) -> &'static [AccessionState] {
        match self {
            Self::AwaitingCheckIn => &[
                Self::AwaitingProcessing,
                Self::Processing,
                Self::Drying,
                Self::InStorage,
                Self::UsedUp,
            ],
            Self::AwaitingProcessing | Self::Processing | Self::Drying | Self::InStorage => {
                &Self::ACTIVE
            }
            Self::UsedUp => &[],
            Self::Unknown => &Self::ALL,
        }
    }

    /// Whether this is one of the four active states.
    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// Whether remaining quantity may be adjusted in this state.
    pub fn allows_quantity_edit(&self) -> bool {
        matches!(self, Self::Drying | Self::InStorage | Self::UsedUp)
    }

    /// Whether seeds may be withdrawn in this state.
    pub fn allows_withdrawal(&self) -> bool {
        self.is_active()
    }

    /// The action offered by the "edit status" control.
    ///
    /// Every offered target passes [`validate_transition`].
    pub fn status_edit_action(&self) -> StatusEditAction {
        match self {
            Self::UsedUp => StatusEditAction::AdjustQuantity,
            Self::Unknown => StatusEditAction::Select(&Self::FALLBACK_SELECTABLE),
            other => StatusEditAction::Select(other.allowed_targets()),
        }
    }
}

impl std::fmt::Display for AccessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AwaitingCheckIn => "Awaiting Check-In",
            Self::AwaitingProcessing => "Awaiting Processing",
            Self::Processing => "Processing",
            Self::Drying => "Drying",
            Self::InStorage => "In Storage",
            Self::UsedUp => "Used Up",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// What the "edit status" control does for the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEditAction {
    /// Offer a choice among these states.
    Select(&'static [AccessionState]),
    /// Redirect to the quantity adjustment editor.
    AdjustQuantity,
}

/// Check a user-chosen status change.
///
/// # Errors
///
/// [`EngineError::InvalidTransition`] when `to` is not offered from
/// `from`, when `from` is `UsedUp`, or when `to` is `UsedUp` from
/// anywhere but `AwaitingCheckIn`.
pub fn validate_transition(from: AccessionState, to: AccessionState) -> Result<(), EngineError> {
    let reject = || EngineError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    };
    if to == AccessionState::Unknown || from == AccessionState::UsedUp {
        return Err(reject());
    }
    // Depletion is the only way into UsedUp once an accession is active.
    if to == AccessionState::UsedUp && from != AccessionState::AwaitingCheckIn {
        return Err(reject());
    }
    if !from.allowed_targets().contains(&to) {
        return Err(reject());
    }
    Ok(())
}

/// Check the one-way check-in action.
///
/// `post_check_in` must be an active state.
pub fn validate_check_in(
    from: AccessionState,
    post_check_in: AccessionState,
) -> Result<(), EngineError> {
    if from != AccessionState::AwaitingCheckIn || !post_check_in.is_active() {
        return Err(EngineError::InvalidTransition {
            from: from.to_string(),
            to: format!("check-in ({post_check_in})"),
        });
    }
    Ok(())
}

/// The state an accession moves to after its remaining quantity changed,
/// or `None` if the state is unaffected.
///
/// Zero remaining in `Drying`/`InStorage` depletes to `UsedUp`; a positive
/// amount on a `UsedUp` accession revives it into `revive_state`.
pub fn quantity_side_effect(
    state: AccessionState,
    remaining_is_zero: bool,
    revive_state: AccessionState,
) -> Option<AccessionState> {
    match state {
        AccessionState::Drying | AccessionState::InStorage if remaining_is_zero => {
            Some(AccessionState::UsedUp)
        }
        AccessionState::UsedUp if !remaining_is_zero => Some(revive_state),
        _ => None,
    }
}
