//! Record and revision state machine.
//!
//! ```text
//!            create            finalize
//!   (none) ─────────► DRAFT ─────────────► FINALIZED
//!                       ▲                      │
//!                       └────── amend ─────────┘
//!   DRAFT | FINALIZED ── void ──► VOIDED (terminal)
//! ```
//!
//! The checks here are pure and run before any write. The store re-checks
//! the same conditions atomically when it applies a transition.

use tlg_types::{EventType, RecordStatus, RevisionState};

use crate::error::TransitionCode;

/// A lifecycle action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    UpdateDraft,
    Finalize,
    FinalizeAmendment,
    Amend,
    Void,
    Attest,
}

/// What an action is checked against.
///
/// For `Amend` and `Void` the revision is the record's current revision;
/// for the others it is the revision being acted on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Facts {
    pub record: RecordStatus,
    pub revision: RevisionState,
    pub version: u32,
    pub is_current: bool,
}

/// Decide whether `action` is allowed.
pub fn check(action: Action, facts: &Facts) -> Result<(), TransitionCode> {
    match action {
        Action::UpdateDraft => {
            if facts.revision == RevisionState::Finalized {
                return Err(TransitionCode::AlreadyFinalized);
            }
            if facts.record == RecordStatus::Voided {
                return Err(TransitionCode::RecordVoided);
            }
        }
        Action::Finalize | Action::FinalizeAmendment => {
            if facts.revision == RevisionState::Finalized {
                return Err(TransitionCode::AlreadyFinalized);
            }
            if action == Action::FinalizeAmendment && facts.version < 2 {
                return Err(TransitionCode::NotAnAmendment);
            }
            if facts.record == RecordStatus::Voided {
                return Err(TransitionCode::RecordVoided);
            }
            if !facts.is_current {
                return Err(TransitionCode::RevisionNotCurrent);
            }
        }
        Action::Amend => match facts.record {
            RecordStatus::Voided => return Err(TransitionCode::RecordVoided),
            RecordStatus::Draft => return Err(TransitionCode::RecordNotFinalized),
            RecordStatus::Finalized if facts.revision == RevisionState::Unfinalized => {
                return Err(TransitionCode::CurrentRevisionOpen)
            }
            RecordStatus::Finalized => {}
        },
        Action::Void => {
            if facts.record == RecordStatus::Voided {
                return Err(TransitionCode::AlreadyVoided);
            }
        }
        Action::Attest => {
            if facts.revision == RevisionState::Unfinalized {
                return Err(TransitionCode::RevisionNotFinalized);
            }
            if facts.record == RecordStatus::Voided {
                return Err(TransitionCode::RecordVoided);
            }
        }
    }
    Ok(())
}

/// Record status after `action` succeeds.
pub fn next_status(action: Action, current: RecordStatus) -> RecordStatus {
    match action {
        Action::Finalize | Action::FinalizeAmendment => RecordStatus::Finalized,
        Action::Amend => RecordStatus::Draft,
        Action::Void => RecordStatus::Voided,
        Action::UpdateDraft | Action::Attest => current,
    }
}

/// The audit event a successful `action` appends.
pub fn event_type(action: Action, version: u32) -> EventType {
    match action {
        Action::UpdateDraft => EventType::DraftUpdated,
        Action::Finalize if version > 1 => EventType::AmendmentFinalized,
        Action::Finalize => EventType::Finalized,
        Action::FinalizeAmendment => EventType::AmendmentFinalized,
        Action::Amend => EventType::Amended,
        Action::Void => EventType::Voided,
        Action::Attest => EventType::Attested,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlg_types::RecordStatus::{Draft, Finalized, Voided};
    use tlg_types::RevisionState::{Finalized as Sealed, Unfinalized as Open};

    fn facts(record: RecordStatus, revision: RevisionState, version: u32) -> Facts {
        Facts {
            record,
            revision,
            version,
            is_current: true,
        }
    }

    #[test]
    fn transition_table() {
        let cases: &[(Action, Facts, Result<(), TransitionCode>)] = &[
            (Action::UpdateDraft, facts(Draft, Open, 1), Ok(())),
            (
                Action::UpdateDraft,
                facts(Finalized, Sealed, 1),
                Err(TransitionCode::AlreadyFinalized),
            ),
            (Action::UpdateDraft, facts(Voided, Open, 1), Err(TransitionCode::RecordVoided)),
            (Action::Finalize, facts(Draft, Open, 1), Ok(())),
            (Action::Finalize, facts(Draft, Open, 3), Ok(())),
            (Action::Finalize, facts(Finalized, Sealed, 1), Err(TransitionCode::AlreadyFinalized)),
            (Action::Finalize, facts(Voided, Open, 1), Err(TransitionCode::RecordVoided)),
            (Action::FinalizeAmendment, facts(Draft, Open, 2), Ok(())),
            (Action::FinalizeAmendment, facts(Draft, Open, 1), Err(TransitionCode::NotAnAmendment)),
            (Action::Amend, facts(Finalized, Sealed, 1), Ok(())),
            (Action::Amend, facts(Draft, Open, 1), Err(TransitionCode::RecordNotFinalized)),
            (Action::Amend, facts(Finalized, Open, 2), Err(TransitionCode::CurrentRevisionOpen)),
            (Action::Amend, facts(Voided, Sealed, 1), Err(TransitionCode::RecordVoided)),
            (Action::Void, facts(Draft, Open, 1), Ok(())),
            (Action::Void, facts(Finalized, Sealed, 4), Ok(())),
            (Action::Void, facts(Voided, Sealed, 1), Err(TransitionCode::AlreadyVoided)),
            (Action::Attest, facts(Finalized, Sealed, 1), Ok(())),
            (Action::Attest, facts(Draft, Sealed, 1), Ok(())),
            (Action::Attest, facts(Draft, Open, 2), Err(TransitionCode::RevisionNotFinalized)),
            (Action::Attest, facts(Voided, Sealed, 1), Err(TransitionCode::RecordVoided)),
        ];
        for (action, facts, expected) in cases {
            assert_eq!(check(*action, facts), *expected, "{action:?} on {facts:?}");
        }
    }

    #[test]
    fn finalize_requires_current_revision() {
        let stale = Facts {
            is_current: false,
            ..facts(Draft, Open, 1)
        };
        assert_eq!(
            check(Action::Finalize, &stale),
            Err(TransitionCode::RevisionNotCurrent)
        );
    }

    #[test]
    fn voided_is_terminal() {
        let actions = [
            Action::UpdateDraft,
            Action::Finalize,
            Action::FinalizeAmendment,
            Action::Amend,
            Action::Void,
            Action::Attest,
        ];
        for action in actions {
            for revision in [Open, Sealed] {
                assert!(check(action, &facts(Voided, revision, 2)).is_err(), "{action:?}");
            }
        }
    }

    #[test]
    fn statuses_and_events() {
        assert_eq!(next_status(Action::Amend, Finalized), Draft);
        assert_eq!(next_status(Action::Finalize, Draft), Finalized);
        assert_eq!(next_status(Action::Attest, Finalized), Finalized);
        assert_eq!(event_type(Action::Finalize, 1), EventType::Finalized);
        assert_eq!(event_type(Action::Finalize, 2), EventType::AmendmentFinalized);
        assert_eq!(event_type(Action::Void, 1), EventType::Voided);
    }
}
