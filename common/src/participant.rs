//! Participant enlistments and the per-participant protocol state machine.

use crate::{InvalidParticipantTransition, LraId, RecoveryToken};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Participant status within the completion/compensation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantStatus {
    /// Enlisted, no end-phase notification delivered yet.
    Active,
    /// Complete call accepted but not yet confirmed.
    Completing,
    /// Complete confirmed.
    Completed,
    /// Participant reported it cannot complete.
    FailedToComplete,
    /// Compensate call accepted but not yet confirmed.
    Compensating,
    /// Compensate confirmed.
    Compensated,
    /// Participant reported it cannot compensate.
    FailedToCompensate,
}

impl ParticipantStatus {
    /// Check if this is a terminal state (the participant has reported in).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ParticipantStatus::Completed
                | ParticipantStatus::FailedToComplete
                | ParticipantStatus::Compensated
                | ParticipantStatus::FailedToCompensate
        )
    }

    /// Check if this is an explicit failure state.
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            ParticipantStatus::FailedToComplete | ParticipantStatus::FailedToCompensate
        )
    }

    /// Check if a notification is pending confirmation.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            ParticipantStatus::Completing | ParticipantStatus::Compensating
        )
    }

    /// Get valid next states from the current state.
    ///
    /// `Completing -> Compensating` covers cancel overriding an in-flight
    /// close. `Completed -> Compensating` covers nested participants, which
    /// stay compensable after their LRA has closed until the parent ends.
    pub fn valid_transitions(&self) -> &[ParticipantStatus] {
        match self {
            ParticipantStatus::Active => &[
                ParticipantStatus::Completing,
                ParticipantStatus::Compensating,
            ],
            ParticipantStatus::Completing => &[
                ParticipantStatus::Completed,
                ParticipantStatus::FailedToComplete,
                ParticipantStatus::Compensating,
            ],
            ParticipantStatus::Completed => &[ParticipantStatus::Compensating],
            ParticipantStatus::Compensating => &[
                ParticipantStatus::Compensated,
                ParticipantStatus::FailedToCompensate,
            ],
            ParticipantStatus::FailedToComplete
            | ParticipantStatus::Compensated
            | ParticipantStatus::FailedToCompensate => &[],
        }
    }

    /// Check if a transition to the given state is valid.
    pub fn can_transition_to(&self, next: ParticipantStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParticipantStatus::Active => "Active",
            ParticipantStatus::Completing => "Completing",
            ParticipantStatus::Completed => "Completed",
            ParticipantStatus::FailedToComplete => "FailedToComplete",
            ParticipantStatus::Compensating => "Compensating",
            ParticipantStatus::Compensated => "Compensated",
            ParticipantStatus::FailedToCompensate => "FailedToCompensate",
        };
        f.write_str(s)
    }
}

impl FromStr for ParticipantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Active" => Ok(ParticipantStatus::Active),
            "Completing" => Ok(ParticipantStatus::Completing),
            "Completed" => Ok(ParticipantStatus::Completed),
            "FailedToComplete" => Ok(ParticipantStatus::FailedToComplete),
            "Compensating" => Ok(ParticipantStatus::Compensating),
            "Compensated" => Ok(ParticipantStatus::Compensated),
            "FailedToCompensate" => Ok(ParticipantStatus::FailedToCompensate),
            other => Err(format!("unknown participant status: {other}")),
        }
    }
}

/// Which end-phase protocol a participant is being driven through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Success path: the LRA is closing.
    Complete,
    /// Undo path: the LRA is cancelling.
    Compensate,
}

impl Direction {
    /// The in-progress participant status for this direction.
    pub fn in_progress(&self) -> ParticipantStatus {
        match self {
            Direction::Complete => ParticipantStatus::Completing,
            Direction::Compensate => ParticipantStatus::Compensating,
        }
    }

    /// The terminal success participant status for this direction.
    pub fn success(&self) -> ParticipantStatus {
        match self {
            Direction::Complete => ParticipantStatus::Completed,
            Direction::Compensate => ParticipantStatus::Compensated,
        }
    }

    /// The terminal failure participant status for this direction.
    pub fn failure(&self) -> ParticipantStatus {
        match self {
            Direction::Complete => ParticipantStatus::FailedToComplete,
            Direction::Compensate => ParticipantStatus::FailedToCompensate,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Complete => f.write_str("complete"),
            Direction::Compensate => f.write_str("compensate"),
        }
    }
}

/// Callback addresses for one participant. Absence of a URL means the
/// capability is not present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantEndpoints {
    /// Undo-path callback (`PUT`).
    pub compensate: Option<String>,
    /// Success-path callback (`PUT`).
    pub complete: Option<String>,
    /// Status probe (`GET`).
    pub status: Option<String>,
    /// Failure acknowledgment (`DELETE`).
    pub forget: Option<String>,
    /// Leave notification target.
    pub leave: Option<String>,
    /// After-LRA listener, notified once the LRA reaches a terminal state.
    pub after: Option<String>,
}

impl ParticipantEndpoints {
    /// The callback URL for the given direction, if the capability exists.
    pub fn for_direction(&self, direction: Direction) -> Option<&str> {
        match direction {
            Direction::Complete => self.complete.as_deref(),
            Direction::Compensate => self.compensate.as_deref(),
        }
    }

    /// Endpoint identity used for join-replaces-existing semantics: two
    /// enlistments naming the same compensate and complete URLs are the
    /// same participant.
    pub fn same_identity(&self, other: &ParticipantEndpoints) -> bool {
        self.compensate == other.compensate && self.complete == other.complete
    }

    /// Check that at least one end-phase callback is present.
    pub fn has_end_phase_callback(&self) -> bool {
        self.compensate.is_some() || self.complete.is_some()
    }
}

/// One enlistment of a remote endpoint with an LRA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Owning LRA.
    pub lra_id: LraId,
    /// Callback capability set.
    pub endpoints: ParticipantEndpoints,
    /// Token returned to the enlisting caller.
    pub recovery_token: RecoveryToken,
    /// Current protocol status.
    pub status: ParticipantStatus,
    /// Time after which the participant may no longer be able to
    /// compensate. `None` = unbounded.
    pub compensate_time_limit: Option<DateTime<Utc>>,
    /// Opaque bytes round-tripped on end-phase callbacks.
    pub user_data: Option<Vec<u8>>,
    /// When the participant enlisted.
    pub enlisted_at: DateTime<Utc>,
    /// Number of complete calls delivered.
    pub complete_calls: u32,
    /// Number of compensate calls delivered.
    pub compensate_calls: u32,
    /// Number of status probes issued.
    pub status_calls: u32,
    /// Number of forget calls issued.
    pub forget_calls: u32,
    /// Whether the after-LRA listener still needs notifying.
    pub after_pending: bool,
}

impl Participant {
    /// Create a new enlistment in `Active` status.
    pub fn new(lra_id: LraId, endpoints: ParticipantEndpoints) -> Self {
        let after_pending = endpoints.after.is_some();
        Self {
            lra_id,
            endpoints,
            recovery_token: RecoveryToken::new(),
            status: ParticipantStatus::Active,
            compensate_time_limit: None,
            user_data: None,
            enlisted_at: Utc::now(),
            complete_calls: 0,
            compensate_calls: 0,
            status_calls: 0,
            forget_calls: 0,
            after_pending,
        }
    }

    /// Transition to a new status, enforcing the state machine.
    pub fn transition_to(
        &mut self,
        next: ParticipantStatus,
    ) -> Result<(), InvalidParticipantTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidParticipantTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Record one delivered notification for the given direction.
    pub fn record_call(&mut self, direction: Direction) {
        match direction {
            Direction::Complete => self.complete_calls += 1,
            Direction::Compensate => self.compensate_calls += 1,
        }
    }
}
