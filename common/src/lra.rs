//! LRA records and the LRA lifecycle state machine.

use crate::{ClientId, InvalidLraTransition, LraId, Participant, RecoveryToken};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// LRA status representing the lifecycle state.
///
/// Serialized with the plain-text spelling used on the wire
/// (e.g. `Closing`, `FailedToCancel`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LraStatus {
    /// LRA is in progress; participants may join and leave.
    Active,
    /// Close requested; completion notifications in flight.
    Closing,
    /// All participants completed.
    Closed,
    /// Cancel requested; compensation notifications in flight.
    Cancelling,
    /// All participants compensated.
    Cancelled,
    /// At least one participant could not complete.
    FailedToClose,
    /// At least one participant could not compensate.
    FailedToCancel,
}

impl LraStatus {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LraStatus::Closed
                | LraStatus::Cancelled
                | LraStatus::FailedToClose
                | LraStatus::FailedToCancel
        )
    }

    /// Check if the LRA is ending (close or cancel in progress).
    pub fn is_ending(&self) -> bool {
        matches!(self, LraStatus::Closing | LraStatus::Cancelling)
    }

    /// Get valid next states from the current state.
    ///
    /// `Cancelling` is reachable from `Closing` (cancel overrides close)
    /// but not vice versa. No transition is reversible.
    pub fn valid_transitions(&self) -> &[LraStatus] {
        match self {
            LraStatus::Active => &[LraStatus::Closing, LraStatus::Cancelling],
            LraStatus::Closing => &[
                LraStatus::Closed,
                LraStatus::FailedToClose,
                LraStatus::Cancelling,
            ],
            LraStatus::Cancelling => &[LraStatus::Cancelled, LraStatus::FailedToCancel],
            LraStatus::Closed
            | LraStatus::Cancelled
            | LraStatus::FailedToClose
            | LraStatus::FailedToCancel => &[],
        }
    }

    /// Check if a transition to the given state is valid.
    pub fn can_transition_to(&self, next: LraStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for LraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LraStatus::Active => "Active",
            LraStatus::Closing => "Closing",
            LraStatus::Closed => "Closed",
            LraStatus::Cancelling => "Cancelling",
            LraStatus::Cancelled => "Cancelled",
            LraStatus::FailedToClose => "FailedToClose",
            LraStatus::FailedToCancel => "FailedToCancel",
        };
        f.write_str(s)
    }
}

impl FromStr for LraStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Active" => Ok(LraStatus::Active),
            "Closing" => Ok(LraStatus::Closing),
            "Closed" => Ok(LraStatus::Closed),
            "Cancelling" => Ok(LraStatus::Cancelling),
            "Cancelled" => Ok(LraStatus::Cancelled),
            "FailedToClose" => Ok(LraStatus::FailedToClose),
            "FailedToCancel" => Ok(LraStatus::FailedToCancel),
            other => Err(format!("unknown LRA status: {other}")),
        }
    }
}

/// A complete LRA record as held by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lra {
    /// Unique LRA identifier. Immutable after creation.
    pub id: LraId,
    /// Enclosing LRA, if this is a nested LRA.
    pub parent_id: Option<LraId>,
    /// Caller-supplied label.
    pub client_id: ClientId,
    /// Current status.
    pub status: LraStatus,
    /// Absolute time after which the LRA is eligible for automatic
    /// cancellation. `None` means no deadline.
    pub deadline: Option<DateTime<Utc>>,
    /// When the LRA was started.
    pub created_at: DateTime<Utc>,
    /// When the LRA reached a terminal status.
    pub ended_at: Option<DateTime<Utc>>,
    /// Enlisted participants, in insertion order.
    pub participants: Vec<Participant>,
    /// LRAs nested directly under this one.
    pub children: Vec<LraId>,
}

impl Lra {
    /// Create a new LRA in `Active` status.
    pub fn new(client_id: ClientId, parent_id: Option<LraId>, deadline: Option<DateTime<Utc>>) -> Self {
        Self {
            id: LraId::new(),
            parent_id,
            client_id,
            status: LraStatus::Active,
            deadline,
            created_at: Utc::now(),
            ended_at: None,
            participants: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Check if this LRA is nested under a parent.
    pub fn is_nested(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Check if the deadline has passed.
    pub fn is_deadline_expired(&self) -> bool {
        self.deadline.map(|d| Utc::now() > d).unwrap_or(false)
    }

    /// Transition to a new status, enforcing the state machine.
    pub fn transition_to(&mut self, next: LraStatus) -> Result<(), InvalidLraTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidLraTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Find a participant by recovery token.
    pub fn participant(&self, token: &RecoveryToken) -> Option<&Participant> {
        self.participants.iter().find(|p| p.recovery_token == *token)
    }

    /// Find a participant by recovery token, mutably.
    pub fn participant_mut(&mut self, token: &RecoveryToken) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.recovery_token == *token)
    }

    /// Insert a participant, replacing any existing enlistment with the
    /// same endpoint identity. Returns the recovery token of the stored
    /// enlistment.
    pub fn upsert_participant(&mut self, participant: Participant) -> RecoveryToken {
        if let Some(existing) = self
            .participants
            .iter_mut()
            .find(|p| p.endpoints.same_identity(&participant.endpoints))
        {
            let token = existing.recovery_token;
            existing.endpoints = participant.endpoints;
            existing.compensate_time_limit = participant.compensate_time_limit;
            existing.user_data = participant.user_data;
            return token;
        }
        let token = participant.recovery_token;
        self.participants.push(participant);
        token
    }

    /// Remove a participant by recovery token. Returns the removed record.
    pub fn remove_participant(&mut self, token: &RecoveryToken) -> Option<Participant> {
        let idx = self
            .participants
            .iter()
            .position(|p| p.recovery_token == *token)?;
        Some(self.participants.remove(idx))
    }

    /// Check if every participant has reached a terminal status.
    pub fn all_participants_terminal(&self) -> bool {
        self.participants.iter().all(|p| p.status.is_terminal())
    }
}
