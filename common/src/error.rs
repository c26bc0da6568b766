//! Error types for the LRA coordinator.

use crate::{LraId, LraStatus, ParticipantStatus, RecoveryToken};
use thiserror::Error;

/// Main error type for coordinator operations.
///
/// Participant-level outcomes are never surfaced through this type; they
/// are data (status values) reconciled by the state machine. Only
/// caller-facing precondition violations and coordinator-internal failures
/// are raised as errors.
#[derive(Error, Debug)]
pub enum LraError {
    /// LRA is unknown.
    #[error("LRA not found: {0}")]
    NotFound(LraId),

    /// Participant enlistment is unknown.
    #[error("participant not found in LRA {lra_id}: {token}")]
    ParticipantNotFound { lra_id: LraId, token: RecoveryToken },

    /// The LRA is not in a state that allows the requested operation.
    #[error("LRA {lra_id} is {status}, cannot {operation}")]
    PreconditionFailed {
        lra_id: LraId,
        status: LraStatus,
        operation: &'static str,
    },

    /// Invalid LRA state transition.
    #[error(transparent)]
    InvalidLraTransition(#[from] InvalidLraTransition),

    /// Invalid participant state transition.
    #[error(transparent)]
    InvalidParticipantTransition(#[from] InvalidParticipantTransition),

    /// Malformed request content (bad id, missing callbacks, bad header).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A participant endpoint could not be reached.
    #[error("participant unreachable: {0}")]
    ParticipantUnreachable(String),

    /// An outbound call exceeded its bounded timeout.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Internal coordinator error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LraError {
    /// Check if this error is retryable by the recovery engine.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LraError::ParticipantUnreachable(_) | LraError::Timeout(_)
        )
    }

    /// Get the error code used in API responses and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            LraError::NotFound(_) => "LRA_NOT_FOUND",
            LraError::ParticipantNotFound { .. } => "PARTICIPANT_NOT_FOUND",
            LraError::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            LraError::InvalidLraTransition(_) => "INVALID_TRANSITION",
            LraError::InvalidParticipantTransition(_) => "INVALID_PARTICIPANT_TRANSITION",
            LraError::InvalidInput(_) => "INVALID_INPUT",
            LraError::ParticipantUnreachable(_) => "PARTICIPANT_UNREACHABLE",
            LraError::Timeout(_) => "TIMEOUT",
            LraError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Error when attempting an invalid LRA state transition.
#[derive(Error, Debug, Clone)]
#[error("invalid LRA transition from {from} to {to}")]
pub struct InvalidLraTransition {
    pub from: LraStatus,
    pub to: LraStatus,
}

/// Error when attempting an invalid participant state transition.
#[derive(Error, Debug, Clone)]
#[error("invalid participant transition from {from} to {to}")]
pub struct InvalidParticipantTransition {
    pub from: ParticipantStatus,
    pub to: ParticipantStatus,
}

/// Result type alias for coordinator operations.
pub type Result<T> = std::result::Result<T, LraError>;
