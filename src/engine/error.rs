//! Error types for the intake pipeline.
//!
//! The `Display` text of [`IntakeError`] is the message returned to the caller,
//! so it must never carry internal detail.

use thiserror::Error;

use crate::timestamp::TimestampError;
use crate::validate::ValidationErrors;

/// The pipeline stage a request stopped at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validation,
    Authentication,
    Timestamp,
    Signature,
}

/// Top-level error returned by [`Engine::evaluate`](super::Engine::evaluate).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("Access Denied!")]
    Authentication,

    #[error("Invalid timestamp format")]
    InvalidTimestamp,

    #[error("Expired.")]
    ExpiredTimestamp,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Internal server error")]
    Internal,
}

impl IntakeError {
    /// `None` for faults not tied to a stage.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            IntakeError::Validation(_) => Some(Stage::Validation),
            IntakeError::Authentication => Some(Stage::Authentication),
            IntakeError::InvalidTimestamp | IntakeError::ExpiredTimestamp => Some(Stage::Timestamp),
            IntakeError::InvalidSignature => Some(Stage::Signature),
            IntakeError::Internal => None,
        }
    }
}

impl From<TimestampError> for IntakeError {
    fn from(err: TimestampError) -> Self {
        match err {
            TimestampError::Unparseable(_) => IntakeError::InvalidTimestamp,
            TimestampError::OutOfWindow { .. } => IntakeError::ExpiredTimestamp,
        }
    }
}
