//! Error types for the MOOClet engine.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! specific conditions (an empty decision space is handled very differently
//! from a malformed rating).

use thiserror::Error;

use crate::entity::{EntityTag, RecordId};
use crate::storage::StorageError;

/// Validation errors that occur during input validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Measurement '{raw}' is not numeric")]
    NonNumericMeasurement {
        raw: String,
    },

    #[error("Measurement {value} is not a finite number")]
    NonFiniteMeasurement {
        value: f64,
    },

    #[error("Variable name cannot be empty")]
    EmptyVariableName,

    #[error("Context does not reference mooclet {mooclet_id}")]
    MissingMoocletContext {
        mooclet_id: RecordId,
    },

    #[error("Context references mooclet {found}, expected mooclet {expected}")]
    ContextMismatch {
        expected: RecordId,
        found: RecordId,
    },

    #[error("Context does not identify a mooclet")]
    NoMoocletInContext,

    #[error("Simulation requires at least one iteration")]
    ZeroIterations,

    #[error("Mooclet type '{mooclet_type}' attaches under {expected:?}, got {actual:?}")]
    ParentMismatch {
        mooclet_type: String,
        expected: Option<EntityTag>,
        actual: Option<EntityTag>,
    },

    #[error("Answer choice {choice} is out of range (question has {available} answers)")]
    AnswerChoiceOutOfRange {
        choice: usize,
        available: usize,
    },

    #[error("Answer {answer_id} has no explanation mooclet")]
    MissingExplanationMooclet {
        answer_id: RecordId,
    },

    #[error("Unknown entity tag '{raw}'")]
    UnknownEntityTag {
        raw: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Execution errors that occur while running an operation.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{kind} not found: {key}")]
    NotFound {
        kind: String,
        key: String,
    },

    #[error("Mooclet {mooclet_id} has no versions to choose from")]
    EmptyDecisionSpace {
        mooclet_id: RecordId,
    },

    #[error("No selection strategy registered for policy '{policy}'")]
    UnknownPolicy {
        policy: String,
    },

    #[error("Policy '{policy}' failed: {reason}")]
    PolicyFailed {
        policy: String,
        reason: String,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
    },

    #[error("Gateway error: {message}")]
    Gateway {
        message: String,
    },

    #[error("Simulation worker failed: {message}")]
    Worker {
        message: String,
    },
}

impl ExecutionError {
    /// Builds a `NotFound` error for an entity or variable lookup.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, key: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.into(),
            key: key.to_string(),
        }
    }
}

/// Top-level error type for the engine.
#[derive(Debug, Error)]
pub enum MoocletError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl From<StorageError> for MoocletError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { kind, key } => {
                Self::Execution(ExecutionError::NotFound { kind, key })
            }
            other => Self::Execution(ExecutionError::Storage {
                message: other.to_string(),
            }),
        }
    }
}

impl MoocletError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if a lookup found nothing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::NotFound { .. }))
    }

    /// Returns true if the mooclet had no versions.
    #[must_use]
    pub const fn is_empty_decision_space(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::EmptyDecisionSpace { .. }))
    }

    /// Returns true if the bound policy has no registered strategy.
    #[must_use]
    pub const fn is_unknown_policy(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::UnknownPolicy { .. }))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Execution(e) => matches!(
                e,
                ExecutionError::Storage { .. } | ExecutionError::Gateway { .. }
            ),
            Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for engine operations.
pub type MoocletResult<T> = Result<T, MoocletError>;
