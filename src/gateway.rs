//! Ports to external collaborators.
//!
//! The engine never speaks LMS or survey-vendor protocols itself; the
//! embedding application supplies implementations of these traits.

use crate::entity::{Question, Quiz, User};
use crate::error::{ExecutionError, MoocletError};

/// Sends grades back to the learning management system.
pub trait LmsGateway: Send + Sync {
    /// Reports `score` (0.0..=1.0) for `user` on `quiz`.
    fn grade_passback(&self, score: f64, user: &User, quiz: &Quiz) -> Result<(), GatewayError>;
}

/// Creates externally hosted surveys.
pub trait SurveyProvisioner: Send + Sync {
    /// Provisions a survey for `question` and returns its URL.
    fn provision(&self, quiz: &Quiz, question: &Question) -> Result<String, GatewayError>;
}

/// Failure reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{service}: {message}")]
pub struct GatewayError {
    pub service: String,
    pub message: String,
}

impl GatewayError {
    #[must_use]
    pub fn new(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            message: message.into(),
        }
    }
}

impl From<GatewayError> for MoocletError {
    fn from(err: GatewayError) -> Self {
        Self::Execution(ExecutionError::Gateway {
            message: err.to_string(),
        })
    }
}

/// Gateway that accepts every grade without sending it anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLmsGateway;

impl LmsGateway for NoopLmsGateway {
    fn grade_passback(&self, _score: f64, _user: &User, _quiz: &Quiz) -> Result<(), GatewayError> {
        Ok(())
    }
}
