//! Timestamped scalar observations.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::RecordId;
use crate::error::ValidationError;
use crate::measure::variable::VariableId;

/// Store-assigned value identifier. Ids grow in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueId(pub u64);

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One observation of a variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub id: ValueId,
    pub variable_id: VariableId,
    /// Owning entity; its kind is the variable's scope.
    #[serde(default)]
    pub owner_id: Option<RecordId>,
    /// Acting user, if any.
    #[serde(default)]
    pub user_id: Option<RecordId>,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Fields of a value that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewValue {
    pub variable_id: VariableId,
    pub owner_id: Option<RecordId>,
    pub user_id: Option<RecordId>,
    pub value: f64,
}

impl NewValue {
    #[must_use]
    pub fn into_value(self, id: ValueId, timestamp: DateTime<Utc>) -> Value {
        Value {
            id,
            variable_id: self.variable_id,
            owner_id: self.owner_id,
            user_id: self.user_id,
            value: self.value,
            timestamp,
        }
    }
}

/// Rejects NaN and infinities.
pub fn validate_measurement(value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NonFiniteMeasurement { value })
    }
}

/// Parses raw request input into a measurement.
///
/// # Examples
///
/// ```
/// use mooclet::measure::parse_measurement;
///
/// assert_eq!(parse_measurement(" 6 ").unwrap(), 6.0);
/// assert!(parse_measurement("six").is_err());
/// ```
pub fn parse_measurement(raw: &str) -> Result<f64, ValidationError> {
    let parsed: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::NonNumericMeasurement {
            raw: raw.to_string(),
        })?;
    validate_measurement(parsed)
}
