//! Measurement variable definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityTag;
use crate::error::ValidationError;

/// Store-assigned variable identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableId(pub u64);

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How writes to a variable behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// Every write appends a new value (event logs: ratings, grades).
    #[default]
    Log,
    /// Writes replace the current value (recomputed means, counts,
    /// probabilities).
    Aggregate,
}

/// A named measurement definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub id: VariableId,
    /// Unique name.
    pub name: String,
    pub display_name: String,
    /// Kind of entity that owns this variable's values; `None` means any.
    #[serde(default)]
    pub scope: Option<EntityTag>,
    /// Values are further partitioned by the acting user.
    #[serde(default)]
    pub is_user_variable: bool,
    #[serde(default)]
    pub mode: RecordMode,
}

/// Fields of a variable that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVariable {
    pub name: String,
    pub display_name: String,
    pub scope: Option<EntityTag>,
    pub is_user_variable: bool,
    pub mode: RecordMode,
}

impl NewVariable {
    /// Attaches a store-assigned id.
    #[must_use]
    pub fn into_variable(self, id: VariableId) -> Variable {
        Variable {
            id,
            name: self.name,
            display_name: self.display_name,
            scope: self.scope,
            is_user_variable: self.is_user_variable,
            mode: self.mode,
        }
    }
}

/// Builder describing a variable for get-or-create.
///
/// # Examples
///
/// ```
/// use mooclet::{EntityTag, RecordMode, VariableSpec};
///
/// let spec = VariableSpec::new("mean_student_rating")
///     .display_name("Mean Student Rating")
///     .scope(EntityTag::Version)
///     .mode(RecordMode::Aggregate);
/// assert_eq!(spec.name(), "mean_student_rating");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSpec {
    name: String,
    display_name: Option<String>,
    scope: Option<EntityTag>,
    is_user_variable: bool,
    mode: RecordMode,
}

impl VariableSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            scope: None,
            is_user_variable: false,
            mode: RecordMode::Log,
        }
    }

    #[must_use]
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: EntityTag) -> Self {
        self.scope = Some(scope);
        self
    }

    #[must_use]
    pub const fn user_variable(mut self, is_user_variable: bool) -> Self {
        self.is_user_variable = is_user_variable;
        self
    }

    #[must_use]
    pub const fn mode(mut self, mode: RecordMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validates the spec and produces the row to insert.
    pub fn build(self) -> Result<NewVariable, ValidationError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::EmptyVariableName);
        }
        let display_name = self.display_name.unwrap_or_else(|| name.clone());
        Ok(NewVariable {
            name,
            display_name,
            scope: self.scope,
            is_user_variable: self.is_user_variable,
            mode: self.mode,
        })
    }
}
