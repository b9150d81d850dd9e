//! Abstract storage traits for measurements.
//!
//! These traits define the contract that storage backends must implement.
//! The in-memory backend serves tests and embedded use; the persistent
//! backend adds a write-ahead log underneath the same index.

use thiserror::Error;

use crate::entity::RecordId;
use crate::measure::{NewValue, NewVariable, Value, ValueId, Variable, VariableId};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Row not found.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// Kind of row that was looked up.
        kind: String,
        /// Lookup key.
        key: String,
    },

    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Storage trait for measurement variables and values.
///
/// # Concurrency
/// - Implementations must be safe to share between threads.
/// - `insert_variable` must reject a second variable with the same name with
///   `DuplicateKey`; callers rely on this to converge concurrent creation.
/// - Value ids must increase in creation order.
pub trait MeasurementStore: Send + Sync {
    /// Insert a new variable. Returns `DuplicateKey` if the name is taken.
    fn insert_variable(&self, variable: NewVariable) -> Result<Variable, StorageError>;

    /// Get a variable by its unique name.
    fn variable_by_name(&self, name: &str) -> Result<Option<Variable>, StorageError>;

    /// Get a variable by id.
    fn variable(&self, id: VariableId) -> Result<Option<Variable>, StorageError>;

    /// All variables, ascending by id.
    fn variables(&self) -> Result<Vec<Variable>, StorageError>;

    /// Append a value.
    fn insert_value(&self, value: NewValue) -> Result<Value, StorageError>;

    /// Overwrite the scalar of an existing value in place.
    fn update_value(&self, id: ValueId, value: f64) -> Result<Value, StorageError>;

    /// All values of a variable in creation order.
    fn values_for_variable(&self, variable: VariableId) -> Result<Vec<Value>, StorageError>;

    /// Values of a variable owned by `owner` (`None` = unowned), in creation
    /// order.
    fn values_for_owner(
        &self,
        variable: VariableId,
        owner: Option<RecordId>,
    ) -> Result<Vec<Value>, StorageError>;

    /// Total number of stored values.
    fn count_values(&self) -> Result<usize, StorageError>;
}
