//! In-memory storage backend.
//!
//! This module provides a thread-safe in-memory implementation of the
//! measurement storage trait. It is intended for embedded usage, tests, and
//! as the index underneath the persistent backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::Utc;

use crate::entity::RecordId;
use crate::measure::{NewValue, NewVariable, Value, ValueId, Variable, VariableId};
use crate::storage::traits::{MeasurementStore, StorageError};

pub(crate) fn lock_err(context: &'static str) -> StorageError {
    StorageError::Backend(format!("poisoned lock: {context}"))
}

fn normalize_key(s: &str) -> String {
    s.trim().to_string()
}

/// Rows and secondary indexes shared by the in-memory and persistent
/// backends.
#[derive(Debug, Default)]
pub(crate) struct MeasurementState {
    variables: BTreeMap<VariableId, Variable>,
    by_name: HashMap<String, VariableId>,
    values: BTreeMap<ValueId, Value>,
    by_owner: HashMap<(VariableId, Option<RecordId>), Vec<ValueId>>,
    by_variable: HashMap<VariableId, Vec<ValueId>>,
    last_variable_id: u64,
    last_value_id: u64,
}

impl MeasurementState {
    /// Assigns the next variable id without storing anything.
    pub(crate) fn prepare_variable(&self, new: NewVariable) -> Result<Variable, StorageError> {
        let key = normalize_key(&new.name);
        if self.by_name.contains_key(&key) {
            return Err(StorageError::DuplicateKey(key));
        }
        Ok(new.into_variable(VariableId(self.last_variable_id + 1)))
    }

    /// Assigns the next value id and stamps the creation time.
    pub(crate) fn prepare_value(&self, new: NewValue) -> Result<Value, StorageError> {
        if !self.variables.contains_key(&new.variable_id) {
            return Err(StorageError::NotFound {
                kind: "variable".to_string(),
                key: new.variable_id.to_string(),
            });
        }
        Ok(new.into_value(ValueId(self.last_value_id + 1), Utc::now()))
    }

    pub(crate) fn apply_variable(&mut self, variable: Variable) -> Result<(), StorageError> {
        let key = normalize_key(&variable.name);
        if self.by_name.contains_key(&key) || self.variables.contains_key(&variable.id) {
            return Err(StorageError::DuplicateKey(key));
        }
        self.last_variable_id = self.last_variable_id.max(variable.id.0);
        self.by_name.insert(key, variable.id);
        self.variables.insert(variable.id, variable);
        Ok(())
    }

    pub(crate) fn apply_value(&mut self, value: Value) -> Result<(), StorageError> {
        if self.values.contains_key(&value.id) {
            return Err(StorageError::DuplicateKey(format!("value {}", value.id)));
        }
        self.last_value_id = self.last_value_id.max(value.id.0);
        self.by_owner
            .entry((value.variable_id, value.owner_id))
            .or_default()
            .push(value.id);
        self.by_variable
            .entry(value.variable_id)
            .or_default()
            .push(value.id);
        self.values.insert(value.id, value);
        Ok(())
    }

    pub(crate) fn apply_update(&mut self, id: ValueId, value: f64) -> Result<Value, StorageError> {
        let row = self.values.get_mut(&id).ok_or_else(|| StorageError::NotFound {
            kind: "value".to_string(),
            key: id.to_string(),
        })?;
        row.value = value;
        Ok(row.clone())
    }

    pub(crate) fn contains_value(&self, id: ValueId) -> bool {
        self.values.contains_key(&id)
    }

    pub(crate) fn variable_by_name(&self, name: &str) -> Option<Variable> {
        self.by_name
            .get(&normalize_key(name))
            .and_then(|id| self.variables.get(id))
            .cloned()
    }

    pub(crate) fn variable(&self, id: VariableId) -> Option<Variable> {
        self.variables.get(&id).cloned()
    }

    pub(crate) fn variables(&self) -> Vec<Variable> {
        self.variables.values().cloned().collect()
    }

    fn collect(&self, ids: Option<&Vec<ValueId>>) -> Vec<Value> {
        // Index vectors are appended in id order, so no sort is needed.
        ids.map(|ids| {
            ids.iter()
                .filter_map(|id| self.values.get(id).cloned())
                .collect()
        })
        .unwrap_or_default()
    }

    pub(crate) fn values_for_variable(&self, variable: VariableId) -> Vec<Value> {
        self.collect(self.by_variable.get(&variable))
    }

    pub(crate) fn values_for_owner(
        &self,
        variable: VariableId,
        owner: Option<RecordId>,
    ) -> Vec<Value> {
        self.collect(self.by_owner.get(&(variable, owner)))
    }

    pub(crate) fn count_values(&self) -> usize {
        self.values.len()
    }
}

/// Thread-safe in-memory measurement store.
#[derive(Debug, Default)]
pub struct InMemoryMeasurementStore {
    state: RwLock<MeasurementState>,
}

impl InMemoryMeasurementStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MeasurementStore for InMemoryMeasurementStore {
    fn insert_variable(&self, variable: NewVariable) -> Result<Variable, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("variable.insert"))?;
        let variable = state.prepare_variable(variable)?;
        state.apply_variable(variable.clone())?;
        Ok(variable)
    }

    fn variable_by_name(&self, name: &str) -> Result<Option<Variable>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("variable.by_name"))?;
        Ok(state.variable_by_name(name))
    }

    fn variable(&self, id: VariableId) -> Result<Option<Variable>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("variable.get"))?;
        Ok(state.variable(id))
    }

    fn variables(&self) -> Result<Vec<Variable>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("variable.list"))?;
        Ok(state.variables())
    }

    fn insert_value(&self, value: NewValue) -> Result<Value, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("value.insert"))?;
        let value = state.prepare_value(value)?;
        state.apply_value(value.clone())?;
        Ok(value)
    }

    fn update_value(&self, id: ValueId, value: f64) -> Result<Value, StorageError> {
        let mut state = self.state.write().map_err(|_| lock_err("value.update"))?;
        state.apply_update(id, value)
    }

    fn values_for_variable(&self, variable: VariableId) -> Result<Vec<Value>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("value.for_variable"))?;
        Ok(state.values_for_variable(variable))
    }

    fn values_for_owner(
        &self,
        variable: VariableId,
        owner: Option<RecordId>,
    ) -> Result<Vec<Value>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("value.for_owner"))?;
        Ok(state.values_for_owner(variable, owner))
    }

    fn count_values(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("value.count"))?;
        Ok(state.count_values())
    }
}
