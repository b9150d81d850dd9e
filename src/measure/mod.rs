//! Generic measurement store.
//!
//! A [`Variable`] names a kind of measurement; a [`Value`] is one
//! timestamped scalar observation attached to an owning entity (of the
//! variable's scope) and optionally to the acting user. New kinds of
//! measurement never need a schema change: they are variables created on
//! first write.
//!
//! [`Measurements`] is the facade every flow goes through.

mod aggregate;
pub mod names;
mod value;
mod variable;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::AssociationResolver;
use crate::config::MeasurementConfig;
use crate::context::Context;
use crate::entity::{OwnerRef, RecordId};
use crate::error::{ExecutionError, MoocletError, MoocletResult};
use crate::storage::{MeasurementStore, StorageError};

pub use aggregate::Summary;
pub use value::{parse_measurement, validate_measurement, NewValue, Value, ValueId};
pub use variable::{NewVariable, RecordMode, Variable, VariableId, VariableSpec};

/// Per-query memo of owner lineages.
type LineageCache = HashMap<OwnerRef, Vec<OwnerRef>>;

/// Variable/Value operations over a [`MeasurementStore`].
#[derive(Clone)]
pub struct Measurements {
    store: Arc<dyn MeasurementStore>,
    resolver: Arc<AssociationResolver>,
    config: MeasurementConfig,
}

impl std::fmt::Debug for Measurements {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Measurements")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Measurements {
    #[must_use]
    pub fn new(
        store: Arc<dyn MeasurementStore>,
        resolver: Arc<AssociationResolver>,
        config: MeasurementConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            config,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn MeasurementStore> {
        &self.store
    }

    /// Returns the variable named by `spec`, creating it if needed.
    ///
    /// Idempotent on the name: an existing variable is returned as stored,
    /// even if `spec` describes it differently. Concurrent first-time
    /// creation converges on one row.
    pub fn get_or_create_variable(&self, spec: VariableSpec) -> MoocletResult<Variable> {
        let new = spec.build()?;
        let attempts = self.config.variable_create_retries.max(1);
        for attempt in 1..=attempts {
            if let Some(existing) = self.store.variable_by_name(&new.name)? {
                return Ok(existing);
            }
            match self.store.insert_variable(new.clone()) {
                Ok(created) => {
                    debug!(name = %created.name, id = %created.id, "created variable");
                    return Ok(created);
                }
                Err(StorageError::DuplicateKey(_)) => {
                    debug!(name = %new.name, attempt, "lost variable creation race, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(MoocletError::internal(format!(
            "variable '{}' could not be created after {} attempts",
            new.name, attempts
        )))
    }

    /// Looks up a variable by name.
    pub fn variable(&self, name: &str) -> MoocletResult<Variable> {
        self.find_variable(name)?
            .ok_or_else(|| ExecutionError::not_found("variable", name).into())
    }

    pub fn find_variable(&self, name: &str) -> MoocletResult<Option<Variable>> {
        Ok(self.store.variable_by_name(name)?)
    }

    pub fn variables(&self) -> MoocletResult<Vec<Variable>> {
        Ok(self.store.variables()?)
    }

    fn insert(
        &self,
        variable: &Variable,
        owner: Option<RecordId>,
        value: f64,
        user: Option<RecordId>,
    ) -> MoocletResult<Value> {
        let value = validate_measurement(value)?;
        Ok(self.store.insert_value(NewValue {
            variable_id: variable.id,
            owner_id: owner,
            user_id: user,
            value,
        })?)
    }

    /// Appends an observation. Never overwrites history.
    pub fn record(
        &self,
        variable: &Variable,
        owner: RecordId,
        value: f64,
        user: Option<RecordId>,
    ) -> MoocletResult<Value> {
        self.insert(variable, Some(owner), value, user)
    }

    /// Appends an observation that has no owning entity.
    pub fn record_unowned(
        &self,
        variable: &Variable,
        value: f64,
        user: Option<RecordId>,
    ) -> MoocletResult<Value> {
        self.insert(variable, None, value, user)
    }

    /// The acting user as it participates in the key of `variable`.
    const fn key_user(variable: &Variable, user: Option<RecordId>) -> Option<RecordId> {
        if variable.is_user_variable {
            user
        } else {
            None
        }
    }

    /// Values matching the (owner, user) key, in creation order.
    ///
    /// For user variables the acting user is part of the key; for other
    /// variables it is ignored.
    pub fn history(
        &self,
        variable: &Variable,
        owner: Option<RecordId>,
        user: Option<RecordId>,
    ) -> MoocletResult<Vec<Value>> {
        let values = self.store.values_for_owner(variable.id, owner)?;
        if !variable.is_user_variable {
            return Ok(values);
        }
        Ok(values.into_iter().filter(|v| v.user_id == user).collect())
    }

    /// Every value of `variable` owned by `owner`, across all users.
    pub fn values_for(
        &self,
        variable: &Variable,
        owner: Option<RecordId>,
    ) -> MoocletResult<Vec<Value>> {
        Ok(self.store.values_for_owner(variable.id, owner)?)
    }

    /// The most recently created value for the key, if any.
    pub fn current(
        &self,
        variable: &Variable,
        owner: Option<RecordId>,
        user: Option<RecordId>,
    ) -> MoocletResult<Option<Value>> {
        Ok(self.history(variable, owner, user)?.pop())
    }

    /// Scalar of [`current`](Self::current).
    pub fn current_value(
        &self,
        variable: &Variable,
        owner: Option<RecordId>,
        user: Option<RecordId>,
    ) -> MoocletResult<Option<f64>> {
        Ok(self.current(variable, owner, user)?.map(|v| v.value))
    }

    /// Overwrites the current value for the key in place, or appends the
    /// first one.
    pub fn upsert_current(
        &self,
        variable: &Variable,
        owner: Option<RecordId>,
        value: f64,
        user: Option<RecordId>,
    ) -> MoocletResult<Value> {
        let value = validate_measurement(value)?;
        let user = Self::key_user(variable, user);
        match self.current(variable, owner, user)? {
            Some(existing) => Ok(self.store.update_value(existing.id, value)?),
            None => self.insert(variable, owner, value, user),
        }
    }

    /// Writes according to the variable's [`RecordMode`].
    pub fn write(
        &self,
        variable: &Variable,
        owner: Option<RecordId>,
        value: f64,
        user: Option<RecordId>,
    ) -> MoocletResult<Value> {
        match variable.mode {
            RecordMode::Log => self.insert(variable, owner, value, user),
            RecordMode::Aggregate => self.upsert_current(variable, owner, value, user),
        }
    }

    /// Values of `variable` narrowed by every supported dimension present
    /// in `context`.
    ///
    /// Quiz, question, answer, mooclet and version entries match values
    /// whose owner lies in that entity's subtree; a user entry matches the
    /// acting user of user variables and is ignored for the rest. Other
    /// entries are ignored.
    pub fn query(&self, variable: &Variable, context: &Context) -> MoocletResult<Vec<Value>> {
        let mut cache = LineageCache::new();
        self.query_with(variable, context, &mut cache)
    }

    /// [`query`](Self::query) over every variable; variables with no
    /// matching values are omitted.
    pub fn query_all(&self, context: &Context) -> MoocletResult<Vec<(Variable, Vec<Value>)>> {
        let mut cache = LineageCache::new();
        let mut out = Vec::new();
        for variable in self.store.variables()? {
            let values = self.query_with(&variable, context, &mut cache)?;
            if !values.is_empty() {
                out.push((variable, values));
            }
        }
        Ok(out)
    }

    fn query_with(
        &self,
        variable: &Variable,
        context: &Context,
        cache: &mut LineageCache,
    ) -> MoocletResult<Vec<Value>> {
        let dimensions = context.ownership_dimensions();
        let user = context.user_id();

        let mut values = self.store.values_for_variable(variable.id)?;
        if let Some(user) = Self::key_user(variable, user) {
            values.retain(|v| v.user_id == Some(user));
        }
        if dimensions.is_empty() {
            return Ok(values);
        }
        let Some(scope) = variable.scope.clone() else {
            return Ok(Vec::new());
        };

        let mut matched = Vec::with_capacity(values.len());
        for value in values {
            let Some(owner_id) = value.owner_id else {
                continue;
            };
            let owner = OwnerRef::new(scope.clone(), owner_id);
            if !cache.contains_key(&owner) {
                let lineage = self.resolver.lineage(&owner)?;
                if lineage.is_empty() {
                    warn!(variable = %variable.name, %owner, value_id = %value.id, "value owner no longer exists");
                }
                cache.insert(owner.clone(), lineage);
            }
            let lineage = cache.get(&owner).map(Vec::as_slice).unwrap_or_default();
            if dimensions.iter().all(|d| lineage.contains(d)) {
                matched.push(value);
            }
        }
        Ok(matched)
    }
}
