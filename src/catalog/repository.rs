//! Typed in-memory repositories for catalog records.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::decision::{Mooclet, Policy, Version};
use crate::entity::{Answer, Course, EntityRecord, EntityTag, Explanation, Question, Quiz, RecordId, User};
use crate::storage::{lock_err, StorageError};

/// A record kind that can live in a typed repository.
pub trait CatalogRecord: Clone + Send + Sync + Into<EntityRecord> + 'static {
    /// Tag shared by every record of this kind.
    fn tag() -> EntityTag;

    fn record_id(&self) -> RecordId;
}

macro_rules! impl_catalog_record {
    ($($ty:ident => $tag:ident),* $(,)?) => {
        $(
            impl CatalogRecord for $ty {
                fn tag() -> EntityTag {
                    EntityTag::$tag
                }

                fn record_id(&self) -> RecordId {
                    self.id
                }
            }
        )*
    };
}

impl_catalog_record!(
    Course => Course,
    Quiz => Quiz,
    Question => Question,
    Answer => Answer,
    Explanation => Explanation,
    Mooclet => Mooclet,
    Version => Version,
    Policy => Policy,
    User => User,
);

/// Dereferences ids of one entity kind.
pub trait EntityRepository: Send + Sync {
    fn tag(&self) -> EntityTag;

    /// Fetches a record by id. Read-only.
    fn fetch(&self, id: RecordId) -> Result<Option<EntityRecord>, StorageError>;
}

/// Thread-safe repository keyed by record id.
#[derive(Debug)]
pub struct InMemoryRepository<T> {
    records: RwLock<BTreeMap<RecordId, T>>,
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T: CatalogRecord> InMemoryRepository<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new record. Fails with `DuplicateKey` if the id is taken.
    pub fn insert(&self, record: T) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(|_| lock_err("catalog.insert"))?;
        let id = record.record_id();
        if records.contains_key(&id) {
            return Err(StorageError::DuplicateKey(format!("{}:{id}", T::tag())));
        }
        records.insert(id, record);
        Ok(())
    }

    /// Inserts or replaces a record, returning the previous one.
    pub fn upsert(&self, record: T) -> Result<Option<T>, StorageError> {
        let mut records = self.records.write().map_err(|_| lock_err("catalog.upsert"))?;
        Ok(records.insert(record.record_id(), record))
    }

    pub fn get(&self, id: RecordId) -> Result<Option<T>, StorageError> {
        let records = self.records.read().map_err(|_| lock_err("catalog.get"))?;
        Ok(records.get(&id).cloned())
    }

    /// All records, ascending by id.
    pub fn list(&self) -> Result<Vec<T>, StorageError> {
        let records = self.records.read().map_err(|_| lock_err("catalog.list"))?;
        Ok(records.values().cloned().collect())
    }

    /// Records matching `predicate`, ascending by id.
    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Result<Vec<T>, StorageError> {
        let records = self.records.read().map_err(|_| lock_err("catalog.filter"))?;
        Ok(records.values().filter(|r| predicate(r)).cloned().collect())
    }

    /// Applies `f` to the stored record in place.
    pub fn modify<R>(&self, id: RecordId, f: impl FnOnce(&mut T) -> R) -> Result<R, StorageError> {
        let mut records = self.records.write().map_err(|_| lock_err("catalog.modify"))?;
        let record = records.get_mut(&id).ok_or_else(|| StorageError::NotFound {
            kind: T::tag().to_string(),
            key: id.to_string(),
        })?;
        Ok(f(record))
    }

    pub fn len(&self) -> Result<usize, StorageError> {
        let records = self.records.read().map_err(|_| lock_err("catalog.len"))?;
        Ok(records.len())
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl<T: CatalogRecord> EntityRepository for InMemoryRepository<T> {
    fn tag(&self) -> EntityTag {
        T::tag()
    }

    fn fetch(&self, id: RecordId) -> Result<Option<EntityRecord>, StorageError> {
        Ok(self.get(id)?.map(Into::into))
    }
}
