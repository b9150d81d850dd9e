//! Generic association resolver.
//!
//! Maps an [`EntityTag`] to the repository that can dereference ids of
//! that kind, so a tagged [`OwnerRef`] can be turned into a concrete record
//! without knowing its type up front.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::entity::{EntityRecord, EntityTag, OwnerRef};
use crate::error::{ExecutionError, MoocletError, MoocletResult};
use crate::storage::{lock_err, StorageError};

use super::repository::EntityRepository;

/// Longest ancestor chain [`AssociationResolver::lineage`] will follow.
const MAX_LINEAGE_HOPS: usize = 32;

/// Registry of entity repositories keyed by tag.
#[derive(Default)]
pub struct AssociationResolver {
    repositories: RwLock<HashMap<EntityTag, Arc<dyn EntityRepository>>>,
}

impl std::fmt::Debug for AssociationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tags: Vec<EntityTag> = self.tags().unwrap_or_default();
        f.debug_struct("AssociationResolver").field("tags", &tags).finish()
    }
}

impl AssociationResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `repository` under its tag, replacing any previous one.
    pub fn register(
        &self,
        repository: Arc<dyn EntityRepository>,
    ) -> Result<Option<Arc<dyn EntityRepository>>, StorageError> {
        let mut repos = self
            .repositories
            .write()
            .map_err(|_| lock_err("resolver.register"))?;
        Ok(repos.insert(repository.tag(), repository))
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Result<Vec<EntityTag>, StorageError> {
        let repos = self
            .repositories
            .read()
            .map_err(|_| lock_err("resolver.tags"))?;
        let mut tags: Vec<EntityTag> = repos.keys().cloned().collect();
        tags.sort();
        Ok(tags)
    }

    fn repository(&self, tag: &EntityTag) -> Result<Option<Arc<dyn EntityRepository>>, StorageError> {
        let repos = self
            .repositories
            .read()
            .map_err(|_| lock_err("resolver.lookup"))?;
        Ok(repos.get(tag).cloned())
    }

    /// Dereferences `owner`; `None` if the tag is unregistered or the id
    /// does not exist.
    pub fn find(&self, owner: &OwnerRef) -> MoocletResult<Option<EntityRecord>> {
        match self.repository(&owner.tag)? {
            Some(repo) => Ok(repo.fetch(owner.id)?),
            None => Ok(None),
        }
    }

    /// Dereferences `owner` or fails with `NotFound`.
    pub fn resolve(&self, owner: &OwnerRef) -> MoocletResult<EntityRecord> {
        self.find(owner)?
            .ok_or_else(|| ExecutionError::not_found(owner.tag.as_str(), owner.id).into())
    }

    /// `owner` followed by its ancestors in the quiz hierarchy.
    ///
    /// Empty when `owner` itself does not resolve. A dangling ancestor ends
    /// the chain.
    pub fn lineage(&self, owner: &OwnerRef) -> MoocletResult<Vec<OwnerRef>> {
        let mut chain = Vec::new();
        let mut next = Some(owner.clone());
        while let Some(current) = next {
            let Some(record) = self.find(&current)? else {
                break;
            };
            if chain.len() == MAX_LINEAGE_HOPS {
                return Err(MoocletError::internal(format!(
                    "lineage of {owner} exceeded {MAX_LINEAGE_HOPS} hops"
                )));
            }
            chain.push(current);
            next = record.parent();
        }
        Ok(chain)
    }
}
