//! Decision and query context.
//!
//! A [`Context`] maps entity tags to the concrete records a request is
//! about (the mooclet being decided, the answer a student chose, the acting
//! user). It is built by the caller, never persisted, and read by the
//! decision engine, strategies and measurement queries.

use std::collections::BTreeMap;

use crate::decision::{Mooclet, Version};
use crate::entity::{Answer, EntityRecord, EntityTag, OwnerRef, RecordId};

/// Entity tag to record mapping, one record per tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    entries: BTreeMap<EntityTag, EntityRecord>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `record` under its own tag.
    ///
    /// # Examples
    ///
    /// ```
    /// use mooclet::{Context, EntityTag, Mooclet, User};
    ///
    /// let ctx = Context::new()
    ///     .with(Mooclet::new(1, "why", "explanation", 1))
    ///     .with(User { id: 7, name: "ada".to_string() });
    /// assert_eq!(ctx.user_id(), Some(7));
    /// assert!(ctx.contains(&EntityTag::Mooclet));
    /// ```
    #[must_use]
    pub fn with(mut self, record: impl Into<EntityRecord>) -> Self {
        self.insert(record);
        self
    }

    /// Adds `record`, returning the record it replaced.
    pub fn insert(&mut self, record: impl Into<EntityRecord>) -> Option<EntityRecord> {
        let record = record.into();
        self.entries.insert(record.tag(), record)
    }

    #[must_use]
    pub fn get(&self, tag: &EntityTag) -> Option<&EntityRecord> {
        self.entries.get(tag)
    }

    #[must_use]
    pub fn contains(&self, tag: &EntityTag) -> bool {
        self.entries.contains_key(tag)
    }

    #[must_use]
    pub fn mooclet(&self) -> Option<&Mooclet> {
        match self.entries.get(&EntityTag::Mooclet) {
            Some(EntityRecord::Mooclet(m)) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub fn answer(&self) -> Option<&Answer> {
        match self.entries.get(&EntityTag::Answer) {
            Some(EntityRecord::Answer(a)) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn version(&self) -> Option<&Version> {
        match self.entries.get(&EntityTag::Version) {
            Some(EntityRecord::Version(v)) => Some(v),
            _ => None,
        }
    }

    /// Id of the acting user, if present.
    #[must_use]
    pub fn user_id(&self) -> Option<RecordId> {
        self.entries.get(&EntityTag::User).map(EntityRecord::id)
    }

    /// Entries that narrow a measurement query by ownership.
    #[must_use]
    pub fn ownership_dimensions(&self) -> Vec<OwnerRef> {
        self.entries
            .iter()
            .filter(|(tag, _)| tag.is_ownership_dimension())
            .map(|(_, record)| record.owner_ref())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityTag, &EntityRecord)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Course, Question};

    #[test]
    fn later_record_of_same_tag_replaces_earlier() {
        let mut ctx = Context::new().with(Version::new(1, 1, "A"));
        let replaced = ctx.insert(Version::new(2, 1, "B"));
        assert_eq!(replaced.map(|r| r.id()), Some(1));
        assert_eq!(ctx.version().map(|v| v.id), Some(2));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn only_hierarchy_tags_are_dimensions() {
        let ctx = Context::new()
            .with(Course {
                id: 1,
                context: "lti-ctx".to_string(),
                name: "Calculus".to_string(),
            })
            .with(Question {
                id: 4,
                quiz_id: 2,
                text: "?".to_string(),
            });
        assert_eq!(
            ctx.ownership_dimensions(),
            vec![OwnerRef::new(EntityTag::Question, 4)]
        );
        assert!(ctx.mooclet().is_none());
    }
}
