//! Decision point records: mooclets, their versions, policies and types.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityTag, OwnerRef, RecordId};

/// A decision point offering several content versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mooclet {
    pub id: RecordId,
    pub name: String,
    /// Name of the [`MoocletType`] this mooclet is an instance of.
    pub type_name: String,
    /// Policy bound to this decision point.
    pub policy_id: RecordId,
    /// Entity this mooclet is attached under, as declared by its type.
    #[serde(default)]
    pub parent: Option<OwnerRef>,
}

impl Mooclet {
    /// Creates a mooclet without a parent attachment.
    #[must_use]
    pub fn new(
        id: RecordId,
        name: impl Into<String>,
        type_name: impl Into<String>,
        policy_id: RecordId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            type_name: type_name.into(),
            policy_id,
            parent: None,
        }
    }

    /// Attaches the mooclet under `parent`.
    #[must_use]
    pub fn attached_to(mut self, parent: OwnerRef) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// One candidate outcome of a mooclet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub id: RecordId,
    pub mooclet_id: RecordId,
    pub name: String,
    /// Content payload shown when this version is chosen.
    #[serde(default)]
    pub content: Option<OwnerRef>,
}

impl Version {
    #[must_use]
    pub fn new(id: RecordId, mooclet_id: RecordId, name: impl Into<String>) -> Self {
        Self {
            id,
            mooclet_id,
            name: name.into(),
            content: None,
        }
    }

    /// Sets the explanation shown by this version.
    #[must_use]
    pub fn with_explanation(mut self, explanation_id: RecordId) -> Self {
        self.content = Some(OwnerRef::new(EntityTag::Explanation, explanation_id));
        self
    }

    /// Id of the explanation payload, if the content is an explanation.
    #[must_use]
    pub fn explanation_id(&self) -> Option<RecordId> {
        match &self.content {
            Some(OwnerRef { tag: EntityTag::Explanation, id }) => Some(*id),
            _ => None,
        }
    }
}

/// A named selection strategy plus the variables it is configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub id: RecordId,
    /// Strategy name looked up in the policy registry.
    pub name: String,
    /// Names of the parameter/state variables this policy reads.
    #[serde(default)]
    pub variables: Vec<String>,
}

impl Policy {
    #[must_use]
    pub fn new(id: RecordId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            variables: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables = variables.into_iter().map(Into::into).collect();
        self
    }
}

/// Declares which kind of entity mooclets of this type attach under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoocletType {
    pub name: String,
    #[serde(default)]
    pub parent_tag: Option<EntityTag>,
}

impl MoocletType {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_tag: Option<EntityTag>) -> Self {
        Self {
            name: name.into(),
            parent_tag,
        }
    }

    /// The type used for explanations shown after an answer.
    #[must_use]
    pub fn explanation() -> Self {
        Self::new("explanation", Some(EntityTag::Answer))
    }
}
