//! Entity tags, owner references and the content records of a quiz.
//!
//! Every measurement is owned by some entity. Rather than a generic foreign
//! key resolved by reflection, an owner is a tagged reference: an
//! [`EntityTag`] naming the kind of record plus a numeric id that is only
//! unique within that kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::decision::{Mooclet, Policy, Version};
use crate::error::ValidationError;

/// Numeric record identifier, unique per [`EntityTag`].
pub type RecordId = u64;

/// Kind of an owning entity.
///
/// # Examples
///
/// ```
/// use mooclet::EntityTag;
///
/// let tag: EntityTag = "answer".parse().unwrap();
/// assert_eq!(tag, EntityTag::Answer);
/// assert_eq!(tag.to_string(), "answer");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityTag {
    Course,
    Quiz,
    Question,
    Answer,
    Explanation,
    Mooclet,
    Version,
    Policy,
    User,
    /// An entity kind registered by an embedding application.
    Custom(String),
}

impl EntityTag {
    /// Returns the stable lowercase name of this tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Course => "course",
            Self::Quiz => "quiz",
            Self::Question => "question",
            Self::Answer => "answer",
            Self::Explanation => "explanation",
            Self::Mooclet => "mooclet",
            Self::Version => "version",
            Self::Policy => "policy",
            Self::User => "user",
            Self::Custom(name) => name,
        }
    }

    /// Tags that participate in the quiz ownership hierarchy and can
    /// narrow a measurement query.
    #[must_use]
    pub const fn is_ownership_dimension(&self) -> bool {
        matches!(
            self,
            Self::Quiz | Self::Question | Self::Answer | Self::Mooclet | Self::Version
        )
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityTag {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = match s.trim().to_ascii_lowercase().as_str() {
            "course" => Self::Course,
            "quiz" => Self::Quiz,
            "question" => Self::Question,
            "answer" => Self::Answer,
            "explanation" => Self::Explanation,
            "mooclet" => Self::Mooclet,
            "version" => Self::Version,
            "policy" => Self::Policy,
            "user" => Self::User,
            "" => {
                return Err(ValidationError::UnknownEntityTag { raw: s.to_string() });
            }
            other => Self::Custom(other.to_string()),
        };
        Ok(tag)
    }
}

/// Tagged reference to an owning entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub tag: EntityTag,
    pub id: RecordId,
}

impl OwnerRef {
    #[must_use]
    pub const fn new(tag: EntityTag, id: RecordId) -> Self {
        Self { tag, id }
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag, self.id)
    }
}

/// An LMS course a quiz may belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: RecordId,
    /// LMS context identifier.
    pub context: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub course_id: Option<RecordId>,
    /// Instructor that created the quiz.
    #[serde(default)]
    pub owner_user_id: Option<RecordId>,
    /// Externally hosted survey URL, if one was provisioned.
    #[serde(default)]
    pub url: Option<String>,
}

impl Quiz {
    #[must_use]
    pub fn new(id: RecordId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            course_id: None,
            owner_user_id: None,
            url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: RecordId,
    pub quiz_id: RecordId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: RecordId,
    pub question_id: RecordId,
    pub text: String,
    #[serde(default)]
    pub correct: bool,
    /// Display position within the question (answer choices are 1-based
    /// positions in this ordering).
    pub order: u32,
    /// Mooclet choosing the explanation shown after this answer.
    #[serde(default)]
    pub mooclet_explanation: Option<RecordId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub id: RecordId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    pub name: String,
}

/// A concrete record of any kind, as returned by the association resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", content = "record", rename_all = "snake_case")]
pub enum EntityRecord {
    Course(Course),
    Quiz(Quiz),
    Question(Question),
    Answer(Answer),
    Explanation(Explanation),
    Mooclet(Mooclet),
    Version(Version),
    Policy(Policy),
    User(User),
    /// Record of an application-defined kind.
    Other {
        tag: String,
        id: RecordId,
        #[serde(default)]
        parent: Option<OwnerRef>,
    },
}

impl EntityRecord {
    /// The tag implied by this record.
    #[must_use]
    pub fn tag(&self) -> EntityTag {
        match self {
            Self::Course(_) => EntityTag::Course,
            Self::Quiz(_) => EntityTag::Quiz,
            Self::Question(_) => EntityTag::Question,
            Self::Answer(_) => EntityTag::Answer,
            Self::Explanation(_) => EntityTag::Explanation,
            Self::Mooclet(_) => EntityTag::Mooclet,
            Self::Version(_) => EntityTag::Version,
            Self::Policy(_) => EntityTag::Policy,
            Self::User(_) => EntityTag::User,
            Self::Other { tag, .. } => EntityTag::Custom(tag.clone()),
        }
    }

    #[must_use]
    pub fn id(&self) -> RecordId {
        match self {
            Self::Course(r) => r.id,
            Self::Quiz(r) => r.id,
            Self::Question(r) => r.id,
            Self::Answer(r) => r.id,
            Self::Explanation(r) => r.id,
            Self::Mooclet(r) => r.id,
            Self::Version(r) => r.id,
            Self::Policy(r) => r.id,
            Self::User(r) => r.id,
            Self::Other { id, .. } => *id,
        }
    }

    #[must_use]
    pub fn owner_ref(&self) -> OwnerRef {
        OwnerRef::new(self.tag(), self.id())
    }

    /// The record this one hangs under in the quiz hierarchy.
    ///
    /// Version -> Mooclet -> (declared parent, usually an Answer) ->
    /// Question -> Quiz -> Course.
    #[must_use]
    pub fn parent(&self) -> Option<OwnerRef> {
        match self {
            Self::Quiz(q) => q.course_id.map(|id| OwnerRef::new(EntityTag::Course, id)),
            Self::Question(q) => Some(OwnerRef::new(EntityTag::Quiz, q.quiz_id)),
            Self::Answer(a) => Some(OwnerRef::new(EntityTag::Question, a.question_id)),
            Self::Mooclet(m) => m.parent.clone(),
            Self::Version(v) => Some(OwnerRef::new(EntityTag::Mooclet, v.mooclet_id)),
            Self::Other { parent, .. } => parent.clone(),
            Self::Course(_) | Self::Explanation(_) | Self::Policy(_) | Self::User(_) => None,
        }
    }
}

macro_rules! impl_into_record {
    ($($ty:ident),* $(,)?) => {
        $(
            impl From<$ty> for EntityRecord {
                fn from(record: $ty) -> Self {
                    Self::$ty(record)
                }
            }
        )*
    };
}

impl_into_record!(Course, Quiz, Question, Answer, Explanation, Mooclet, Version, Policy, User);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trips_through_strings() {
        for tag in [
            EntityTag::Course,
            EntityTag::Quiz,
            EntityTag::Question,
            EntityTag::Answer,
            EntityTag::Explanation,
            EntityTag::Mooclet,
            EntityTag::Version,
            EntityTag::Policy,
            EntityTag::User,
        ] {
            let parsed: EntityTag = tag.as_str().parse().unwrap();
            assert_eq!(parsed, tag);
        }
    }

    #[test]
    fn unknown_tag_becomes_custom() {
        let tag: EntityTag = "Cohort".parse().unwrap();
        assert_eq!(tag, EntityTag::Custom("cohort".to_string()));
        assert!(!tag.is_ownership_dimension());
    }

    #[test]
    fn empty_tag_is_rejected() {
        assert!("  ".parse::<EntityTag>().is_err());
    }

    #[test]
    fn tag_serializes_snake_case() {
        let json = serde_json::to_string(&EntityTag::Question).unwrap();
        assert_eq!(json, "\"question\"");
    }

    #[test]
    fn answer_parent_is_its_question() {
        let answer = EntityRecord::Answer(Answer {
            id: 3,
            question_id: 9,
            text: "42".to_string(),
            correct: true,
            order: 1,
            mooclet_explanation: None,
        });
        assert_eq!(answer.tag(), EntityTag::Answer);
        assert_eq!(answer.parent(), Some(OwnerRef::new(EntityTag::Question, 9)));
    }

    #[test]
    fn owner_ref_display() {
        assert_eq!(OwnerRef::new(EntityTag::Version, 12).to_string(), "version:12");
    }
}
