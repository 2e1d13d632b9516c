use crate::serde_util::OneOrMany;

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// The wildcard action literal.
pub const ANY_ACTION: &str = "s3:*";

/// The `Action` field of a statement.
///
/// + `"s3:*"` is [`ActionList::Any`].
/// + `["s3:GetObject", ...]` is [`ActionList::Set`].
///
/// A single action written as a bare string is accepted and normalized to a one-element set.
/// Repeated names collapse to their first occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionList {
    /// Every S3 action.
    Any,
    /// An ordered set of action names.
    Set(IndexSet<String>),
}

impl ActionList {
    /// Returns `true` if the list names no action at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            ActionList::Any => false,
            ActionList::Set(set) => set.is_empty(),
        }
    }

    /// Returns `true` if `action` is covered by this list.
    #[must_use]
    pub fn contains(&self, action: &str) -> bool {
        match self {
            ActionList::Any => true,
            ActionList::Set(set) => set.contains(action),
        }
    }

    /// Iterates over the explicit action names. The wildcard yields `"s3:*"` once.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let (any, set) = match self {
            ActionList::Any => (Some(ANY_ACTION), None),
            ActionList::Set(set) => (None, Some(set)),
        };
        any.into_iter().chain(set.into_iter().flatten().map(String::as_str))
    }
}

impl<S: Into<String>> FromIterator<S> for ActionList {
    /// Collects action names. A list containing `"s3:*"` collapses to [`ActionList::Any`].
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let set: IndexSet<String> = iter.into_iter().map(Into::into).collect();
        if set.contains(ANY_ACTION) {
            ActionList::Any
        } else {
            ActionList::Set(set)
        }
    }
}

impl fmt::Display for ActionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionList::Any => f.write_str(ANY_ACTION),
            ActionList::Set(set) => {
                for (i, action) in set.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    f.write_str(action)?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for ActionList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ActionList::Any => serializer.serialize_str(ANY_ACTION),
            ActionList::Set(set) => set.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ActionList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match OneOrMany::<String>::deserialize(deserializer)? {
            OneOrMany::One(s) if s == ANY_ACTION => Ok(ActionList::Any),
            OneOrMany::One(s) if s.is_empty() => Err(de::Error::custom("empty action name")),
            OneOrMany::One(s) => Ok(ActionList::Set(IndexSet::from([s]))),
            OneOrMany::Many(v) => Ok(ActionList::Set(v.into_iter().collect())),
        }
    }
}
