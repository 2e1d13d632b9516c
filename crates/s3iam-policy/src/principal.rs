use crate::serde_util::OneOrMany;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// The wildcard principal literal.
pub const ANY_PRINCIPAL: &str = "*";

/// The principal-map key for IAM identities.
pub const AWS_PRINCIPAL_KEY: &str = "AWS";

/// The `Principal` field of a statement.
///
/// + `"*"` is [`Principal::Any`].
/// + `{"AWS": ["AIDA..."], ...}` is [`Principal::Specified`], keyed by principal kind.
///
/// Identity references are the backend's resolved user ids, never display names.
/// Each kind holds a set: an id listed twice in a parsed document is kept once and written
/// back once, which does not change how the statement evaluates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Everyone.
    Any,
    /// Identity references grouped by kind (`AWS`, `Service`, ...).
    Specified(IndexMap<String, IndexSet<String>>),
}

impl Principal {
    /// A principal naming exactly one IAM identity.
    #[must_use]
    pub fn aws(id: impl Into<String>) -> Self {
        let ids = IndexSet::from([id.into()]);
        Principal::Specified(IndexMap::from([(AWS_PRINCIPAL_KEY.to_owned(), ids)]))
    }

    /// Returns the IAM identity references, if any.
    #[must_use]
    pub fn aws_ids(&self) -> Option<&IndexSet<String>> {
        match self {
            Principal::Any => None,
            Principal::Specified(map) => map.get(AWS_PRINCIPAL_KEY),
        }
    }

    /// Returns `true` if `id` is listed as an IAM identity.
    ///
    /// The wildcard does not count as membership.
    #[must_use]
    pub fn contains_aws(&self, id: &str) -> bool {
        self.aws_ids().is_some_and(|ids| ids.contains(id))
    }

    /// Drops `id` from the IAM identities.
    ///
    /// Returns `None` when nothing is left to name, so the caller can drop the whole statement.
    #[must_use]
    pub fn without_aws(self, id: &str) -> Option<Self> {
        match self {
            Principal::Any => Some(Principal::Any),
            Principal::Specified(mut map) => {
                if let Some(ids) = map.get_mut(AWS_PRINCIPAL_KEY) {
                    ids.shift_remove(id);
                    if ids.is_empty() {
                        map.shift_remove(AWS_PRINCIPAL_KEY);
                    }
                }
                if map.is_empty() { None } else { Some(Principal::Specified(map)) }
            }
        }
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Principal::Any => serializer.serialize_str(ANY_PRINCIPAL),
            Principal::Specified(map) => map.serialize(serializer),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PrincipalRepr {
    Literal(String),
    Map(IndexMap<String, OneOrMany<String>>),
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match PrincipalRepr::deserialize(deserializer)? {
            PrincipalRepr::Literal(s) if s == ANY_PRINCIPAL => Ok(Principal::Any),
            PrincipalRepr::Literal(s) => Err(de::Error::custom(format_args!("invalid principal literal: {s:?}"))),
            PrincipalRepr::Map(map) => {
                let map = map
                    .into_iter()
                    .map(|(kind, ids)| (kind, ids.into_vec().into_iter().collect()))
                    .collect();
                Ok(Principal::Specified(map))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard() {
        let p: Principal = serde_json::from_str(r#""*""#).unwrap();
        assert_eq!(p, Principal::Any);
        assert_eq!(serde_json::to_string(&p).unwrap(), r#""*""#);
        assert!(!p.contains_aws("AIDAALICE"));
        assert!(serde_json::from_str::<Principal>(r#""alice""#).is_err());
    }

    #[test]
    fn aws_list() {
        let p: Principal = serde_json::from_str(r#"{"AWS":["AIDAALICE","AIDABOB"]}"#).unwrap();
        assert!(p.contains_aws("AIDAALICE"));
        assert!(p.contains_aws("AIDABOB"));
        assert!(!p.contains_aws("alice"));
        assert_eq!(serde_json::to_string(&p).unwrap(), r#"{"AWS":["AIDAALICE","AIDABOB"]}"#);
    }

    #[test]
    fn aws_single_string() {
        let p: Principal = serde_json::from_str(r#"{"AWS":"AIDAALICE"}"#).unwrap();
        assert_eq!(p, Principal::aws("AIDAALICE"));
        assert_eq!(serde_json::to_string(&p).unwrap(), r#"{"AWS":["AIDAALICE"]}"#);
    }

    #[test]
    fn without_last_aws_id() {
        assert_eq!(Principal::aws("AIDAALICE").without_aws("AIDAALICE"), None);
        assert_eq!(Principal::Any.without_aws("AIDAALICE"), Some(Principal::Any));
    }

    #[test]
    fn without_keeps_other_kinds() {
        let p: Principal = serde_json::from_str(r#"{"AWS":["AIDAALICE"],"Service":["logging.s3.amazonaws.com"]}"#).unwrap();
        let p = p.without_aws("AIDAALICE").unwrap();
        assert_eq!(serde_json::to_string(&p).unwrap(), r#"{"Service":["logging.s3.amazonaws.com"]}"#);
    }

    #[test]
    fn without_keeps_other_ids() {
        let p: Principal = serde_json::from_str(r#"{"AWS":["AIDAALICE","AIDABOB","AIDACAROL"]}"#).unwrap();
        let p = p.without_aws("AIDABOB").unwrap();
        assert_eq!(serde_json::to_string(&p).unwrap(), r#"{"AWS":["AIDAALICE","AIDACAROL"]}"#);
    }
}
