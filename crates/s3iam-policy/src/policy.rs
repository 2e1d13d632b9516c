use crate::error::PolicyError;
use crate::serde_util::one_or_many;
use crate::statement::Statement;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The policy language version written into every document.
pub const POLICY_VERSION: &str = "2012-10-17";

fn default_version() -> String {
    POLICY_VERSION.to_owned()
}

/// A bucket policy document.
///
/// Statement order carries no meaning for evaluation, but it is preserved across edits so that
/// unrelated statements stay untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Policy {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(deserialize_with = "one_or_many")]
    pub statement: Vec<Statement>,
}

impl Default for Policy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy {
    /// An empty document: current version, no statements.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: default_version(),
            id: None,
            statement: Vec::new(),
        }
    }

    /// Parses a document from its JSON bytes.
    ///
    /// # Errors
    /// Returns [`PolicyError::Malformed`] if the bytes are not a valid policy document.
    pub fn parse(raw: &[u8]) -> Result<Self, PolicyError> {
        serde_json::from_slice(raw).map_err(PolicyError::Malformed)
    }

    /// Serializes the document as indented JSON.
    ///
    /// # Errors
    /// Returns [`PolicyError::Serialize`] if encoding fails.
    pub fn to_json(&self) -> Result<String, PolicyError> {
        serde_json::to_string_pretty(self).map_err(PolicyError::Serialize)
    }

    /// Returns `true` if the document has no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statement.is_empty()
    }

    /// Appends a statement.
    pub fn push(&mut self, statement: Statement) {
        self.statement.push(statement);
    }

    /// Returns `true` if any statement names `principal_id` as an IAM identity.
    #[must_use]
    pub fn contains_principal(&self, principal_id: &str) -> bool {
        self.statement.iter().any(|s| s.contains_principal(principal_id))
    }

    /// Returns a copy of the document with `principal_id` dropped from every statement.
    ///
    /// Statements left without any principal are removed entirely. Everything else, including
    /// statement order, is kept.
    #[must_use]
    pub fn without_principal(&self, principal_id: &str) -> Self {
        let statement = self
            .statement
            .iter()
            .cloned()
            .filter_map(|s| s.without_principal(principal_id))
            .collect();
        Self {
            version: self.version.clone(),
            id: self.id.clone(),
            statement,
        }
    }
}

impl FromStr for Policy {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}
