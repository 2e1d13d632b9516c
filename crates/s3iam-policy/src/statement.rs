use crate::action::ActionList;
use crate::principal::Principal;
use crate::resource::ResourceList;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// One allow/deny rule binding principals to actions on resources.
///
/// Statements written by the provisioning engine always carry `Principal`, `Action` and
/// `Resource`. Statements written by someone else may use the `NotPrincipal`, `NotAction` and
/// `NotResource` forms instead, and may carry `Sid` and `Condition`; all of them are kept
/// verbatim when a document is edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    pub effect: Effect,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_principal: Option<Principal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionList>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_action: Option<ActionList>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceList>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_resource: Option<ResourceList>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<IndexMap<String, serde_json::Value>>,
}

impl Statement {
    /// A statement with the positive `Principal`, `Action` and `Resource` forms.
    #[must_use]
    pub fn new(effect: Effect, principal: Principal, actions: ActionList, resource: ResourceList) -> Self {
        Self {
            sid: None,
            effect,
            principal: Some(principal),
            not_principal: None,
            action: Some(actions),
            not_action: None,
            resource: Some(resource),
            not_resource: None,
            condition: None,
        }
    }

    /// Allows `actions` on `bucket` and its objects to the identity `principal_id`.
    #[must_use]
    pub fn allow(principal_id: impl Into<String>, actions: ActionList, bucket: &str) -> Self {
        Self::new(Effect::Allow, Principal::aws(principal_id), actions, ResourceList::bucket(bucket))
    }

    /// Returns `true` if the statement's `Principal` names `principal_id` as an IAM identity.
    ///
    /// `NotPrincipal` never counts as membership.
    #[must_use]
    pub fn contains_principal(&self, principal_id: &str) -> bool {
        self.principal.as_ref().is_some_and(|p| p.contains_aws(principal_id))
    }

    /// Drops `principal_id` from the statement's principals.
    ///
    /// Returns `None` if the statement no longer names anyone.
    #[must_use]
    pub fn without_principal(self, principal_id: &str) -> Option<Self> {
        if !self.contains_principal(principal_id) {
            return Some(self);
        }
        let principal = self.principal.and_then(|p| p.without_aws(principal_id))?;
        Some(Self {
            principal: Some(principal),
            ..self
        })
    }
}
