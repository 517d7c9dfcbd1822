//! The policy AST consumed by the evaluator.
//!
//! Documents are parsed and validated upstream; these types only carry the
//! shape evaluation needs. See [`crate::loader`] for a JSON adapter.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, Display, AsRefStr,
)]
pub enum Effect {
    Allow,
    Deny,
}

/// Which kind of policy a statement came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PolicyKind {
    Identity,
    Resource,
    PermissionBoundary,
    EndpointPolicy,
    ServiceControlPolicy,
    ResourceControlPolicy,
}

impl PolicyKind {
    /// Policy kinds whose statements must carry `Resource` or `NotResource`.
    pub fn requires_resource(&self) -> bool {
        !matches!(self, PolicyKind::Resource)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionElement {
    Action(Vec<String>),
    NotAction(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResourceElement {
    Resource(Vec<String>),
    NotResource(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PrincipalElement {
    Principal(Vec<PolicyPrincipal>),
    NotPrincipal(Vec<PolicyPrincipal>),
}

/// One entry of a `Principal` / `NotPrincipal` element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PolicyPrincipal {
    /// `"Principal": "*"`
    Wildcard,
    /// `{"AWS": ...}`: account ids, root ARNs, role/user/session ARNs or `*`.
    Aws(String),
    Service(String),
    Federated(String),
    CanonicalUser(String),
}

/// A single condition: `{"<operation>": {"<key>": [<values>]}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    /// Operator name, optionally prefixed `ForAllValues:`/`ForAnyValue:` and
    /// suffixed `IfExists`.
    pub operation: String,
    pub key: String,
    pub values: Vec<String>,
}

impl Condition {
    pub fn new(
        operation: impl Into<String>,
        key: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Condition {
            operation: operation.into(),
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Statement {
    pub sid: Option<String>,
    /// 1-based position inside the owning policy.
    pub index: usize,
    pub effect: Effect,
    pub action: ActionElement,
    pub resource: Option<ResourceElement>,
    pub principal: Option<PrincipalElement>,
    pub conditions: Vec<Condition>,
}

fn strings(values: impl IntoIterator<Item = impl Into<String>>) -> Vec<String> {
    values.into_iter().map(Into::into).collect()
}

impl Statement {
    pub fn new(effect: Effect, action: ActionElement) -> Self {
        Statement {
            sid: None,
            index: 1,
            effect,
            action,
            resource: None,
            principal: None,
            conditions: Vec::new(),
        }
    }

    /// `Allow` the given actions on the given resources.
    pub fn allow(
        actions: impl IntoIterator<Item = impl Into<String>>,
        resources: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Statement::new(Effect::Allow, ActionElement::Action(strings(actions)))
            .with_resource(ResourceElement::Resource(strings(resources)))
    }

    /// `Deny` the given actions on the given resources.
    pub fn deny(
        actions: impl IntoIterator<Item = impl Into<String>>,
        resources: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Statement::new(Effect::Deny, ActionElement::Action(strings(actions)))
            .with_resource(ResourceElement::Resource(strings(resources)))
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn with_action(mut self, action: ActionElement) -> Self {
        self.action = action;
        self
    }

    pub fn with_resource(mut self, resource: ResourceElement) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn without_resource(mut self) -> Self {
        self.resource = None;
        self
    }

    pub fn with_principal(mut self, principal: PrincipalElement) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// The `Sid` when present, otherwise the statement's position.
    pub fn identifier(&self) -> String {
        self.sid.clone().unwrap_or_else(|| self.index.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Policy {
    pub id: String,
    pub statements: Vec<Statement>,
}

impl Policy {
    /// Build a policy; statements are renumbered by position.
    pub fn new(id: impl Into<String>, statements: impl IntoIterator<Item = Statement>) -> Self {
        Policy {
            id: id.into(),
            statements: statements
                .into_iter()
                .enumerate()
                .map(|(i, statement)| statement.with_index(i + 1))
                .collect(),
        }
    }
}

/// The control policies attached at one organizational level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrganizationLevel {
    /// e.g. `r-abcd`, `ou-abcd-11111111` or the account id.
    pub identifier: String,
    pub policies: Vec<Policy>,
}

impl OrganizationLevel {
    pub fn new(identifier: impl Into<String>, policies: impl IntoIterator<Item = Policy>) -> Self {
        OrganizationLevel {
            identifier: identifier.into(),
            policies: policies.into_iter().collect(),
        }
    }
}

/// Every policy that could apply to one request.
///
/// Empty collections mean the policy type does not apply to the request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplicablePolicies {
    pub identity_policies: Vec<Policy>,
    /// Ordered root to leaf.
    pub service_control_policies: Vec<OrganizationLevel>,
    /// Ordered root to leaf.
    pub resource_control_policies: Vec<OrganizationLevel>,
    pub resource_policy: Option<Policy>,
    pub permission_boundaries: Vec<Policy>,
    pub endpoint_policies: Vec<Policy>,
}

impl ApplicablePolicies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity_policy(mut self, policy: Policy) -> Self {
        self.identity_policies.push(policy);
        self
    }

    pub fn with_resource_policy(mut self, policy: Policy) -> Self {
        self.resource_policy = Some(policy);
        self
    }

    pub fn with_permission_boundary(mut self, policy: Policy) -> Self {
        self.permission_boundaries.push(policy);
        self
    }

    pub fn with_endpoint_policy(mut self, policy: Policy) -> Self {
        self.endpoint_policies.push(policy);
        self
    }

    pub fn with_service_control_policies(mut self, levels: Vec<OrganizationLevel>) -> Self {
        self.service_control_policies = levels;
        self
    }

    pub fn with_resource_control_policies(mut self, levels: Vec<OrganizationLevel>) -> Self {
        self.resource_control_policies = levels;
        self
    }

    /// Whether the requesting principal has a permission boundary attached.
    pub fn has_permission_boundary(&self) -> bool {
        !self.permission_boundaries.is_empty()
    }
}
