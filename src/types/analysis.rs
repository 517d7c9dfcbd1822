//! The explanation tree produced by an evaluation.

use serde::Serialize;
use utoipa::ToSchema;

use super::policy::Effect;
use super::result::{
    ConditionOutcome, EvaluationResult, PrincipalMatchResult, ResourceEvaluationResult,
};

/// Diagnostic for one policy value of a condition.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct ValueExplain {
    /// The value as written in the policy.
    pub value: String,
    /// The value after variable substitution, when it differs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_value: Option<String>,
    pub matches: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ValueExplain {
    pub fn new(value: impl Into<String>) -> Self {
        ValueExplain {
            value: value.into(),
            resolved_value: None,
            matches: false,
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct ConditionExplain {
    pub operation: String,
    pub key: String,
    pub outcome: ConditionOutcome,
    pub values: Vec<ValueExplain>,
    pub matched_because_missing: bool,
    pub failed_because_missing: bool,
    pub failed_because_array: bool,
    /// Request values that satisfied none of the policy values (`ForAllValues`).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmatched_values: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ConditionExplain {
    pub fn new(operation: impl Into<String>, key: impl Into<String>) -> Self {
        ConditionExplain {
            operation: operation.into(),
            key: key.into(),
            outcome: ConditionOutcome::NoMatch,
            values: Vec::new(),
            matched_because_missing: false,
            failed_because_missing: false,
            failed_because_array: false,
            unmatched_values: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn matches(&self) -> bool {
        self.outcome.is_match()
    }
}

/// Everything known about one statement after evaluation.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct StatementAnalysis {
    pub policy_id: String,
    pub statement_id: String,
    pub effect: Effect,
    pub action_matched: bool,
    pub resource_matched: bool,
    /// Unresolvable variables in the resource element.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_errors: Vec<String>,
    pub principal_match: PrincipalMatchResult,
    pub condition_outcome: ConditionOutcome,
    pub conditions: Vec<ConditionExplain>,
    /// Failing conditions that were relaxed (or would have been, for denies)
    /// in discovery mode.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignored_conditions: Vec<ConditionExplain>,
    pub ignored_role_session_name: bool,
}

impl StatementAnalysis {
    /// Action, resource, principal and conditions all matched.
    pub fn matches(&self) -> bool {
        self.action_matched
            && self.resource_matched
            && self.principal_match.is_match()
            && self.condition_outcome.is_match()
    }
}

/// Analysis of identity-shaped policies (identity, boundary, endpoint).
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IdentityAnalysis {
    pub result: EvaluationResult,
    pub allow_statements: Vec<StatementAnalysis>,
    pub deny_statements: Vec<StatementAnalysis>,
    pub unmatched_statements: Vec<StatementAnalysis>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResourceAnalysis {
    pub result: ResourceEvaluationResult,
    pub allow_statements: Vec<StatementAnalysis>,
    pub deny_statements: Vec<StatementAnalysis>,
    pub unmatched_statements: Vec<StatementAnalysis>,
}

impl ResourceAnalysis {
    /// Whether an allow statement matched the principal exactly.
    pub fn has_exact_principal_allow(&self) -> bool {
        self.allow_statements
            .iter()
            .any(|s| s.principal_match == PrincipalMatchResult::Match)
    }
}

/// One organizational level of an SCP or RCP hierarchy.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OuAnalysis {
    pub identifier: String,
    pub result: EvaluationResult,
    pub allow_statements: Vec<StatementAnalysis>,
    pub deny_statements: Vec<StatementAnalysis>,
    pub unmatched_statements: Vec<StatementAnalysis>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OrganizationAnalysis {
    pub result: EvaluationResult,
    /// Root to leaf, as supplied.
    pub levels: Vec<OuAnalysis>,
}

/// A policy type that either applied to the request or did not.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", content = "analysis", rename_all = "snake_case")]
pub enum PolicyTypeAnalysis<T> {
    NotApplicable,
    Analyzed(T),
}

impl<T> PolicyTypeAnalysis<T> {
    pub fn is_applicable(&self) -> bool {
        matches!(self, PolicyTypeAnalysis::Analyzed(_))
    }

    pub fn analyzed(&self) -> Option<&T> {
        match self {
            PolicyTypeAnalysis::Analyzed(analysis) => Some(analysis),
            PolicyTypeAnalysis::NotApplicable => None,
        }
    }
}

impl PolicyTypeAnalysis<IdentityAnalysis> {
    pub fn result(&self) -> Option<EvaluationResult> {
        self.analyzed().map(|a| a.result)
    }
}

impl PolicyTypeAnalysis<OrganizationAnalysis> {
    pub fn result(&self) -> Option<EvaluationResult> {
        self.analyzed().map(|a| a.result)
    }
}

impl PolicyTypeAnalysis<ResourceAnalysis> {
    pub fn result(&self) -> ResourceEvaluationResult {
        self.analyzed()
            .map(|a| a.result)
            .unwrap_or(ResourceEvaluationResult::NotApplicable)
    }
}

/// The full evaluation of a request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RequestAnalysis {
    pub result: EvaluationResult,
    pub same_account: bool,
    pub identity: IdentityAnalysis,
    pub permission_boundary: PolicyTypeAnalysis<IdentityAnalysis>,
    pub endpoint_policy: PolicyTypeAnalysis<IdentityAnalysis>,
    pub resource: PolicyTypeAnalysis<ResourceAnalysis>,
    pub service_control_policies: PolicyTypeAnalysis<OrganizationAnalysis>,
    pub resource_control_policies: PolicyTypeAnalysis<OrganizationAnalysis>,
}

impl RequestAnalysis {
    pub fn is_allowed(&self) -> bool {
        self.result.is_allowed()
    }
}
