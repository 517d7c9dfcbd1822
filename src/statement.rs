//! Per-statement matching of action, resource, principal and conditions.

mod action;
mod principal;
mod resource;

pub use action::{action_element_matches, action_matches};
pub use principal::{PrincipalMatch, PrincipalProbe};
pub use resource::{ResourceMatch, resource_element_matches};

use tracing::warn;

use crate::condition::evaluate_statement_conditions;
use crate::error::EngineError;
use crate::types::{
    Effect, EvaluationOptions, Policy, PolicyKind, PrincipalElement, PrincipalIdentity,
    PrincipalMatchResult, Request, Statement, StatementAnalysis,
};

/// Evaluates statements against one request.
///
/// Built once per request; holds the parsed pieces of the request that every
/// statement needs.
pub struct StatementMatcher<'a> {
    request: &'a Request,
    service: &'a str,
    action_name: &'a str,
    identity: PrincipalIdentity,
    options: &'a EvaluationOptions,
    has_permission_boundary: bool,
}

impl<'a> StatementMatcher<'a> {
    pub fn new(
        request: &'a Request,
        options: &'a EvaluationOptions,
        has_permission_boundary: bool,
    ) -> Result<Self, EngineError> {
        let (service, action_name) = request.service_and_name()?;
        Ok(StatementMatcher {
            request,
            service,
            action_name,
            identity: request.principal_identity(),
            options,
            has_permission_boundary,
        })
    }

    pub fn identity(&self) -> &PrincipalIdentity {
        &self.identity
    }

    fn malformed(
        kind: PolicyKind,
        policy: &Policy,
        statement: &Statement,
        reason: &str,
    ) -> EngineError {
        warn!(
            event = "Request",
            phase = "Statement",
            policy_kind = %kind,
            policy = %policy.id,
            statement = %statement.identifier(),
            reason,
            "Malformed statement"
        );
        EngineError::MalformedStatement {
            policy_kind: kind.to_string(),
            policy: policy.id.clone(),
            statement: statement.identifier(),
            reason: reason.to_string(),
        }
    }

    fn principal_match(&self, kind: PolicyKind, statement: &Statement) -> PrincipalMatch {
        let Some(element) = &statement.principal else {
            return PrincipalMatch {
                result: PrincipalMatchResult::Match,
                ignored_role_session_name: false,
            };
        };
        // A Deny with NotPrincipal in a resource policy always applies to
        // principals that carry a permission boundary.
        if kind == PolicyKind::Resource
            && statement.effect == Effect::Deny
            && self.has_permission_boundary
            && matches!(element, PrincipalElement::NotPrincipal(_))
        {
            return PrincipalMatch {
                result: PrincipalMatchResult::Match,
                ignored_role_session_name: false,
            };
        }
        PrincipalProbe {
            principal: &self.request.principal,
            identity: &self.identity,
            ignore_session_name: self.options.is_discovery() && statement.effect == Effect::Allow,
        }
        .element_matches(element)
    }

    /// Evaluate one statement of a policy of the given kind.
    pub fn evaluate(
        &self,
        kind: PolicyKind,
        policy: &Policy,
        statement: &Statement,
    ) -> Result<StatementAnalysis, EngineError> {
        if statement.resource.is_none() && kind.requires_resource() {
            return Err(Self::malformed(
                kind,
                policy,
                statement,
                "statement has neither Resource nor NotResource",
            ));
        }
        if statement.principal.is_none() && kind == PolicyKind::Resource {
            return Err(Self::malformed(
                kind,
                policy,
                statement,
                "resource policy statement has neither Principal nor NotPrincipal",
            ));
        }

        let action_matched =
            action_element_matches(&statement.action, self.service, self.action_name);

        let (resource_matched, resource_errors) = match &statement.resource {
            Some(element) => {
                let outcome = resource_element_matches(
                    element,
                    statement.effect,
                    &self.request.resource.arn,
                    &self.request.context,
                );
                (outcome.matched, outcome.errors)
            }
            // trust policy statements
            None => (true, Vec::new()),
        };

        let principal = self.principal_match(kind, statement);

        let conditions = evaluate_statement_conditions(
            &statement.conditions,
            &self.request.context,
            statement.effect,
            self.options,
        );

        Ok(StatementAnalysis {
            policy_id: policy.id.clone(),
            statement_id: statement.identifier(),
            effect: statement.effect,
            action_matched,
            resource_matched,
            resource_errors,
            principal_match: principal.result,
            condition_outcome: conditions.outcome,
            conditions: conditions.conditions,
            ignored_conditions: conditions.ignored,
            ignored_role_session_name: principal.ignored_role_session_name,
        })
    }
}
