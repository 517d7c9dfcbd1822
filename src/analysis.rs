//! Aggregation of statement outcomes into per-policy-type analyses.

use crate::error::EngineError;
use crate::statement::StatementMatcher;
use crate::types::{
    Effect, EvaluationResult, IdentityAnalysis, OrganizationAnalysis, OrganizationLevel,
    OuAnalysis, Policy, PolicyKind, PrincipalMatchResult, ResourceAnalysis,
    ResourceEvaluationResult, StatementAnalysis,
};

#[derive(Default)]
struct Partition {
    allow: Vec<StatementAnalysis>,
    deny: Vec<StatementAnalysis>,
    unmatched: Vec<StatementAnalysis>,
}

impl Partition {
    fn identity_result(&self) -> EvaluationResult {
        if !self.deny.is_empty() {
            EvaluationResult::ExplicitlyDenied
        } else if !self.allow.is_empty() {
            EvaluationResult::Allowed
        } else {
            EvaluationResult::ImplicitlyDenied
        }
    }
}

fn strongest(statements: &[StatementAnalysis]) -> PrincipalMatchResult {
    statements
        .iter()
        .map(|s| s.principal_match)
        .fold(PrincipalMatchResult::NoMatch, PrincipalMatchResult::strongest)
}

/// Runs every statement of a policy type through a [`StatementMatcher`].
pub struct PolicyAnalyzer<'a> {
    matcher: &'a StatementMatcher<'a>,
}

impl<'a> PolicyAnalyzer<'a> {
    pub fn new(matcher: &'a StatementMatcher<'a>) -> Self {
        PolicyAnalyzer { matcher }
    }

    fn partition<'p>(
        &self,
        kind: PolicyKind,
        policies: impl IntoIterator<Item = &'p Policy>,
    ) -> Result<Partition, EngineError> {
        let mut partition = Partition::default();
        for policy in policies {
            for statement in &policy.statements {
                let analysis = self.matcher.evaluate(kind, policy, statement)?;
                match (analysis.matches(), analysis.effect) {
                    (true, Effect::Allow) => partition.allow.push(analysis),
                    (true, Effect::Deny) => partition.deny.push(analysis),
                    (false, _) => partition.unmatched.push(analysis),
                }
            }
        }
        Ok(partition)
    }

    /// Identity policies, permission boundaries and endpoint policies.
    pub fn identity(
        &self,
        kind: PolicyKind,
        policies: &[Policy],
    ) -> Result<IdentityAnalysis, EngineError> {
        let partition = self.partition(kind, policies)?;
        Ok(IdentityAnalysis {
            result: partition.identity_result(),
            allow_statements: partition.allow,
            deny_statements: partition.deny,
            unmatched_statements: partition.unmatched,
        })
    }

    /// A resource policy. Statements matched only at account level yield the
    /// `*ForAccount` results.
    pub fn resource(&self, policy: &Policy) -> Result<ResourceAnalysis, EngineError> {
        let partition = self.partition(PolicyKind::Resource, [policy])?;
        let deny = strongest(&partition.deny);
        let allow = strongest(&partition.allow);
        let result = if deny.is_strong() {
            ResourceEvaluationResult::ExplicitlyDenied
        } else if deny == PrincipalMatchResult::AccountLevelMatch {
            ResourceEvaluationResult::DeniedForAccount
        } else if allow.is_strong() {
            ResourceEvaluationResult::Allowed
        } else if allow == PrincipalMatchResult::AccountLevelMatch {
            ResourceEvaluationResult::AllowedForAccount
        } else {
            ResourceEvaluationResult::ImplicitlyDenied
        };
        Ok(ResourceAnalysis {
            result,
            allow_statements: partition.allow,
            deny_statements: partition.deny,
            unmatched_statements: partition.unmatched,
        })
    }

    /// Service or resource control policies, walked root to leaf.
    pub fn organization(
        &self,
        kind: PolicyKind,
        levels: &[OrganizationLevel],
    ) -> Result<OrganizationAnalysis, EngineError> {
        let levels = levels
            .iter()
            .map(|level| {
                let partition = self.partition(kind, &level.policies)?;
                Ok(OuAnalysis {
                    identifier: level.identifier.clone(),
                    result: partition.identity_result(),
                    allow_statements: partition.allow,
                    deny_statements: partition.deny,
                    unmatched_statements: partition.unmatched,
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;
        Ok(OrganizationAnalysis {
            result: organization_result(&levels),
            levels,
        })
    }
}

/// Every level must allow; a deny at any level wins over everything else.
pub fn organization_result(levels: &[OuAnalysis]) -> EvaluationResult {
    if levels
        .iter()
        .any(|level| level.result == EvaluationResult::ExplicitlyDenied)
    {
        EvaluationResult::ExplicitlyDenied
    } else if levels.iter().any(|level| level.allow_statements.is_empty()) {
        EvaluationResult::ImplicitlyDenied
    } else if levels.iter().all(|level| level.result.is_allowed()) {
        EvaluationResult::Allowed
    } else {
        EvaluationResult::ImplicitlyDenied
    }
}
