use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::analysis::PolicyAnalyzer;
use crate::error::EngineError;
use crate::metrics::{EvaluationPhases, EvaluationStats, record_evaluation};
use crate::services::{ServiceAuthorizationRequest, ServiceRegistry, default_registry};
use crate::statement::StatementMatcher;
use crate::timers::{PhaseTimer, as_millis_f64, timed};
use crate::types::{
    ApplicablePolicies, EvaluationOptions, EvaluationResult, IdentityAnalysis,
    OrganizationAnalysis, OrganizationLevel, Policy, PolicyKind, PolicyTypeAnalysis, Request,
    RequestAnalysis,
};

/// Decides whether a request is allowed by a set of applicable policies.
/// Cloneable and thread-safe; holds no per-request state.
#[derive(Clone, Debug)]
pub struct AuthorizationEngine {
    options: Arc<EvaluationOptions>,
    registry: Arc<ServiceRegistry>,
}

impl Default for AuthorizationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthorizationEngine {
    /// Strict evaluation with the built-in service overrides.
    pub fn new() -> Self {
        AuthorizationEngine {
            options: Arc::new(EvaluationOptions::default()),
            registry: default_registry(),
        }
    }

    pub fn with_options(mut self, options: EvaluationOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    pub fn with_registry(mut self, registry: ServiceRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn options(&self) -> &EvaluationOptions {
        &self.options
    }

    /// Evaluate `request` and explain the verdict.
    ///
    /// Fails only on structural problems: an action that is not
    /// `service:Name`, or a statement that lacks an element its policy type
    /// requires.
    pub fn authorize(
        &self,
        request: &Request,
        policies: &ApplicablePolicies,
    ) -> Result<RequestAnalysis, EngineError> {
        let mut total = Duration::ZERO;
        let mut control = Duration::ZERO;
        let mut identity_time = Duration::ZERO;
        let mut resource_time = Duration::ZERO;
        let mut combine = Duration::ZERO;

        let analysis = {
            let _total = PhaseTimer::new(&mut total);

            debug!(
                event = "Request",
                phase = "Evaluation",
                principal = %request.principal,
                action = %request.action,
                resource = %request.resource.arn,
                resource_account = %request.resource.account_id,
                mode = ?self.options.mode
            );

            let matcher =
                StatementMatcher::new(request, &self.options, policies.has_permission_boundary())?;
            let analyzer = PolicyAnalyzer::new(&matcher);

            let (service_control_policies, resource_control_policies) =
                timed(&mut control, || {
                    Ok::<_, EngineError>((
                        organization(
                            &analyzer,
                            PolicyKind::ServiceControlPolicy,
                            &policies.service_control_policies,
                        )?,
                        organization(
                            &analyzer,
                            PolicyKind::ResourceControlPolicy,
                            &policies.resource_control_policies,
                        )?,
                    ))
                })?;

            let (identity, permission_boundary, endpoint_policy) =
                timed(&mut identity_time, || {
                    Ok::<_, EngineError>((
                        analyzer.identity(PolicyKind::Identity, &policies.identity_policies)?,
                        identity_shaped(
                            &analyzer,
                            PolicyKind::PermissionBoundary,
                            &policies.permission_boundaries,
                        )?,
                        identity_shaped(
                            &analyzer,
                            PolicyKind::EndpointPolicy,
                            &policies.endpoint_policies,
                        )?,
                    ))
                })?;

            let resource = timed(&mut resource_time, || {
                policies
                    .resource_policy
                    .as_ref()
                    .map(|policy| analyzer.resource(policy))
                    .transpose()
                    .map(|analysis| {
                        analysis.map_or(PolicyTypeAnalysis::NotApplicable, PolicyTypeAnalysis::Analyzed)
                    })
            })?;

            debug!(
                event = "Request",
                phase = "Analysis",
                identity = %identity.result,
                permission_boundary = ?permission_boundary.result(),
                endpoint_policy = ?endpoint_policy.result(),
                resource = %resource.result(),
                service_control_policies = ?service_control_policies.result(),
                resource_control_policies = ?resource_control_policies.result()
            );

            let same_account = request.is_same_account();
            let service = request.service()?;
            let result = timed(&mut combine, || {
                let input = ServiceAuthorizationRequest {
                    request,
                    principal: matcher.identity(),
                    same_account,
                    identity: &identity,
                    permission_boundary: &permission_boundary,
                    endpoint_policy: &endpoint_policy,
                    resource: &resource,
                    service_control_policies: &service_control_policies,
                    resource_control_policies: &resource_control_policies,
                };
                self.registry.authorizer(&service).authorize(&input)
            });

            RequestAnalysis {
                result,
                same_account,
                identity,
                permission_boundary,
                endpoint_policy,
                resource,
                service_control_policies,
                resource_control_policies,
            }
        };

        info!(
            event = "Request",
            phase = "Result",
            principal = %request.principal,
            action = %request.action,
            resource = %request.resource.arn,
            same_account = analysis.same_account,
            result = %analysis.result
        );

        let stats = EvaluationStats {
            duration: total,
            result: analysis.result,
            principal: request.principal.clone(),
            action: request.action.clone(),
        };
        let phases = EvaluationPhases {
            control_policies_ms: as_millis_f64(control),
            identity_ms: as_millis_f64(identity_time),
            resource_ms: as_millis_f64(resource_time),
            combine_ms: as_millis_f64(combine),
            total_ms: as_millis_f64(total),
        };
        record_evaluation(&stats, &phases);

        Ok(analysis)
    }

    /// Like [`authorize`](Self::authorize), returning only the verdict.
    pub fn evaluate(
        &self,
        request: &Request,
        policies: &ApplicablePolicies,
    ) -> Result<EvaluationResult, EngineError> {
        self.authorize(request, policies).map(|analysis| analysis.result)
    }
}

/// Identity-shaped policy types other than identity policies only apply
/// when at least one policy of the type is present.
fn identity_shaped(
    analyzer: &PolicyAnalyzer<'_>,
    kind: PolicyKind,
    policies: &[Policy],
) -> Result<PolicyTypeAnalysis<IdentityAnalysis>, EngineError> {
    if policies.is_empty() {
        return Ok(PolicyTypeAnalysis::NotApplicable);
    }
    analyzer
        .identity(kind, policies)
        .map(PolicyTypeAnalysis::Analyzed)
}

fn organization(
    analyzer: &PolicyAnalyzer<'_>,
    kind: PolicyKind,
    levels: &[OrganizationLevel],
) -> Result<PolicyTypeAnalysis<OrganizationAnalysis>, EngineError> {
    if levels.is_empty() {
        return Ok(PolicyTypeAnalysis::NotApplicable);
    }
    analyzer
        .organization(kind, levels)
        .map(PolicyTypeAnalysis::Analyzed)
}

#[cfg(test)]
mod tests;
