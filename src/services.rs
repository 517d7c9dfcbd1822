//! Final combination of policy-type analyses, with per-service overrides.
//!
//! Every service is authorized by a [`ServiceAuthorizer`]. The
//! [`DefaultServiceAuthorizer`] implements the general evaluation order;
//! service-specific authorizers wrap it and adjust the outcome.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::types::{
    EvaluationResult, IdentityAnalysis, OrganizationAnalysis, PolicyTypeAnalysis,
    PrincipalIdentity, Request, ResourceAnalysis, ResourceEvaluationResult,
};

/// Everything an authorizer needs to reach a verdict.
#[derive(Debug, Clone, Copy)]
pub struct ServiceAuthorizationRequest<'a> {
    pub request: &'a Request,
    pub principal: &'a PrincipalIdentity,
    pub same_account: bool,
    pub identity: &'a IdentityAnalysis,
    pub permission_boundary: &'a PolicyTypeAnalysis<IdentityAnalysis>,
    pub endpoint_policy: &'a PolicyTypeAnalysis<IdentityAnalysis>,
    pub resource: &'a PolicyTypeAnalysis<ResourceAnalysis>,
    pub service_control_policies: &'a PolicyTypeAnalysis<OrganizationAnalysis>,
    pub resource_control_policies: &'a PolicyTypeAnalysis<OrganizationAnalysis>,
}

impl ServiceAuthorizationRequest<'_> {
    /// The action name without its service prefix.
    pub fn action_name(&self) -> &str {
        self.request
            .service_and_name()
            .map(|(_, name)| name)
            .unwrap_or_default()
    }
}

pub trait ServiceAuthorizer: Send + Sync {
    fn authorize(&self, input: &ServiceAuthorizationRequest<'_>) -> EvaluationResult;
}

/// The general evaluation order shared by every service.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultServiceAuthorizer;

impl DefaultServiceAuthorizer {
    /// Combine the analyses into a verdict.
    ///
    /// `trusts_account` decides whether an identity-policy allow suffices for
    /// a same-account request without a resource-policy allow.
    pub fn combine(
        &self,
        input: &ServiceAuthorizationRequest<'_>,
        trusts_account: bool,
    ) -> EvaluationResult {
        for control in [input.service_control_policies, input.resource_control_policies] {
            if let Some(result) = control.result() {
                if result != EvaluationResult::Allowed {
                    return result;
                }
            }
        }

        let resource = input.resource.result();
        if matches!(
            resource,
            ResourceEvaluationResult::ExplicitlyDenied | ResourceEvaluationResult::DeniedForAccount
        ) {
            return EvaluationResult::ExplicitlyDenied;
        }
        if input.identity.result == EvaluationResult::ExplicitlyDenied {
            return EvaluationResult::ExplicitlyDenied;
        }
        let boundary = input.permission_boundary.result();
        if boundary == Some(EvaluationResult::ExplicitlyDenied) {
            return EvaluationResult::ExplicitlyDenied;
        }
        if let Some(endpoint) = input.endpoint_policy.result() {
            if endpoint != EvaluationResult::Allowed {
                return endpoint;
            }
        }

        let identity_allowed = input.identity.result.is_allowed();
        let boundary_blocks = boundary == Some(EvaluationResult::ImplicitlyDenied);

        if input.same_account {
            if boundary_blocks {
                // Only a resource policy naming the session or user itself
                // gets past an implicit deny in the boundary.
                let rescued = input.principal.is_session_or_user()
                    && input
                        .resource
                        .analyzed()
                        .is_some_and(ResourceAnalysis::has_exact_principal_allow);
                return if rescued {
                    EvaluationResult::Allowed
                } else {
                    EvaluationResult::ImplicitlyDenied
                };
            }
            if resource == ResourceEvaluationResult::Allowed {
                return EvaluationResult::Allowed;
            }
            if identity_allowed
                && (trusts_account || resource == ResourceEvaluationResult::AllowedForAccount)
            {
                return EvaluationResult::Allowed;
            }
            return EvaluationResult::ImplicitlyDenied;
        }

        if boundary_blocks {
            return EvaluationResult::ImplicitlyDenied;
        }
        let resource_allows = matches!(
            resource,
            ResourceEvaluationResult::Allowed | ResourceEvaluationResult::AllowedForAccount
        );
        if resource_allows && identity_allowed {
            EvaluationResult::Allowed
        } else {
            EvaluationResult::ImplicitlyDenied
        }
    }
}

impl ServiceAuthorizer for DefaultServiceAuthorizer {
    fn authorize(&self, input: &ServiceAuthorizationRequest<'_>) -> EvaluationResult {
        self.combine(input, true)
    }
}

const IMMUTABLE_POLICY_ACTIONS: &[&str] = &[
    "CreatePolicyVersion",
    "DeletePolicy",
    "DeletePolicyVersion",
    "SetDefaultPolicyVersion",
    "TagPolicy",
    "UntagPolicy",
];

const PROTECTED_ROLE_ACTIONS: &[&str] = &[
    "AttachRolePolicy",
    "DeleteRole",
    "DeleteRolePolicy",
    "DetachRolePolicy",
    "PutRolePolicy",
    "UpdateAssumeRolePolicy",
    "UpdateRole",
    "UpdateRoleDescription",
    "PutRolePermissionsBoundary",
    "DeleteRolePermissionsBoundary",
];

const AWS_MANAGED_POLICY: &str = ":iam::aws:policy/";
const PROTECTED_ROLE_PATHS: &[&str] = &[":role/aws-service-role/", ":role/aws-reserved/"];

/// AWS managed policies and service-linked or reserved roles cannot be
/// modified, whatever the policies say.
#[derive(Debug, Clone, Copy, Default)]
pub struct IamServiceAuthorizer {
    base: DefaultServiceAuthorizer,
}

impl ServiceAuthorizer for IamServiceAuthorizer {
    fn authorize(&self, input: &ServiceAuthorizationRequest<'_>) -> EvaluationResult {
        let action = input.action_name();
        let resource = input.request.resource.arn.as_str();
        let is = |list: &[&str]| list.iter().any(|a| a.eq_ignore_ascii_case(action));

        if is(IMMUTABLE_POLICY_ACTIONS) && resource.contains(AWS_MANAGED_POLICY) {
            return EvaluationResult::ImplicitlyDenied;
        }
        if is(PROTECTED_ROLE_ACTIONS) && PROTECTED_ROLE_PATHS.iter().any(|p| resource.contains(p)) {
            return EvaluationResult::ImplicitlyDenied;
        }
        self.base.authorize(input)
    }
}

/// Key policies only delegate to identity policies for `*` resources; a
/// concrete key needs the key policy to allow the account or principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct KmsServiceAuthorizer {
    base: DefaultServiceAuthorizer,
}

impl ServiceAuthorizer for KmsServiceAuthorizer {
    fn authorize(&self, input: &ServiceAuthorizationRequest<'_>) -> EvaluationResult {
        self.base.combine(input, input.request.resource.arn == "*")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StsServiceAuthorizer {
    base: DefaultServiceAuthorizer,
}

impl ServiceAuthorizer for StsServiceAuthorizer {
    fn authorize(&self, input: &ServiceAuthorizationRequest<'_>) -> EvaluationResult {
        if input.action_name().eq_ignore_ascii_case("GetCallerIdentity") {
            return EvaluationResult::Allowed;
        }
        // role trust policies must allow the principal themselves
        let trusts_account = input.resource.result() == ResourceEvaluationResult::NotApplicable;
        self.base.combine(input, trusts_account)
    }
}

/// Service authorizers keyed by lowercase service name.
#[derive(Clone)]
pub struct ServiceRegistry {
    fallback: Arc<dyn ServiceAuthorizer>,
    services: HashMap<String, Arc<dyn ServiceAuthorizer>>,
}

impl Debug for ServiceRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let mut services: Vec<&String> = self.services.keys().collect();
        services.sort();
        f.debug_struct("ServiceRegistry")
            .field("services", &services)
            .finish()
    }
}

impl ServiceRegistry {
    /// A builder preloaded with the built-in IAM, KMS and STS authorizers.
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::new()
            .register("iam", IamServiceAuthorizer::default())
            .register("kms", KmsServiceAuthorizer::default())
            .register("sts", StsServiceAuthorizer::default())
    }

    /// The authorizer for `service`, or the fallback.
    pub fn authorizer(&self, service: &str) -> &dyn ServiceAuthorizer {
        self.services
            .get(&service.to_ascii_lowercase())
            .unwrap_or(&self.fallback)
            .as_ref()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        ServiceRegistry::builder().build()
    }
}

static DEFAULT_REGISTRY: Lazy<Arc<ServiceRegistry>> =
    Lazy::new(|| Arc::new(ServiceRegistry::default()));

/// The shared registry with the built-in overrides.
pub fn default_registry() -> Arc<ServiceRegistry> {
    DEFAULT_REGISTRY.clone()
}

pub struct ServiceRegistryBuilder {
    fallback: Arc<dyn ServiceAuthorizer>,
    services: HashMap<String, Arc<dyn ServiceAuthorizer>>,
}

impl ServiceRegistryBuilder {
    /// An empty builder; every service uses [`DefaultServiceAuthorizer`].
    pub fn new() -> Self {
        ServiceRegistryBuilder {
            fallback: Arc::new(DefaultServiceAuthorizer),
            services: HashMap::new(),
        }
    }

    pub fn register(
        mut self,
        service: impl AsRef<str>,
        authorizer: impl ServiceAuthorizer + 'static,
    ) -> Self {
        self.services
            .insert(service.as_ref().to_ascii_lowercase(), Arc::new(authorizer));
        self
    }

    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry {
            fallback: self.fallback,
            services: self.services,
        }
    }
}

impl Default for ServiceRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
