//! Data model for requests, policies and evaluation results.
//!
//! Canonical string forms:
//! - Principal: an ARN (`arn:aws:iam::111122223333:user/alice`), a 12-digit
//!   account id, or an opaque service/federated/canonical identifier
//! - Action: `service:ActionName`
//! - Resource: an ARN or `*`, plus the owning account id

mod analysis;
mod arn;
mod context;
mod options;
mod policy;
mod request;
mod result;

pub use analysis::{
    ConditionExplain, IdentityAnalysis, OrganizationAnalysis, OuAnalysis, PolicyTypeAnalysis,
    RequestAnalysis, ResourceAnalysis, StatementAnalysis, ValueExplain,
};
pub use arn::{Arn, PrincipalIdentity, is_account_id, split_resource_product};
pub use context::{ContextValue, RequestContext};
pub use options::{EvaluationOptions, SimulationMode, StrictConditionKeys};
pub use policy::{
    ActionElement, ApplicablePolicies, Condition, Effect, OrganizationLevel, Policy,
    PolicyKind, PolicyPrincipal, PrincipalElement, ResourceElement, Statement,
};
pub use request::{Request, RequestResource};
pub use result::{
    ConditionOutcome, EvaluationResult, PrincipalMatchResult, ResourceEvaluationResult,
};
