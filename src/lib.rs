//! Evaluation of AWS IAM authorization requests.
//!
//! Given a request (principal, action, resource, context) and every policy
//! that could apply to it, [`AuthorizationEngine`] decides whether the request
//! is allowed and explains the decision statement by statement.
//!
//! ```rust
//! use iam_eval_core::{
//!     load_policy, ApplicablePolicies, AuthorizationEngine, EvaluationResult, Request,
//!     RequestResource,
//! };
//!
//! let policy = load_policy("S3Read", r#"{
//!     "Version": "2012-10-17",
//!     "Statement": [{"Effect": "Allow", "Action": "s3:Get*", "Resource": "*"}]
//! }"#).unwrap();
//! let request = Request::new(
//!     "arn:aws:iam::111122223333:user/alice",
//!     "s3:GetObject",
//!     RequestResource::new("arn:aws:s3:::bucket/key", "111122223333"),
//! );
//! let policies = ApplicablePolicies::new().with_identity_policy(policy);
//! let result = AuthorizationEngine::new().evaluate(&request, &policies).unwrap();
//! assert_eq!(result, EvaluationResult::Allowed);
//! ```

pub use analysis::{PolicyAnalyzer, organization_result};
pub use condition::{
    Operation, SetOperator, StatementConditions, evaluate_condition, evaluate_statement_conditions,
};
pub use engine::AuthorizationEngine;
pub use error::EngineError;
pub use loader::load_policy;
pub use operators::{ConditionOperator, OperatorOutcome, PreparedOperator};
pub use pattern::{
    SegmentRelation, classify_segment, has_wildcards, pattern_covers, patterns_overlap,
    resource_arns_overlap, wildcard_match,
};
pub use services::{
    DefaultServiceAuthorizer, IamServiceAuthorizer, KmsServiceAuthorizer,
    ServiceAuthorizationRequest, ServiceAuthorizer, ServiceRegistry, ServiceRegistryBuilder,
    StsServiceAuthorizer, default_registry,
};
pub use statement::StatementMatcher;
pub use types::*;
pub use variables::{Resolution, contains_variables, resolve};

mod analysis;
mod condition;
mod engine;
mod error;
mod loader;
pub mod metrics;
mod operators;
mod pattern;
mod services;
mod statement;
mod timers;
pub mod types;
mod variables;
