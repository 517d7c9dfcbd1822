use super::*;
use crate::error::EngineError;
use crate::types::{ConditionOutcome, ResourceEvaluationResult};
use yare::parameterized;

#[test]
fn test_identity_allow_same_account() {
    let request = request(ALICE, "s3:GetBucket", "arn:aws:s3:::bucket", ACCOUNT);
    let policies = ApplicablePolicies::new().with_identity_policy(statement_policy(
        "S3Read",
        r#"{"Effect": "Allow", "Action": "s3:GetBucket", "Resource": "*"}"#,
    ));

    let analysis = authorize(&request, &policies);
    assert_eq!(analysis.result, EvaluationResult::Allowed);
    assert!(analysis.same_account);
    assert_eq!(analysis.identity.allow_statements[0].policy_id, "S3Read");
    assert!(!analysis.resource.is_applicable());
    assert!(!analysis.permission_boundary.is_applicable());
    assert!(!analysis.service_control_policies.is_applicable());
}

#[test]
fn test_resource_deny_all() {
    let request = s3_request(ALICE, ACCOUNT);
    let policies = ApplicablePolicies::new()
        .with_identity_policy(statement_policy(
            "S3Full",
            r#"{"Effect": "Allow", "Action": "s3:*", "Resource": "*"}"#,
        ))
        .with_resource_policy(statement_policy(
            "bucket",
            r#"{"Sid": "DenyAll", "Effect": "Deny", "Principal": "*", "Action": "s3:*", "Resource": "*"}"#,
        ));

    let analysis = authorize(&request, &policies);
    assert_eq!(analysis.result, EvaluationResult::ExplicitlyDenied);
    assert_eq!(analysis.resource.result(), ResourceEvaluationResult::ExplicitlyDenied);
    let resource = analysis.resource.analyzed().unwrap();
    assert_eq!(resource.deny_statements[0].policy_id, "bucket");
    assert_eq!(resource.deny_statements[0].statement_id, "DenyAll");
}

#[test]
fn test_unresolved_variable_never_matches() {
    let request = s3_request(ALICE, ACCOUNT);
    let policies = ApplicablePolicies::new().with_identity_policy(statement_policy(
        "SelfOnly",
        r#"{
            "Effect": "Allow",
            "Action": "s3:GetObject",
            "Resource": "*",
            "Condition": {"StringEquals": {"aws:username": "${aws:username}"}}
        }"#,
    ));

    let analysis = authorize(&request, &policies);
    assert_eq!(analysis.result, EvaluationResult::ImplicitlyDenied);

    let statement = &analysis.identity.unmatched_statements[0];
    assert_eq!(statement.condition_outcome, ConditionOutcome::NoMatch);
    let condition = &statement.conditions[0];
    assert_eq!(condition.outcome, ConditionOutcome::NoMatch);
    insta::assert_snapshot!(
        condition.values[0].errors[0],
        @"aws:username not found in request context, and no default value provided. This will never match"
    );
}

#[test]
fn test_variable_resolves_from_context() {
    let request = with_context(
        request(
            ALICE,
            "s3:GetObject",
            "arn:aws:s3:::home/alice/notes.txt",
            ACCOUNT,
        ),
        RequestContext::new().with_value("aws:username", "alice"),
    );
    let policies = ApplicablePolicies::new().with_identity_policy(statement_policy(
        "Home",
        r#"{"Effect": "Allow", "Action": "s3:GetObject", "Resource": "arn:aws:s3:::home/${aws:username}/*"}"#,
    ));
    assert_eq!(verdict(&request, &policies), EvaluationResult::Allowed);
}

#[parameterized(
    resource = { "Resource" },
    not_resource = { "NotResource" },
)]
fn test_unresolved_resource_variable_is_reported(element: &str) {
    let request = s3_request(ALICE, ACCOUNT);
    let policies = ApplicablePolicies::new().with_identity_policy(statement_policy(
        "Home",
        &format!(
            r#"{{"Effect": "Allow", "Action": "s3:GetObject", "{element}": "arn:aws:s3:::home/${{aws:username}}/*"}}"#
        ),
    ));

    let analysis = authorize(&request, &policies);
    assert_eq!(analysis.result, EvaluationResult::ImplicitlyDenied);

    let statement = &analysis.identity.unmatched_statements[0];
    assert!(!statement.resource_matched);
    insta::assert_snapshot!(
        statement.resource_errors.join("\n"),
        @"aws:username not found in request context, and no default value provided. This will never match"
    );
    let json = serde_json::to_string(&analysis).unwrap();
    assert!(json.contains("This will never match"));
}

#[test]
fn test_equivalent_wildcard_deny_applies() {
    let request = request(ALICE, "s3:GetObject", "arn:aws:s3:::b/*?", ACCOUNT);
    let policies = ApplicablePolicies::new()
        .with_identity_policy(allow_all("admin"))
        .with_identity_policy(statement_policy(
            "NoB",
            r#"{"Effect": "Deny", "Action": "s3:*", "Resource": "arn:aws:s3:::b/?*"}"#,
        ));
    assert_eq!(verdict(&request, &policies), EvaluationResult::ExplicitlyDenied);
}

#[parameterized(
    matching_tag = { "prod", EvaluationResult::Allowed },
    other_tag = { "dev", EvaluationResult::ImplicitlyDenied },
)]
fn test_condition_gates_allow(tag: &str, expected: EvaluationResult) {
    let request = with_context(
        s3_request(ALICE, ACCOUNT),
        RequestContext::new().with_value("aws:ResourceTag/env", tag),
    );
    let policies = ApplicablePolicies::new().with_identity_policy(statement_policy(
        "TaggedRead",
        r#"{
            "Effect": "Allow",
            "Action": "s3:Get*",
            "Resource": "*",
            "Condition": {"StringEquals": {"aws:ResourceTag/env": "prod"}}
        }"#,
    ));
    assert_eq!(verdict(&request, &policies), expected);
}

#[test]
fn test_no_policies_is_implicit_deny() {
    let analysis = authorize(&s3_request(ALICE, ACCOUNT), &ApplicablePolicies::new());
    assert_eq!(analysis.result, EvaluationResult::ImplicitlyDenied);
    assert!(analysis.identity.allow_statements.is_empty());
}

#[test]
fn test_identity_deny_beats_resource_allow() {
    let request = s3_request(ALICE, ACCOUNT);
    let policies = ApplicablePolicies::new()
        .with_identity_policy(statement_policy(
            "NoS3",
            r#"{"Effect": "Deny", "Action": "s3:*", "Resource": "*"}"#,
        ))
        .with_resource_policy(statement_policy(
            "bucket",
            r#"{"Effect": "Allow", "Principal": {"AWS": "arn:aws:iam::111122223333:user/alice"}, "Action": "s3:*", "Resource": "*"}"#,
        ));
    assert_eq!(verdict(&request, &policies), EvaluationResult::ExplicitlyDenied);
}

#[test]
fn test_resource_policy_alone_allows_same_account() {
    let request = s3_request(ALICE, ACCOUNT);
    let policies = ApplicablePolicies::new().with_resource_policy(statement_policy(
        "bucket",
        r#"{"Effect": "Allow", "Principal": {"AWS": "arn:aws:iam::111122223333:user/alice"}, "Action": "s3:GetObject", "Resource": "arn:aws:s3:::bucket/*"}"#,
    ));
    assert_eq!(verdict(&request, &policies), EvaluationResult::Allowed);
}

#[parameterized(
    user_rescued = { ALICE, "arn:aws:iam::111122223333:user/alice", EvaluationResult::Allowed },
    session_rescued = { ADMIN_SESSION, ADMIN_SESSION, EvaluationResult::Allowed },
    session_via_role = { ADMIN_SESSION, ADMIN_ROLE, EvaluationResult::ImplicitlyDenied },
    account_only = { ALICE, "111122223333", EvaluationResult::ImplicitlyDenied },
)]
fn test_boundary_rescued_by_resource_policy(
    principal: &str,
    policy_principal: &str,
    expected: EvaluationResult,
) {
    let request = s3_request(principal, ACCOUNT);
    let policies = ApplicablePolicies::new()
        .with_identity_policy(allow_all("admin"))
        .with_permission_boundary(statement_policy(
            "boundary",
            r#"{"Effect": "Allow", "Action": "ec2:*", "Resource": "*"}"#,
        ))
        .with_resource_policy(statement_policy(
            "bucket",
            &format!(
                r#"{{"Effect": "Allow", "Principal": {{"AWS": "{policy_principal}"}}, "Action": "s3:*", "Resource": "*"}}"#
            ),
        ));

    let analysis = authorize(&request, &policies);
    assert_eq!(
        analysis.permission_boundary.result(),
        Some(EvaluationResult::ImplicitlyDenied)
    );
    assert_eq!(analysis.result, expected);
}

#[test]
fn test_not_principal_deny_applies_to_bounded_principal() {
    let request = s3_request(ADMIN_SESSION, ACCOUNT);
    let resource_policy = statement_policy(
        "bucket",
        r#"{"Effect": "Deny", "NotPrincipal": {"AWS": "arn:aws:sts::111122223333:assumed-role/Admin/alice"}, "Action": "s3:*", "Resource": "*"}"#,
    );

    let unbounded = ApplicablePolicies::new()
        .with_identity_policy(allow_all("admin"))
        .with_resource_policy(resource_policy);
    assert_eq!(verdict(&request, &unbounded), EvaluationResult::Allowed);

    let bounded = unbounded.with_permission_boundary(allow_all("boundary"));
    assert_eq!(verdict(&request, &bounded), EvaluationResult::ExplicitlyDenied);
}

#[parameterized(
    endpoint_allows = { r#"{"Effect": "Allow", "Principal": "*", "Action": "s3:*", "Resource": "*"}"#, EvaluationResult::Allowed },
    endpoint_other_bucket = { r#"{"Effect": "Allow", "Principal": "*", "Action": "s3:*", "Resource": "arn:aws:s3:::other/*"}"#, EvaluationResult::ImplicitlyDenied },
    endpoint_denies = { r#"{"Effect": "Deny", "Principal": "*", "Action": "s3:GetObject", "Resource": "*"}"#, EvaluationResult::ExplicitlyDenied },
)]
fn test_endpoint_policy(statement: &str, expected: EvaluationResult) {
    let request = s3_request(ALICE, ACCOUNT);
    let policies = ApplicablePolicies::new()
        .with_identity_policy(allow_all("admin"))
        .with_endpoint_policy(statement_policy("vpce", statement));

    let analysis = authorize(&request, &policies);
    assert!(analysis.endpoint_policy.is_applicable());
    assert_eq!(analysis.result, expected);
}

#[test]
fn test_malformed_identity_statement_is_an_error() {
    let request = s3_request(ALICE, ACCOUNT);
    let policies = ApplicablePolicies::new().with_identity_policy(statement_policy(
        "broken",
        r#"{"Effect": "Allow", "Action": "s3:*"}"#,
    ));
    let err = AuthorizationEngine::new()
        .authorize(&request, &policies)
        .unwrap_err();
    insta::assert_snapshot!(
        err.to_string(),
        @"malformed statement 1 in identity policy broken: statement has neither Resource nor NotResource"
    );
}

#[test]
fn test_invalid_action_is_an_error() {
    let request = request(ALICE, "GetObject", BUCKET_OBJECT, ACCOUNT);
    let err = AuthorizationEngine::new()
        .authorize(&request, &ApplicablePolicies::new())
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidFormat(_)));
}

#[test]
fn test_analysis_serializes() {
    let request = request(ALICE, "s3:GetBucket", "arn:aws:s3:::bucket", ACCOUNT);
    let policies = ApplicablePolicies::new().with_identity_policy(statement_policy(
        "S3Read",
        r#"{"Sid": "Read", "Effect": "Allow", "Action": "s3:GetBucket", "Resource": "*"}"#,
    ));
    let analysis = authorize(&request, &policies);
    let json = serde_json::to_value(&analysis).unwrap();
    assert_eq!(json["result"], "allowed");
    assert_eq!(json["resource"]["status"], "not_applicable");
    assert_eq!(json["identity"]["allow_statements"][0]["statement_id"], "Read");
}
