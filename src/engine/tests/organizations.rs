use super::*;
use crate::types::OrganizationLevel;
use yare::parameterized;

fn level(identifier: &str, policies: Vec<Policy>) -> OrganizationLevel {
    OrganizationLevel::new(identifier, policies)
}

fn deny_s3_delete() -> Policy {
    statement_policy(
        "NoDeletes",
        r#"{"Effect": "Deny", "Action": "s3:Delete*", "Resource": "*"}"#,
    )
}

fn allow_ec2_only() -> Policy {
    statement_policy(
        "Ec2Only",
        r#"{"Effect": "Allow", "Action": "ec2:*", "Resource": "*"}"#,
    )
}

fn hierarchy(ou: Vec<Policy>) -> Vec<OrganizationLevel> {
    vec![
        level("r-root", vec![allow_all("FullAWSAccess")]),
        level("ou-dev", ou),
        level(ACCOUNT, vec![allow_all("FullAWSAccess")]),
    ]
}

#[parameterized(
    every_level_allows = { "s3:GetObject", vec![allow_all("FullAWSAccess")], EvaluationResult::Allowed },
    middle_level_silent = { "s3:GetObject", vec![allow_ec2_only()], EvaluationResult::ImplicitlyDenied },
    middle_level_denies = { "s3:DeleteObject", vec![allow_all("FullAWSAccess"), deny_s3_delete()], EvaluationResult::ExplicitlyDenied },
    deny_other_action = { "s3:GetObject", vec![allow_all("FullAWSAccess"), deny_s3_delete()], EvaluationResult::Allowed },
)]
fn test_service_control_policies(action: &str, ou: Vec<Policy>, expected: EvaluationResult) {
    let request = request(ALICE, action, BUCKET_OBJECT, ACCOUNT);
    let policies = ApplicablePolicies::new()
        .with_identity_policy(allow_all("admin"))
        .with_service_control_policies(hierarchy(ou));

    let analysis = authorize(&request, &policies);
    assert_eq!(analysis.result, expected);
    assert_eq!(analysis.service_control_policies.result(), Some(expected));
}

#[test]
fn test_scp_levels_are_reported() {
    let request = s3_request(ALICE, ACCOUNT);
    let policies = ApplicablePolicies::new()
        .with_identity_policy(allow_all("admin"))
        .with_service_control_policies(hierarchy(vec![allow_ec2_only()]));

    let analysis = authorize(&request, &policies);
    let scp = analysis.service_control_policies.analyzed().unwrap();
    let levels: Vec<(&str, EvaluationResult)> = scp
        .levels
        .iter()
        .map(|l| (l.identifier.as_str(), l.result))
        .collect();
    assert_eq!(
        levels,
        vec![
            ("r-root", EvaluationResult::Allowed),
            ("ou-dev", EvaluationResult::ImplicitlyDenied),
            (ACCOUNT, EvaluationResult::Allowed),
        ]
    );
}

#[test]
fn test_scp_deny_beats_resource_allow() {
    let request = s3_request(ALICE, ACCOUNT);
    let policies = ApplicablePolicies::new()
        .with_resource_policy(statement_policy(
            "bucket",
            r#"{"Effect": "Allow", "Principal": {"AWS": "arn:aws:iam::111122223333:user/alice"}, "Action": "s3:*", "Resource": "*"}"#,
        ))
        .with_service_control_policies(vec![level(
            "r-root",
            vec![statement_policy(
                "NoS3",
                r#"{"Effect": "Deny", "Action": "s3:*", "Resource": "*"}"#,
            )],
        )]);
    assert_eq!(verdict(&request, &policies), EvaluationResult::ExplicitlyDenied);
}

#[parameterized(
    rcp_allows = { vec![allow_all("RCPFullAWSAccess")], EvaluationResult::Allowed },
    rcp_denies_outside_org = {
        vec![
            allow_all("RCPFullAWSAccess"),
            statement_policy(
                "DataPerimeter",
                r#"{"Effect": "Deny", "Principal": "*", "Action": "s3:*", "Resource": "*", "Condition": {"StringNotEqualsIfExists": {"aws:PrincipalOrgID": "o-1234567890"}}}"#,
            ),
        ],
        EvaluationResult::ExplicitlyDenied
    },
)]
fn test_resource_control_policies(policies: Vec<Policy>, expected: EvaluationResult) {
    let request = with_context(
        s3_request(ALICE, ACCOUNT),
        RequestContext::new().with_value("aws:PrincipalOrgID", "o-0000000000"),
    );
    let applicable = ApplicablePolicies::new()
        .with_identity_policy(allow_all("admin"))
        .with_resource_control_policies(vec![level("r-root", policies)]);

    let analysis = authorize(&request, &applicable);
    assert_eq!(analysis.resource_control_policies.result(), Some(expected));
    assert_eq!(analysis.result, expected);
}
