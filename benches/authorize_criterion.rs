use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use iam_eval_core::{
    ApplicablePolicies, AuthorizationEngine, EvaluationOptions, OrganizationLevel, Request,
    RequestContext, RequestResource, StrictConditionKeys, load_policy,
};
use std::hint::black_box;

struct Scenario {
    name: &'static str,
    engine: AuthorizationEngine,
    request: Request,
    policies: ApplicablePolicies,
}

fn noise_policy(idx: usize) -> String {
    format!(
        r#"{{"Statement": [
            {{"Effect": "Allow", "Action": ["sqs:SendMessage", "sqs:Receive*"], "Resource": "arn:aws:sqs:*:111122223333:queue-{idx}"}},
            {{"Effect": "Deny", "Action": "ec2:TerminateInstances", "Resource": "*", "Condition": {{"StringNotEquals": {{"aws:ResourceTag/owner": "${{aws:username}}"}}}}}}
        ]}}"#
    )
}

const IDENTITY: &str = r#"{"Statement": [
    {"Sid": "Home", "Effect": "Allow", "Action": "s3:*Object", "Resource": "arn:aws:s3:::home/${aws:username}/*"},
    {"Effect": "Deny", "Action": "s3:*", "Resource": "*", "Condition": {"Bool": {"aws:SecureTransport": "false"}}}
]}"#;

const BUCKET: &str = r#"{"Statement": [
    {"Effect": "Allow", "Principal": {"AWS": "111122223333"}, "Action": "s3:GetObject", "Resource": "arn:aws:s3:::home/*",
     "Condition": {"IpAddress": {"aws:SourceIp": ["10.0.0.0/8", "192.168.0.0/16"]}}}
]}"#;

const FULL_ACCESS: &str =
    r#"{"Statement": [{"Effect": "Allow", "Action": "*", "Resource": "*"}]}"#;

fn scenario(name: &'static str, noise: usize, engine: AuthorizationEngine) -> Scenario {
    let request = Request::new(
        "arn:aws:iam::111122223333:user/alice",
        "s3:GetObject",
        RequestResource::new("arn:aws:s3:::home/alice/notes.txt", "111122223333"),
    )
    .with_context(
        RequestContext::new()
            .with_value("aws:username", "alice")
            .with_value("aws:SecureTransport", "true")
            .with_value("aws:SourceIp", "10.1.2.3"),
    );

    let mut policies = ApplicablePolicies::new()
        .with_identity_policy(load_policy("identity", IDENTITY).expect("valid policy"))
        .with_resource_policy(load_policy("bucket", BUCKET).expect("valid policy"))
        .with_service_control_policies(vec![
            OrganizationLevel::new(
                "r-root",
                [load_policy("FullAWSAccess", FULL_ACCESS).expect("valid policy")],
            ),
            OrganizationLevel::new(
                "111122223333",
                [load_policy("FullAWSAccess", FULL_ACCESS).expect("valid policy")],
            ),
        ]);
    for idx in 0..noise {
        policies = policies.with_identity_policy(
            load_policy(format!("noise-{idx}"), &noise_policy(idx)).expect("valid policy"),
        );
    }

    Scenario {
        name,
        engine,
        request,
        policies,
    }
}

fn benchmark_authorize(c: &mut Criterion) {
    let mut group = c.benchmark_group("authorize");
    group.sample_size(40);

    let discovery = AuthorizationEngine::new().with_options(EvaluationOptions::discovery(
        StrictConditionKeys::new(["aws:SourceIp", "/^aws:Principal.*/"]).expect("valid keys"),
    ));
    let scenarios = vec![
        scenario("strict_small", 0, AuthorizationEngine::new()),
        scenario("strict_noise_50", 50, AuthorizationEngine::new()),
        scenario("discovery_noise_50", 50, discovery),
    ];

    for scenario in &scenarios {
        group.bench_with_input(
            BenchmarkId::from_parameter(scenario.name),
            scenario,
            |b, s| {
                b.iter(|| {
                    let analysis = s
                        .engine
                        .authorize(black_box(&s.request), black_box(&s.policies))
                        .expect("benchmark requests are valid");
                    black_box(analysis.result);
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_authorize);
criterion_main!(benches);
