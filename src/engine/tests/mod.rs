use super::*;
use crate::loader::load_policy;
use crate::types::{RequestContext, RequestResource};

mod organizations;
mod scenarios;

const ACCOUNT: &str = "111122223333";
const OTHER_ACCOUNT: &str = "444455556666";
const ALICE: &str = "arn:aws:iam::111122223333:user/alice";
const ADMIN_ROLE: &str = "arn:aws:iam::111122223333:role/Admin";
const ADMIN_SESSION: &str = "arn:aws:sts::111122223333:assumed-role/Admin/alice";
const BUCKET_OBJECT: &str = "arn:aws:s3:::bucket/key";

fn policy(id: &str, json: &str) -> Policy {
    load_policy(id, json).unwrap()
}

/// A single-statement policy document.
fn statement_policy(id: &str, statement: &str) -> Policy {
    policy(
        id,
        &format!(r#"{{"Version": "2012-10-17", "Statement": [{statement}]}}"#),
    )
}

fn allow_all(id: &str) -> Policy {
    statement_policy(id, r#"{"Effect": "Allow", "Action": "*", "Resource": "*"}"#)
}

fn request(principal: &str, action: &str, resource: &str, account: &str) -> Request {
    Request::new(principal, action, RequestResource::new(resource, account))
}

fn s3_request(principal: &str, account: &str) -> Request {
    request(principal, "s3:GetObject", BUCKET_OBJECT, account)
}

fn with_context(request: Request, context: RequestContext) -> Request {
    request.with_context(context)
}

fn authorize(request: &Request, policies: &ApplicablePolicies) -> RequestAnalysis {
    AuthorizationEngine::new()
        .authorize(request, policies)
        .unwrap()
}

fn verdict(request: &Request, policies: &ApplicablePolicies) -> EvaluationResult {
    AuthorizationEngine::new()
        .evaluate(request, policies)
        .unwrap()
}
