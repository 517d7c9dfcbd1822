use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::EngineError;
use crate::types::{
    ActionElement, Condition, Effect, Policy, PolicyPrincipal, PrincipalElement, ResourceElement,
    Statement,
};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PrincipalDocument {
    Wildcard(String),
    Typed(BTreeMap<String, OneOrMany<String>>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StatementDocument {
    sid: Option<String>,
    effect: Effect,
    action: Option<OneOrMany<String>>,
    not_action: Option<OneOrMany<String>>,
    resource: Option<OneOrMany<String>>,
    not_resource: Option<OneOrMany<String>>,
    principal: Option<PrincipalDocument>,
    not_principal: Option<PrincipalDocument>,
    #[serde(default)]
    condition: BTreeMap<String, BTreeMap<String, OneOrMany<Value>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyDocument {
    statement: OneOrMany<StatementDocument>,
}

fn invalid(position: usize, sid: Option<&str>, reason: &str) -> EngineError {
    let statement = sid.map_or_else(|| position.to_string(), str::to_string);
    EngineError::InvalidPolicy(format!("statement {statement}: {reason}"))
}

fn exclusive<T>(
    position: usize,
    sid: Option<&str>,
    positive: Option<T>,
    negative: Option<T>,
    names: (&str, &str),
) -> Result<Option<(T, bool)>, EngineError> {
    match (positive, negative) {
        (Some(_), Some(_)) => Err(invalid(
            position,
            sid,
            &format!("has both {} and {}", names.0, names.1),
        )),
        (Some(value), None) => Ok(Some((value, false))),
        (None, Some(value)) => Ok(Some((value, true))),
        (None, None) => Ok(None),
    }
}

fn principals(document: PrincipalDocument) -> Result<Vec<PolicyPrincipal>, EngineError> {
    match document {
        PrincipalDocument::Wildcard(value) if value == "*" => Ok(vec![PolicyPrincipal::Wildcard]),
        PrincipalDocument::Wildcard(value) => Err(EngineError::InvalidPolicy(format!(
            "principal must be \"*\" or a map, got \"{value}\""
        ))),
        PrincipalDocument::Typed(map) => {
            let mut principals = Vec::new();
            for (kind, values) in map {
                let make: fn(String) -> PolicyPrincipal = match kind.as_str() {
                    "AWS" => PolicyPrincipal::Aws,
                    "Service" => PolicyPrincipal::Service,
                    "Federated" => PolicyPrincipal::Federated,
                    "CanonicalUser" => PolicyPrincipal::CanonicalUser,
                    other => {
                        return Err(EngineError::InvalidPolicy(format!(
                            "unknown principal type {other}"
                        )));
                    }
                };
                principals.extend(values.into_vec().into_iter().map(make));
            }
            Ok(principals)
        }
    }
}

/// Condition values are compared as strings; scalars keep their JSON text.
fn condition_value(value: Value) -> Result<String, EngineError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(EngineError::InvalidPolicy(format!(
            "condition values must be strings, numbers or booleans, got {other}"
        ))),
    }
}

fn statement(position: usize, document: StatementDocument) -> Result<Statement, EngineError> {
    let sid = document.sid.as_deref();

    let action = match exclusive(
        position,
        sid,
        document.action,
        document.not_action,
        ("Action", "NotAction"),
    )? {
        Some((values, false)) => ActionElement::Action(values.into_vec()),
        Some((values, true)) => ActionElement::NotAction(values.into_vec()),
        None => return Err(invalid(position, sid, "has neither Action nor NotAction")),
    };

    let resource = exclusive(
        position,
        sid,
        document.resource,
        document.not_resource,
        ("Resource", "NotResource"),
    )?
    .map(|(values, not)| match not {
        false => ResourceElement::Resource(values.into_vec()),
        true => ResourceElement::NotResource(values.into_vec()),
    });

    let principal = match exclusive(
        position,
        sid,
        document.principal,
        document.not_principal,
        ("Principal", "NotPrincipal"),
    )? {
        Some((value, false)) => Some(PrincipalElement::Principal(principals(value)?)),
        Some((value, true)) => Some(PrincipalElement::NotPrincipal(principals(value)?)),
        None => None,
    };

    let mut conditions = Vec::new();
    for (operation, keys) in document.condition {
        for (key, values) in keys {
            let values = values
                .into_vec()
                .into_iter()
                .map(condition_value)
                .collect::<Result<Vec<_>, _>>()?;
            conditions.push(Condition::new(operation.clone(), key, values));
        }
    }

    Ok(Statement {
        sid: document.sid,
        index: position,
        effect: document.effect,
        action,
        resource,
        principal,
        conditions,
    })
}

/// Map an IAM JSON policy document onto the policy AST.
///
/// The document is expected to be valid IAM; only the shape the evaluator
/// depends on is checked.
///
/// ```rust
/// use iam_eval_core::load_policy;
/// let policy = load_policy("ReadOnly", r#"{
///     "Version": "2012-10-17",
///     "Statement": {"Effect": "Allow", "Action": "s3:Get*", "Resource": "*"}
/// }"#).unwrap();
/// assert_eq!(policy.statements.len(), 1);
/// ```
pub fn load_policy(id: impl Into<String>, json: &str) -> Result<Policy, EngineError> {
    let document: PolicyDocument = serde_json::from_str(json)?;
    let statements = document
        .statement
        .into_vec()
        .into_iter()
        .enumerate()
        .map(|(i, document)| statement(i + 1, document))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Policy::new(id, statements))
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[test]
    fn test_load_full_statement() {
        let policy = load_policy(
            "bucket",
            r#"{
                "Version": "2012-10-17",
                "Statement": [{
                    "Sid": "CrossAccountRead",
                    "Effect": "Allow",
                    "Principal": {"AWS": ["444455556666", "arn:aws:iam::444455556666:role/Reader"], "Service": "cloudtrail.amazonaws.com"},
                    "Action": ["s3:GetObject", "s3:ListBucket"],
                    "Resource": "arn:aws:s3:::bucket/*",
                    "Condition": {
                        "Bool": {"aws:SecureTransport": true},
                        "NumericLessThan": {"s3:max-keys": 10},
                        "StringEquals": {"aws:PrincipalTag/team": ["a", "b"]}
                    }
                }]
            }"#,
        )
        .unwrap();

        let statement = &policy.statements[0];
        assert_eq!(statement.identifier(), "CrossAccountRead");
        assert_eq!(statement.effect, Effect::Allow);
        assert_eq!(
            statement.principal,
            Some(PrincipalElement::Principal(vec![
                PolicyPrincipal::Aws("444455556666".to_string()),
                PolicyPrincipal::Aws("arn:aws:iam::444455556666:role/Reader".to_string()),
                PolicyPrincipal::Service("cloudtrail.amazonaws.com".to_string()),
            ]))
        );
        assert_eq!(
            statement.conditions,
            vec![
                Condition::new("Bool", "aws:SecureTransport", ["true"]),
                Condition::new("NumericLessThan", "s3:max-keys", ["10"]),
                Condition::new("StringEquals", "aws:PrincipalTag/team", ["a", "b"]),
            ]
        );
    }

    #[test]
    fn test_single_statement_object() {
        let policy = load_policy(
            "deny",
            r#"{"Statement": {"Effect": "Deny", "NotAction": "iam:*", "NotResource": ["arn:aws:s3:::x"], "NotPrincipal": "*"}}"#,
        )
        .unwrap();
        let statement = &policy.statements[0];
        assert_eq!(statement.identifier(), "1");
        assert!(matches!(statement.action, ActionElement::NotAction(_)));
        assert!(matches!(statement.resource, Some(ResourceElement::NotResource(_))));
        assert_eq!(
            statement.principal,
            Some(PrincipalElement::NotPrincipal(vec![PolicyPrincipal::Wildcard]))
        );
    }

    #[parameterized(
        both_actions = { r#"{"Effect": "Allow", "Action": "s3:*", "NotAction": "iam:*", "Resource": "*"}"#, "statement 1: has both Action and NotAction" },
        no_action = { r#"{"Effect": "Allow", "Resource": "*"}"#, "statement 1: has neither Action nor NotAction" },
        both_resources = { r#"{"Sid": "S", "Effect": "Allow", "Action": "s3:*", "Resource": "*", "NotResource": "*"}"#, "statement S: has both Resource and NotResource" },
        both_principals = { r#"{"Effect": "Allow", "Action": "s3:*", "Principal": "*", "NotPrincipal": "*"}"#, "statement 1: has both Principal and NotPrincipal" },
        bad_principal = { r#"{"Effect": "Allow", "Action": "s3:*", "Principal": "alice"}"#, "principal must be \"*\" or a map, got \"alice\"" },
        bad_principal_type = { r#"{"Effect": "Allow", "Action": "s3:*", "Principal": {"Group": "x"}}"#, "unknown principal type Group" },
    )]
    fn test_invalid_statements(statement: &str, message: &str) {
        let json = format!(r#"{{"Statement": [{statement}]}}"#);
        let err = load_policy("p", &json).unwrap_err();
        assert_eq!(err, EngineError::InvalidPolicy(message.to_string()));
    }

    #[test]
    fn test_invalid_json() {
        let err = load_policy("p", r#"{"Statement": [{"Effect": "Maybe"}]}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPolicy(_)));
    }
}
