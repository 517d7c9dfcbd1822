use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid policy document: {0}")]
    InvalidPolicy(String),

    #[error("malformed statement {statement} in {policy_kind} policy {policy}: {reason}")]
    MalformedStatement {
        policy_kind: String,
        policy: String,
        statement: String,
        reason: String,
    },

    #[error("invalid strict condition key pattern {pattern}: {reason}")]
    InvalidStrictKey { pattern: String, reason: String },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::InvalidPolicy(err.to_string())
    }
}
