//! The request being authorized.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

use super::arn::PrincipalIdentity;
use super::context::RequestContext;

/// The resource a request targets, and the account that owns it.
///
/// The owning account is supplied independently because many resource ARNs
/// (S3 buckets, for example) carry no account segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestResource {
    pub arn: String,
    pub account_id: String,
}

impl RequestResource {
    pub fn new(arn: impl Into<String>, account_id: impl Into<String>) -> Self {
        RequestResource {
            arn: arn.into(),
            account_id: account_id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    pub principal: String,
    /// `service:ActionName`, e.g. `s3:GetObject`.
    pub action: String,
    pub resource: RequestResource,
    #[serde(default)]
    pub context: RequestContext,
}

impl Request {
    pub fn new(
        principal: impl Into<String>,
        action: impl Into<String>,
        resource: RequestResource,
    ) -> Self {
        Request {
            principal: principal.into(),
            action: action.into(),
            resource,
            context: RequestContext::new(),
        }
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Split the action into `(service, name)`.
    pub fn service_and_name(&self) -> Result<(&str, &str), EngineError> {
        match self.action.split_once(':') {
            Some((service, name)) if !service.is_empty() && !name.is_empty() => {
                Ok((service, name))
            }
            _ => Err(EngineError::InvalidFormat(format!(
                "Failed to parse action '{}' (expected format: service:ActionName)",
                self.action
            ))),
        }
    }

    /// The lowercase service prefix of the action.
    pub fn service(&self) -> Result<String, EngineError> {
        self.service_and_name()
            .map(|(service, _)| service.to_ascii_lowercase())
    }

    pub fn principal_identity(&self) -> PrincipalIdentity {
        PrincipalIdentity::classify(&self.principal)
    }

    /// The principal's account, when it can be derived from the principal.
    pub fn principal_account(&self) -> Option<String> {
        self.principal_identity().account().map(str::to_string)
    }

    pub fn is_same_account(&self) -> bool {
        self.principal_account().as_deref() == Some(self.resource.account_id.as_str())
    }
}

impl Display for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{} -> {} on {}",
            self.principal, self.action, self.resource.arn
        )
    }
}
