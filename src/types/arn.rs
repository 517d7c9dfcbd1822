//! Amazon Resource Names and principal identity classification.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A parsed ARN, `arn:partition:service:region:account:resource`.
///
/// The resource segment keeps any further `:` separators, so
/// `arn:aws:logs:us-east-1:111122223333:log-group:app:*` has the resource
/// `log-group:app:*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account: String,
    pub resource: String,
}

impl Arn {
    /// Parse an ARN, returning `None` when the value is not a six-part ARN.
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" {
            return None;
        }
        Some(Arn {
            partition: parts[1].to_string(),
            service: parts[2].to_string(),
            region: parts[3].to_string(),
            account: parts[4].to_string(),
            resource: parts[5].to_string(),
        })
    }
}

impl Display for Arn {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account, self.resource
        )
    }
}

impl FromStr for Arn {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arn::parse(s).ok_or_else(|| {
            EngineError::InvalidFormat(format!(
                "'{s}' is not an ARN (expected format: arn:partition:service:region:account:resource)"
            ))
        })
    }
}

/// Split the resource segment into its product prefix and the remainder.
///
/// The product runs up to the first `/` or `:`; the remainder keeps the
/// separator. A resource without a separator has an empty product.
pub fn split_resource_product(resource: &str) -> (&str, &str) {
    match resource.find(['/', ':']) {
        Some(idx) => resource.split_at(idx),
        None => ("", resource),
    }
}

/// What kind of identity a request principal string names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalIdentity {
    /// `arn:aws:sts::111122223333:assumed-role/RoleName/session`
    AssumedRoleSession {
        partition: String,
        account: String,
        role_name: String,
        session_name: String,
    },
    /// `arn:aws:sts::111122223333:federated-user/UserName`
    FederatedUserSession {
        partition: String,
        account: String,
        user_name: String,
    },
    /// `arn:aws:iam::111122223333:user/path/UserName`
    IamUser {
        partition: String,
        account: String,
        user_name: String,
    },
    /// `arn:aws:iam::111122223333:role/path/RoleName`
    IamRole {
        partition: String,
        account: String,
        role_name: String,
    },
    /// A bare 12-digit account id or `arn:aws:iam::111122223333:root`.
    Account { account: String },
    /// Any other ARN principal.
    OtherArn(Arn),
    /// Service principals, canonical users, federated providers and the like.
    Opaque,
}

impl PrincipalIdentity {
    pub fn classify(principal: &str) -> Self {
        if is_account_id(principal) {
            return PrincipalIdentity::Account {
                account: principal.to_string(),
            };
        }
        let Some(arn) = Arn::parse(principal) else {
            return PrincipalIdentity::Opaque;
        };

        let last_path_segment = |rest: &str| rest.rsplit('/').next().unwrap_or(rest).to_string();

        let service = arn.service.clone();
        match service.as_str() {
            "sts" => {
                if let Some(rest) = arn.resource.strip_prefix("assumed-role/") {
                    if let Some((role_name, session_name)) = rest.split_once('/') {
                        return PrincipalIdentity::AssumedRoleSession {
                            partition: arn.partition,
                            account: arn.account,
                            role_name: role_name.to_string(),
                            session_name: session_name.to_string(),
                        };
                    }
                }
                if let Some(user_name) = arn.resource.strip_prefix("federated-user/") {
                    return PrincipalIdentity::FederatedUserSession {
                        partition: arn.partition,
                        account: arn.account,
                        user_name: user_name.to_string(),
                    };
                }
                PrincipalIdentity::OtherArn(arn)
            }
            "iam" => {
                if arn.resource == "root" {
                    return PrincipalIdentity::Account {
                        account: arn.account,
                    };
                }
                if let Some(rest) = arn.resource.strip_prefix("user/") {
                    return PrincipalIdentity::IamUser {
                        user_name: last_path_segment(rest),
                        partition: arn.partition,
                        account: arn.account,
                    };
                }
                if let Some(rest) = arn.resource.strip_prefix("role/") {
                    return PrincipalIdentity::IamRole {
                        role_name: last_path_segment(rest),
                        partition: arn.partition,
                        account: arn.account,
                    };
                }
                PrincipalIdentity::OtherArn(arn)
            }
            _ => PrincipalIdentity::OtherArn(arn),
        }
    }

    /// The owning account, when the identity carries one.
    pub fn account(&self) -> Option<&str> {
        match self {
            PrincipalIdentity::AssumedRoleSession { account, .. }
            | PrincipalIdentity::FederatedUserSession { account, .. }
            | PrincipalIdentity::IamUser { account, .. }
            | PrincipalIdentity::IamRole { account, .. }
            | PrincipalIdentity::Account { account } => Some(account),
            PrincipalIdentity::OtherArn(arn) if !arn.account.is_empty() => Some(&arn.account),
            PrincipalIdentity::OtherArn(_) | PrincipalIdentity::Opaque => None,
        }
    }

    /// Assumed-role sessions, IAM users and federated-user sessions.
    pub fn is_session_or_user(&self) -> bool {
        matches!(
            self,
            PrincipalIdentity::AssumedRoleSession { .. }
                | PrincipalIdentity::FederatedUserSession { .. }
                | PrincipalIdentity::IamUser { .. }
        )
    }
}

pub fn is_account_id(value: &str) -> bool {
    value.len() == 12 && value.bytes().all(|b| b.is_ascii_digit())
}
