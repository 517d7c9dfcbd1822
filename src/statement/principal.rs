use crate::types::{PolicyPrincipal, PrincipalElement, PrincipalIdentity, PrincipalMatchResult};

/// Result of matching a principal element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrincipalMatch {
    pub result: PrincipalMatchResult,
    /// The match only holds because the role session name was ignored.
    pub ignored_role_session_name: bool,
}

impl PrincipalMatch {
    fn of(result: PrincipalMatchResult) -> Self {
        PrincipalMatch {
            result,
            ignored_role_session_name: false,
        }
    }
}

/// The request side of a principal comparison.
pub struct PrincipalProbe<'a> {
    pub principal: &'a str,
    pub identity: &'a PrincipalIdentity,
    /// Allow assumed-role session principals to match any session of the
    /// same role (discovery mode, Allow statements).
    pub ignore_session_name: bool,
}

impl PrincipalProbe<'_> {
    fn aws_match(&self, value: &str) -> PrincipalMatch {
        if value == "*" || value == self.principal {
            return PrincipalMatch::of(PrincipalMatchResult::Match);
        }
        let policy = PrincipalIdentity::classify(value);
        let result = match (&policy, self.identity) {
            (PrincipalIdentity::Account { account }, identity) => {
                if identity.account() == Some(account.as_str()) {
                    PrincipalMatchResult::AccountLevelMatch
                } else {
                    PrincipalMatchResult::NoMatch
                }
            }
            (
                PrincipalIdentity::IamRole {
                    partition,
                    account,
                    role_name,
                },
                PrincipalIdentity::AssumedRoleSession {
                    partition: session_partition,
                    account: session_account,
                    role_name: session_role,
                    ..
                },
            ) if partition == session_partition
                && account == session_account
                && role_name == session_role =>
            {
                PrincipalMatchResult::SessionRoleMatch
            }
            (
                PrincipalIdentity::IamUser {
                    partition,
                    account,
                    user_name,
                },
                PrincipalIdentity::FederatedUserSession {
                    partition: session_partition,
                    account: session_account,
                    user_name: session_user,
                },
            ) if partition == session_partition
                && account == session_account
                && user_name == session_user =>
            {
                PrincipalMatchResult::SessionUserMatch
            }
            (
                PrincipalIdentity::AssumedRoleSession {
                    partition,
                    account,
                    role_name,
                    ..
                },
                PrincipalIdentity::AssumedRoleSession {
                    partition: session_partition,
                    account: session_account,
                    role_name: session_role,
                    ..
                },
            ) if self.ignore_session_name
                && partition == session_partition
                && account == session_account
                && role_name == session_role =>
            {
                return PrincipalMatch {
                    result: PrincipalMatchResult::Match,
                    ignored_role_session_name: true,
                };
            }
            _ => PrincipalMatchResult::NoMatch,
        };
        PrincipalMatch::of(result)
    }

    pub fn matches(&self, principal: &PolicyPrincipal) -> PrincipalMatch {
        match principal {
            PolicyPrincipal::Wildcard => PrincipalMatch::of(PrincipalMatchResult::Match),
            PolicyPrincipal::Service(value)
            | PolicyPrincipal::Federated(value)
            | PolicyPrincipal::CanonicalUser(value) => {
                PrincipalMatch::of(if value == self.principal {
                    PrincipalMatchResult::Match
                } else {
                    PrincipalMatchResult::NoMatch
                })
            }
            PolicyPrincipal::Aws(value) => self.aws_match(value),
        }
    }

    /// The strongest match among the listed principals. On equal strength a
    /// match that did not ignore the session name wins.
    pub fn strongest(&self, principals: &[PolicyPrincipal]) -> PrincipalMatch {
        principals
            .iter()
            .map(|p| self.matches(p))
            .fold(PrincipalMatch::of(PrincipalMatchResult::NoMatch), |best, m| {
                let stronger = m.result.strength() > best.result.strength();
                let same_but_cleaner = m.result.strength() == best.result.strength()
                    && best.ignored_role_session_name
                    && !m.ignored_role_session_name;
                if stronger || same_but_cleaner { m } else { best }
            })
    }

    /// Match a `Principal` / `NotPrincipal` element.
    pub fn element_matches(&self, element: &PrincipalElement) -> PrincipalMatch {
        match element {
            PrincipalElement::Principal(principals) => self.strongest(principals),
            PrincipalElement::NotPrincipal(principals) => {
                let excluded = principals.iter().any(|p| self.matches(p).result.is_match());
                PrincipalMatch::of(if excluded {
                    PrincipalMatchResult::NoMatch
                } else {
                    PrincipalMatchResult::Match
                })
            }
        }
    }
}
