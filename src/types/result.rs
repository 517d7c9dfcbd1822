//! Verdict enums shared by the analyzer and the combinator.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use utoipa::ToSchema;

/// The final verdict for a request, or the verdict of one policy type.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EvaluationResult {
    Allowed,
    ExplicitlyDenied,
    ImplicitlyDenied,
}

impl EvaluationResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, EvaluationResult::Allowed)
    }
}

/// Resource policy verdict.
///
/// `AllowedForAccount` and `DeniedForAccount` are produced when the only
/// principal evidence is an account-level match.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceEvaluationResult {
    NotApplicable,
    Allowed,
    AllowedForAccount,
    ExplicitlyDenied,
    DeniedForAccount,
    ImplicitlyDenied,
}

/// How strongly a statement's principal element matched the request principal.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PrincipalMatchResult {
    Match,
    NoMatch,
    AccountLevelMatch,
    SessionRoleMatch,
    SessionUserMatch,
}

impl PrincipalMatchResult {
    /// Trust strength: exact and session matches outrank account-level ones.
    pub fn strength(&self) -> u8 {
        match self {
            PrincipalMatchResult::Match => 3,
            PrincipalMatchResult::SessionRoleMatch | PrincipalMatchResult::SessionUserMatch => 2,
            PrincipalMatchResult::AccountLevelMatch => 1,
            PrincipalMatchResult::NoMatch => 0,
        }
    }

    pub fn is_match(&self) -> bool {
        !matches!(self, PrincipalMatchResult::NoMatch)
    }

    /// Exact or session-derived matches.
    pub fn is_strong(&self) -> bool {
        self.strength() >= 2
    }

    /// Pick the stronger of two results.
    pub fn strongest(self, other: PrincipalMatchResult) -> PrincipalMatchResult {
        if other.strength() > self.strength() {
            other
        } else {
            self
        }
    }
}

/// Outcome of one condition or of a statement's condition block.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConditionOutcome {
    Match,
    NoMatch,
    /// The operator could not be interpreted. Treated as a failing condition.
    Unknown,
}

impl ConditionOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, ConditionOutcome::Match)
    }

    pub fn from_bool(matched: bool) -> Self {
        if matched {
            ConditionOutcome::Match
        } else {
            ConditionOutcome::NoMatch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        match_beats_session = { PrincipalMatchResult::SessionRoleMatch, PrincipalMatchResult::Match, PrincipalMatchResult::Match },
        session_beats_account = { PrincipalMatchResult::AccountLevelMatch, PrincipalMatchResult::SessionUserMatch, PrincipalMatchResult::SessionUserMatch },
        account_beats_nomatch = { PrincipalMatchResult::NoMatch, PrincipalMatchResult::AccountLevelMatch, PrincipalMatchResult::AccountLevelMatch },
        nomatch_stays = { PrincipalMatchResult::NoMatch, PrincipalMatchResult::NoMatch, PrincipalMatchResult::NoMatch },
    )]
    fn test_strongest(a: PrincipalMatchResult, b: PrincipalMatchResult, expected: PrincipalMatchResult) {
        assert_eq!(a.strongest(b), expected);
        assert_eq!(b.strongest(a), expected);
    }

    #[test]
    fn test_result_display_and_serde() {
        assert_eq!(EvaluationResult::ExplicitlyDenied.to_string(), "explicitly_denied");
        assert_eq!(
            serde_json::to_value(ResourceEvaluationResult::AllowedForAccount).unwrap(),
            serde_json::json!("allowed_for_account")
        );
    }
}
