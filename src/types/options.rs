//! Evaluation options.

use std::collections::BTreeSet;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::error::EngineError;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    Serialize,
    Deserialize,
    ToSchema,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SimulationMode {
    /// Conditions are evaluated against the supplied context as-is.
    #[default]
    Strict,
    /// Failing conditions on non-strict keys are relaxed for Allow statements
    /// and reported as ignored.
    Discovery,
}

/// Condition keys that are never relaxed in discovery mode.
///
/// Entries are literal keys or `/regex/` patterns, both matched
/// case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct StrictConditionKeys {
    literals: BTreeSet<String>,
    patterns: Vec<Regex>,
}

impl StrictConditionKeys {
    pub fn new<I, S>(keys: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut strict = StrictConditionKeys::default();
        for key in keys {
            let key = key.as_ref();
            match key
                .strip_prefix('/')
                .and_then(|inner| inner.strip_suffix('/'))
            {
                Some("") => {
                    return Err(EngineError::InvalidStrictKey {
                        pattern: key.to_string(),
                        reason: "empty pattern".to_string(),
                    });
                }
                Some(pattern) => {
                    let regex = RegexBuilder::new(pattern)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| EngineError::InvalidStrictKey {
                            pattern: key.to_string(),
                            reason: e.to_string(),
                        })?;
                    strict.patterns.push(regex);
                }
                _ => {
                    strict.literals.insert(key.to_ascii_lowercase());
                }
            }
        }
        Ok(strict)
    }

    pub fn is_strict(&self, key: &str) -> bool {
        self.literals.contains(&key.to_ascii_lowercase())
            || self.patterns.iter().any(|re| re.is_match(key))
    }

    pub fn is_empty(&self) -> bool {
        self.literals.is_empty() && self.patterns.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EvaluationOptions {
    pub mode: SimulationMode,
    pub strict_condition_keys: StrictConditionKeys,
}

impl EvaluationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn discovery(strict_condition_keys: StrictConditionKeys) -> Self {
        EvaluationOptions {
            mode: SimulationMode::Discovery,
            strict_condition_keys,
        }
    }

    pub fn is_discovery(&self) -> bool {
        self.mode == SimulationMode::Discovery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        literal = { "aws:SourceVpc", true },
        literal_other_case = { "AWS:SOURCEVPC", true },
        pattern = { "aws:PrincipalTag/team", true },
        pattern_other_case = { "AWS:principaltag/Team", true },
        not_listed = { "aws:SourceIp", false },
    )]
    fn test_is_strict(key: &str, expected: bool) {
        let strict = StrictConditionKeys::new(["aws:sourcevpc", "/^aws:principaltag/.*$/"]).unwrap();
        assert_eq!(strict.is_strict(key), expected);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = StrictConditionKeys::new(["/aws:(/"]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidStrictKey { ref pattern, .. } if pattern == "/aws:(/"));
    }

    #[parameterized(
        anchored_prefix = { "/^aws:Resource/", "aws:ResourceTag/env", true },
        anchored_miss = { "/^aws:Resource/", "s3:aws:ResourceTag", false },
        unanchored = { "/Tag/", "aws:RequestTag/env", true },
        alternation = { "/^(aws:SourceIp|aws:SourceVpc)$/", "aws:sourcevpc", true },
        full_match_only = { "/^aws:SourceIp$/", "aws:SourceIpv6", false },
    )]
    fn test_pattern_keys(pattern: &str, key: &str, expected: bool) {
        let strict = StrictConditionKeys::new([pattern]).unwrap();
        assert_eq!(strict.is_strict(key), expected);
    }

    #[test]
    fn test_empty_pattern_is_rejected() {
        let err = StrictConditionKeys::new(["aws:SourceIp", "//"]).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"invalid strict condition key pattern //: empty pattern");
    }

    #[test]
    fn test_single_slash_is_literal() {
        let strict = StrictConditionKeys::new(["/"]).unwrap();
        assert!(strict.is_strict("/"));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("Discovery".parse::<SimulationMode>().unwrap(), SimulationMode::Discovery);
        assert_eq!(SimulationMode::default(), SimulationMode::Strict);
        assert!(EvaluationOptions::discovery(StrictConditionKeys::default()).is_discovery());
    }
}
