//! The condition operator catalog.
//!
//! Policy values are prepared once per condition (variables resolved,
//! literals parsed, patterns compiled) and then applied to each request
//! value. Malformed literals on either side never fail the evaluation; they
//! make the value non-matching and are reported in its [`ValueExplain`].

use std::cmp::Ordering;
use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::pattern::{compile_tokens, split_arn_pattern};
use crate::types::{RequestContext, ValueExplain};
use crate::variables::{Resolution, resolve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, Display, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum ConditionOperator {
    StringEquals,
    StringNotEquals,
    StringEqualsIgnoreCase,
    StringNotEqualsIgnoreCase,
    StringLike,
    StringNotLike,
    NumericEquals,
    NumericNotEquals,
    NumericLessThan,
    NumericLessThanEquals,
    NumericGreaterThan,
    NumericGreaterThanEquals,
    DateEquals,
    DateNotEquals,
    DateLessThan,
    DateLessThanEquals,
    DateGreaterThan,
    DateGreaterThanEquals,
    Bool,
    BinaryEquals,
    IpAddress,
    NotIpAddress,
    ArnEquals,
    ArnLike,
    ArnNotEquals,
    ArnNotLike,
    Null,
}

impl ConditionOperator {
    /// Operators whose name contains "Not". They match only when no policy
    /// value matches.
    pub fn is_negative(&self) -> bool {
        self.as_ref().to_ascii_lowercase().contains("not")
    }

    pub fn supports_wildcards(&self) -> bool {
        use ConditionOperator::*;
        matches!(self, StringLike | StringNotLike | ArnLike | ArnNotLike)
    }

    /// The ordering of request value to policy value that satisfies the
    /// positive form of a numeric or date operator.
    fn accepts(&self, ordering: Ordering) -> bool {
        use ConditionOperator::*;
        match self {
            NumericLessThan | DateLessThan => ordering == Ordering::Less,
            NumericLessThanEquals | DateLessThanEquals => ordering != Ordering::Greater,
            NumericGreaterThan | DateGreaterThan => ordering == Ordering::Greater,
            NumericGreaterThanEquals | DateGreaterThanEquals => ordering != Ordering::Less,
            _ => ordering == Ordering::Equal,
        }
    }

    /// Prepare the policy values of one condition.
    pub fn prepare(self, values: &[String], context: &RequestContext) -> PreparedOperator {
        PreparedOperator {
            operator: self,
            values: values
                .iter()
                .map(|value| PreparedValue::new(self, value, context))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
enum SegmentMatcher {
    Exact(String),
    Pattern(Regex),
}

impl SegmentMatcher {
    fn matches(&self, value: &str) -> bool {
        match self {
            SegmentMatcher::Exact(expected) => expected.to_lowercase() == value.to_lowercase(),
            SegmentMatcher::Pattern(re) => re.is_match(value),
        }
    }
}

#[derive(Debug, Clone)]
enum ValueMatcher {
    /// The policy value could not be prepared; see the explain errors.
    Never,
    Text { value: String, ignore_case: bool },
    Pattern(Regex),
    Number(f64),
    Date(DateTime<Utc>),
    Cidr(Cidr),
    Arn(Vec<SegmentMatcher>),
}

#[derive(Debug, Clone)]
struct PreparedValue {
    explain: ValueExplain,
    matcher: ValueMatcher,
}

fn resolved(
    operator: ConditionOperator,
    value: &str,
    context: &RequestContext,
    explain: &mut ValueExplain,
) -> Option<Resolution> {
    let resolution = resolve(value, context, operator.supports_wildcards());
    if resolution.substituted {
        explain.resolved_value = Some(resolution.text());
    }
    if resolution.is_unmatchable() {
        explain.errors.extend(resolution.errors);
        return None;
    }
    Some(resolution)
}

impl PreparedValue {
    fn new(operator: ConditionOperator, value: &str, context: &RequestContext) -> Self {
        use ConditionOperator::*;
        let mut explain = ValueExplain::new(value);
        let matcher = match operator {
            // evaluated against key presence by the condition evaluator
            Null => ValueMatcher::Text {
                value: value.to_string(),
                ignore_case: true,
            },
            StringEquals | StringNotEquals | BinaryEquals => {
                match resolved(operator, value, context, &mut explain) {
                    Some(r) => ValueMatcher::Text {
                        value: r.text(),
                        ignore_case: false,
                    },
                    None => ValueMatcher::Never,
                }
            }
            StringEqualsIgnoreCase | StringNotEqualsIgnoreCase | Bool => {
                match resolved(operator, value, context, &mut explain) {
                    Some(r) => ValueMatcher::Text {
                        value: r.text(),
                        ignore_case: true,
                    },
                    None => ValueMatcher::Never,
                }
            }
            StringLike | StringNotLike => {
                match resolved(operator, value, context, &mut explain)
                    .map(|r| compile_tokens(&r.tokens))
                {
                    Some(Ok(re)) => ValueMatcher::Pattern(re),
                    Some(Err(e)) => {
                        explain.errors.push(format!("{value} is not a usable pattern: {e}"));
                        ValueMatcher::Never
                    }
                    None => ValueMatcher::Never,
                }
            }
            NumericEquals
            | NumericNotEquals
            | NumericLessThan
            | NumericLessThanEquals
            | NumericGreaterThan
            | NumericGreaterThanEquals => match parse_number(value) {
                Ok(n) => ValueMatcher::Number(n),
                Err(e) => {
                    explain.errors.push(e);
                    ValueMatcher::Never
                }
            },
            DateEquals | DateNotEquals | DateLessThan | DateLessThanEquals | DateGreaterThan
            | DateGreaterThanEquals => match parse_date(value) {
                Ok(d) => ValueMatcher::Date(d),
                Err(e) => {
                    explain.errors.push(e);
                    ValueMatcher::Never
                }
            },
            IpAddress | NotIpAddress => match Cidr::parse(value) {
                Ok(c) => ValueMatcher::Cidr(c),
                Err(e) => {
                    explain.errors.push(e);
                    ValueMatcher::Never
                }
            },
            ArnEquals | ArnNotEquals | ArnLike | ArnNotLike => {
                prepare_arn(operator, value, context, &mut explain)
            }
        };
        PreparedValue { explain, matcher }
    }

    fn failed(&self) -> bool {
        matches!(self.matcher, ValueMatcher::Never)
    }

    /// Whether the positive form of `operator` accepts `request_value`.
    fn positive_match(
        &self,
        operator: ConditionOperator,
        request_value: &str,
    ) -> Result<bool, String> {
        match &self.matcher {
            ValueMatcher::Never => Ok(false),
            ValueMatcher::Text { value, ignore_case } => Ok(if *ignore_case {
                value.to_lowercase() == request_value.to_lowercase()
            } else {
                value == request_value
            }),
            ValueMatcher::Pattern(re) => Ok(re.is_match(request_value)),
            ValueMatcher::Number(expected) => {
                let actual = parse_number(request_value)?;
                Ok(actual
                    .partial_cmp(expected)
                    .is_some_and(|ordering| operator.accepts(ordering)))
            }
            ValueMatcher::Date(expected) => {
                let actual = parse_date(request_value)?;
                Ok(operator.accepts(actual.cmp(expected)))
            }
            ValueMatcher::Cidr(cidr) => {
                let ip: IpAddr = request_value
                    .trim()
                    .parse()
                    .map_err(|_| format!("{request_value} is not a valid IP address"))?;
                Ok(cidr.contains(ip))
            }
            ValueMatcher::Arn(segments) => {
                let Some(actual) = split_arn_pattern(request_value) else {
                    return Err(format!("{request_value} is not a valid ARN"));
                };
                Ok(segments
                    .iter()
                    .zip(actual.iter())
                    .all(|(matcher, value)| matcher.matches(value)))
            }
        }
    }
}

fn prepare_arn(
    operator: ConditionOperator,
    value: &str,
    context: &RequestContext,
    explain: &mut ValueExplain,
) -> ValueMatcher {
    let Some(segments) = split_arn_pattern(value) else {
        explain.errors.push(format!("{value} is not a valid ARN"));
        return ValueMatcher::Never;
    };
    let mut matchers = Vec::with_capacity(5);
    let mut resolved_segments = Vec::with_capacity(5);
    let mut substituted = false;
    for segment in segments {
        let resolution = resolve(segment, context, operator.supports_wildcards());
        substituted |= resolution.substituted;
        resolved_segments.push(resolution.text());
        if resolution.is_unmatchable() {
            explain.errors.extend(resolution.errors);
            continue;
        }
        let matcher = match resolution.literal() {
            Some(text) => SegmentMatcher::Exact(text),
            None => match compile_tokens(&resolution.tokens) {
                Ok(re) => SegmentMatcher::Pattern(re),
                Err(e) => {
                    explain.errors.push(format!("{value} is not a usable pattern: {e}"));
                    return ValueMatcher::Never;
                }
            },
        };
        matchers.push(matcher);
    }
    if substituted {
        explain.resolved_value = Some(format!("arn:{}", resolved_segments.join(":")));
    }
    if !explain.errors.is_empty() {
        return ValueMatcher::Never;
    }
    ValueMatcher::Arn(matchers)
}

fn parse_number(value: &str) -> Result<f64, String> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| format!("{value} is not a valid number"))
}

/// Parse ISO-8601 dates and epoch-millisecond integers.
pub fn parse_date(value: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = value.trim();
    let invalid = || format!("{value} is not a valid date");
    if let Ok(millis) = trimmed.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis).ok_or_else(invalid);
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(date.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(date) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(date.and_utc());
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
        .ok_or_else(invalid)
}

/// An IPv4 or IPv6 network in CIDR notation. A bare address is a host route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    network: IpAddr,
    prefix: u8,
}

impl Cidr {
    pub fn parse(value: &str) -> Result<Self, String> {
        let invalid = || format!("{value} is not a valid CIDR block");
        let trimmed = value.trim();
        let (address, prefix) = match trimmed.split_once('/') {
            Some((address, prefix)) => (address, Some(prefix)),
            None => (trimmed, None),
        };
        let network: IpAddr = address.parse().map_err(|_| invalid())?;
        let max = if network.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix {
            Some(prefix) => prefix.parse::<u8>().map_err(|_| invalid())?,
            None => max,
        };
        if prefix > max {
            return Err(invalid());
        }
        Ok(Cidr { network, prefix })
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(network), IpAddr::V4(ip)) => {
                let mask = u32::MAX
                    .checked_shl(32 - u32::from(self.prefix))
                    .unwrap_or(0);
                u32::from(network) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(network), IpAddr::V6(ip)) => {
                let mask = u128::MAX
                    .checked_shl(128 - u32::from(self.prefix))
                    .unwrap_or(0);
                u128::from(network) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

/// The result of applying an operator to one request value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorOutcome {
    pub matches: bool,
    pub values: Vec<ValueExplain>,
}

/// A condition operator with its policy values prepared.
#[derive(Debug, Clone)]
pub struct PreparedOperator {
    operator: ConditionOperator,
    values: Vec<PreparedValue>,
}

impl PreparedOperator {
    /// Explains for the policy values without any request value, used when
    /// the key is absent.
    pub fn explains(&self) -> Vec<ValueExplain> {
        self.values.iter().map(|v| v.explain.clone()).collect()
    }

    /// Apply the operator to one request value.
    ///
    /// Positive operators match when any policy value matches. Negative
    /// operators match when every policy value fails its positive test
    /// without error.
    pub fn evaluate(&self, request_value: &str) -> OperatorOutcome {
        let negative = self.operator.is_negative();
        let values: Vec<ValueExplain> = self
            .values
            .iter()
            .map(|prepared| {
                let mut explain = prepared.explain.clone();
                let (positive, errored) =
                    match prepared.positive_match(self.operator, request_value) {
                        Ok(positive) => (positive, prepared.failed()),
                        Err(e) => {
                            explain.errors.push(e);
                            (false, true)
                        }
                    };
                explain.matches = !errored && (positive != negative);
                explain
            })
            .collect();
        let matches = if negative {
            values.iter().all(|v| v.matches)
        } else {
            values.iter().any(|v| v.matches)
        };
        OperatorOutcome { matches, values }
    }
}
