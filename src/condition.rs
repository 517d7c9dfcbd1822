//! Condition evaluation: set qualifiers, `IfExists`, `Null` and discovery
//! mode relaxation.

use itertools::Itertools;
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::debug;

use crate::operators::{ConditionOperator, OperatorOutcome, PreparedOperator};
use crate::types::{
    Condition, ConditionExplain, ConditionOutcome, ContextValue, Effect, EvaluationOptions,
    RequestContext, ValueExplain,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, Display)]
#[strum(ascii_case_insensitive)]
pub enum SetOperator {
    ForAllValues,
    ForAnyValue,
}

/// A condition operation name broken into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub set_operator: Option<SetOperator>,
    /// `None` when the base operator is not recognised.
    pub operator: Option<ConditionOperator>,
    pub if_exists: bool,
}

impl Operation {
    pub fn parse(name: &str) -> Self {
        let (set_operator, rest) = match name.split_once(':') {
            Some((prefix, rest)) => match prefix.parse::<SetOperator>() {
                Ok(set_operator) => (Some(set_operator), rest),
                Err(_) => {
                    return Operation {
                        set_operator: None,
                        operator: None,
                        if_exists: false,
                    };
                }
            },
            None => (None, name),
        };

        const SUFFIX: &str = "ifexists";
        let lowered = rest.to_ascii_lowercase();
        let (base, if_exists) = if lowered.len() > SUFFIX.len() && lowered.ends_with(SUFFIX) {
            (&rest[..rest.len() - SUFFIX.len()], true)
        } else {
            (rest, false)
        };

        let operator = base
            .parse::<ConditionOperator>()
            .ok()
            .filter(|op| !(if_exists && *op == ConditionOperator::Null));

        Operation {
            set_operator,
            operator,
            if_exists,
        }
    }
}

fn null_check(condition: &Condition, context: &RequestContext, explain: &mut ConditionExplain) {
    let present = context.contains_key(&condition.key);
    explain.values = condition
        .values
        .iter()
        .map(|value| {
            let mut value_explain = ValueExplain::new(value);
            match value.to_ascii_lowercase().as_str() {
                "true" => value_explain.matches = !present,
                "false" => value_explain.matches = present,
                _ => value_explain
                    .errors
                    .push(format!("{value} is not a valid value for Null, expected true or false")),
            }
            value_explain
        })
        .collect();
    explain.outcome = ConditionOutcome::from_bool(explain.values.iter().any(|v| v.matches));
}

/// Fold the per-element outcomes of a set operator into one explain per
/// policy value: a value matches if it matched any element.
fn merge_values(prepared: &PreparedOperator, outcomes: &[OperatorOutcome]) -> Vec<ValueExplain> {
    let mut merged = prepared.explains();
    for outcome in outcomes {
        for (target, value) in merged.iter_mut().zip(&outcome.values) {
            target.matches |= value.matches;
            target.errors.extend(value.errors.iter().cloned());
        }
    }
    for value in &mut merged {
        value.errors = std::mem::take(&mut value.errors)
            .into_iter()
            .unique()
            .collect();
    }
    merged
}

/// Evaluate one condition against the request context.
pub fn evaluate_condition(condition: &Condition, context: &RequestContext) -> ConditionExplain {
    let mut explain = ConditionExplain::new(&condition.operation, &condition.key);
    let operation = Operation::parse(&condition.operation);

    let Some(operator) = operation.operator else {
        debug!(
            event = "Condition",
            operation = %condition.operation,
            key = %condition.key,
            "Unknown condition operator"
        );
        explain.outcome = ConditionOutcome::Unknown;
        explain.errors.push(format!(
            "{} is not a supported condition operator",
            condition.operation
        ));
        return explain;
    };

    if operator == ConditionOperator::Null {
        null_check(condition, context, &mut explain);
        return explain;
    }

    let prepared = operator.prepare(&condition.values, context);
    let value = context.get(&condition.key);

    match operation.set_operator {
        None => match value {
            None => {
                let matched = operator.is_negative() || operation.if_exists;
                explain.outcome = ConditionOutcome::from_bool(matched);
                explain.matched_because_missing = matched;
                explain.failed_because_missing = !matched;
                explain.values = prepared.explains();
            }
            Some(ContextValue::Multi(_)) => {
                explain.outcome = ConditionOutcome::NoMatch;
                explain.failed_because_array = true;
                explain.values = prepared.explains();
            }
            Some(ContextValue::Single(value)) => {
                let outcome = prepared.evaluate(value);
                explain.outcome = ConditionOutcome::from_bool(outcome.matches);
                explain.values = outcome.values;
            }
        },
        Some(SetOperator::ForAnyValue) => match value {
            Some(ContextValue::Multi(elements)) => {
                let outcomes: Vec<OperatorOutcome> =
                    elements.iter().map(|e| prepared.evaluate(e)).collect();
                explain.outcome =
                    ConditionOutcome::from_bool(outcomes.iter().any(|o| o.matches));
                explain.values = merge_values(&prepared, &outcomes);
            }
            Some(ContextValue::Single(_)) => {
                explain.outcome = ConditionOutcome::NoMatch;
                explain.values = prepared.explains();
                explain.errors.push(format!(
                    "{} is a single value context key, ForAnyValue requires multiple values",
                    condition.key
                ));
            }
            None => {
                explain.outcome = ConditionOutcome::NoMatch;
                explain.failed_because_missing = true;
                explain.values = prepared.explains();
            }
        },
        Some(SetOperator::ForAllValues) => match value {
            Some(value) => {
                let elements = value.to_values();
                let outcomes: Vec<OperatorOutcome> =
                    elements.iter().map(|e| prepared.evaluate(e)).collect();
                explain.unmatched_values = elements
                    .iter()
                    .zip(&outcomes)
                    .filter(|(_, outcome)| !outcome.matches)
                    .map(|(element, _)| element.clone())
                    .collect();
                explain.outcome = ConditionOutcome::from_bool(explain.unmatched_values.is_empty());
                explain.values = merge_values(&prepared, &outcomes);
            }
            None => {
                explain.outcome = ConditionOutcome::Match;
                explain.matched_because_missing = true;
                explain.values = prepared.explains();
            }
        },
    }
    explain
}

/// The combined outcome of a statement's condition block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementConditions {
    pub outcome: ConditionOutcome,
    pub conditions: Vec<ConditionExplain>,
    pub ignored: Vec<ConditionExplain>,
}

/// Evaluate every condition of a statement; the block matches only if all do.
///
/// In discovery mode, a failing condition on a key that is not strict is
/// reported as ignored. Only Allow statements have those conditions relaxed;
/// a Deny keeps failing on them. Unknown operators are never relaxed.
pub fn evaluate_statement_conditions(
    conditions: &[Condition],
    context: &RequestContext,
    effect: Effect,
    options: &EvaluationOptions,
) -> StatementConditions {
    let mut failed = false;
    let mut ignored = Vec::new();
    let mut explains = Vec::with_capacity(conditions.len());

    for condition in conditions {
        let explain = evaluate_condition(condition, context);
        if explain.outcome == ConditionOutcome::NoMatch
            && options.is_discovery()
            && !options.strict_condition_keys.is_strict(&condition.key)
        {
            ignored.push(explain.clone());
            if effect == Effect::Deny {
                failed = true;
            }
        } else if !explain.matches() {
            failed = true;
        }
        explains.push(explain);
    }

    StatementConditions {
        outcome: ConditionOutcome::from_bool(!failed),
        conditions: explains,
        ignored,
    }
}
