//! Request context values consulted by policy conditions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A context value: either a single string or a multi-valued array.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum ContextValue {
    Single(String),
    Multi(Vec<String>),
}

impl ContextValue {
    /// The values as a slice-like list; a single value becomes one element.
    pub fn to_values(&self) -> Vec<String> {
        match self {
            ContextValue::Single(value) => vec![value.clone()],
            ContextValue::Multi(values) => values.clone(),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Single(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Single(value)
    }
}

impl From<Vec<String>> for ContextValue {
    fn from(values: Vec<String>) -> Self {
        ContextValue::Multi(values)
    }
}

impl From<Vec<&str>> for ContextValue {
    fn from(values: Vec<&str>) -> Self {
        ContextValue::Multi(values.into_iter().map(str::to_string).collect())
    }
}

/// Context keys for a request. Lookups are case-insensitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    from = "BTreeMap<String, ContextValue>",
    into = "BTreeMap<String, ContextValue>"
)]
pub struct RequestContext {
    values: BTreeMap<String, ContextValue>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one context key and return the updated context.
    pub fn with_value(mut self, key: impl AsRef<str>, value: impl Into<ContextValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(
        &mut self,
        key: impl AsRef<str>,
        value: impl Into<ContextValue>,
    ) -> Option<ContextValue> {
        self.values
            .insert(key.as_ref().to_ascii_lowercase(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(&key.to_ascii_lowercase())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Iterate over keys (lowercased) and values.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
        self.values.iter()
    }
}

impl From<BTreeMap<String, ContextValue>> for RequestContext {
    fn from(value: BTreeMap<String, ContextValue>) -> Self {
        value
            .into_iter()
            .fold(RequestContext::new(), |ctx, (key, value)| {
                ctx.with_value(key, value)
            })
    }
}

impl From<RequestContext> for BTreeMap<String, ContextValue> {
    fn from(value: RequestContext) -> Self {
        value.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let context = RequestContext::new().with_value("aws:PrincipalTag/Team", "platform");
        assert_eq!(
            context.get("AWS:principaltag/team"),
            Some(&ContextValue::Single("platform".to_string()))
        );
        assert!(context.contains_key("aws:principaltag/TEAM"));
        assert!(!context.contains_key("aws:username"));
    }

    #[test]
    fn test_insert_replaces_differently_cased_key() {
        let mut context = RequestContext::new();
        context.insert("aws:SourceVpc", "vpc-1");
        let previous = context.insert("AWS:SOURCEVPC", "vpc-2");
        assert_eq!(previous, Some(ContextValue::Single("vpc-1".to_string())));
        assert_eq!(context.len(), 1);
    }

    #[test]
    fn test_deserialize_single_and_multi_values() {
        let context: RequestContext = serde_json::from_value(serde_json::json!({
            "aws:SourceIp": "10.0.0.1",
            "aws:TagKeys": ["env", "team"]
        }))
        .unwrap();

        assert_eq!(
            context.get("aws:sourceip"),
            Some(&ContextValue::Single("10.0.0.1".to_string()))
        );
        assert_eq!(
            context.get("aws:tagkeys").map(ContextValue::to_values),
            Some(vec!["env".to_string(), "team".to_string()])
        );
    }

    #[test]
    fn test_serializes_with_lowercased_keys() {
        let context = RequestContext::new().with_value("aws:TagKeys", vec!["a", "b"]);
        insta::assert_json_snapshot!(context, @r#"
        {
          "aws:tagkeys": [
            "a",
            "b"
          ]
        }
        "#);
    }
}
