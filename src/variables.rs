//! Policy variable substitution (`${aws:username}`, `${key, 'default'}`).
//!
//! Substituted values are always literal text. A variable that cannot be
//! resolved makes the whole value unmatchable and records an error instead.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::pattern::PatternToken;
use crate::types::{ContextValue, RequestContext};

static VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]*)\}").expect("variable pattern is valid"));

/// A policy value after variable substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub tokens: Vec<PatternToken>,
    pub errors: Vec<String>,
    /// The value contained at least one `${...}` reference.
    pub substituted: bool,
}

impl Resolution {
    /// True when some variable could not be resolved.
    pub fn is_unmatchable(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Render the tokens back into pattern text.
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|token| match token {
                PatternToken::Text(text) => text.as_str(),
                PatternToken::AnyRun => "*",
                PatternToken::AnyChar => "?",
            })
            .collect()
    }

    /// Concatenated text, ignoring wildcard semantics.
    pub fn literal(&self) -> Option<String> {
        self.tokens
            .iter()
            .all(|token| matches!(token, PatternToken::Text(_)))
            .then(|| self.text())
    }
}

pub fn contains_variables(value: &str) -> bool {
    VARIABLE.is_match(value)
}

struct Tokens {
    tokens: Vec<PatternToken>,
    wildcards: bool,
}

impl Tokens {
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.tokens.last_mut() {
            Some(PatternToken::Text(existing)) => existing.push_str(text),
            _ => self.tokens.push(PatternToken::Text(text.to_string())),
        }
    }

    fn push_pattern(&mut self, text: &str) {
        if !self.wildcards {
            self.push_text(text);
            return;
        }
        let mut start = 0;
        for (idx, c) in text.char_indices() {
            let token = match c {
                '*' => PatternToken::AnyRun,
                '?' => PatternToken::AnyChar,
                _ => continue,
            };
            self.push_text(&text[start..idx]);
            self.tokens.push(token);
            start = idx + c.len_utf8();
        }
        self.push_text(&text[start..]);
    }
}

fn strip_quotes(value: &str) -> &str {
    let value = value.trim();
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn lookup(body: &str, context: &RequestContext) -> Result<String, String> {
    let body = body.trim();
    if matches!(body, "*" | "?" | "$") {
        return Ok(body.to_string());
    }
    let (key, default) = match body.split_once(',') {
        Some((key, default)) => (key.trim(), Some(strip_quotes(default))),
        None => (body, None),
    };
    match (context.get(key), default) {
        (Some(ContextValue::Single(value)), _) => Ok(value.clone()),
        (Some(ContextValue::Multi(_)), _) => Err(format!(
            "{key} is a multi value context key, and cannot be used for replacement. This will never match"
        )),
        (None, Some(default)) => Ok(default.to_string()),
        (None, None) => Err(format!(
            "{key} not found in request context, and no default value provided. This will never match"
        )),
    }
}

/// Substitute variables in `value`.
///
/// With `wildcards` set, bare `*` and `?` outside variables become wildcard
/// tokens; otherwise everything is literal text.
pub fn resolve(value: &str, context: &RequestContext, wildcards: bool) -> Resolution {
    let mut out = Tokens {
        tokens: Vec::new(),
        wildcards,
    };
    let mut errors = Vec::new();
    let mut substituted = false;
    let mut last = 0;

    for caps in VARIABLE.captures_iter(value) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        substituted = true;
        out.push_pattern(&value[last..whole.start()]);
        match lookup(body.as_str(), context) {
            Ok(replacement) => out.push_text(&replacement),
            Err(err) => errors.push(err),
        }
        last = whole.end();
    }
    out.push_pattern(&value[last..]);

    Resolution {
        tokens: out.tokens,
        errors,
        substituted,
    }
}
