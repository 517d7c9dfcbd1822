//! Wildcard matching and wildcard-pattern overlap.
//!
//! Policy patterns use `*` (any run of characters) and `?` (any single
//! character). Literal characters compare case-insensitively and patterns are
//! anchored to the whole value.

use std::collections::{BTreeSet, HashSet, VecDeque};

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use strum_macros::Display;

/// One piece of a wildcard pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternToken {
    Text(String),
    /// `*`
    AnyRun,
    /// `?`
    AnyChar,
}

/// Split a plain wildcard pattern into tokens.
pub fn tokenize(pattern: &str) -> Vec<PatternToken> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    for c in pattern.chars() {
        let wildcard = match c {
            '*' => PatternToken::AnyRun,
            '?' => PatternToken::AnyChar,
            _ => {
                text.push(c);
                continue;
            }
        };
        if !text.is_empty() {
            tokens.push(PatternToken::Text(std::mem::take(&mut text)));
        }
        tokens.push(wildcard);
    }
    if !text.is_empty() {
        tokens.push(PatternToken::Text(text));
    }
    tokens
}

/// Compile tokens into an anchored, case-insensitive regex.
pub fn compile_tokens(tokens: &[PatternToken]) -> Result<Regex, regex::Error> {
    let mut source = String::from("^");
    for token in tokens {
        match token {
            PatternToken::Text(text) => source.push_str(&regex::escape(text)),
            PatternToken::AnyRun => source.push_str(".*?"),
            PatternToken::AnyChar => source.push('.'),
        }
    }
    source.push('$');
    RegexBuilder::new(&source)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
}

pub fn compile_wildcard(pattern: &str) -> Result<Regex, regex::Error> {
    compile_tokens(&tokenize(pattern))
}

/// Whether `value` matches the wildcard `pattern`.
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if !pattern.contains(['*', '?']) {
        return pattern.eq_ignore_ascii_case(value)
            || pattern.to_lowercase() == value.to_lowercase();
    }
    compile_wildcard(pattern)
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

pub fn has_wildcards(value: &str) -> bool {
    value.contains(['*', '?'])
}

/// A single pattern position with literals already lowercased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbol {
    Char(char),
    AnyChar,
    AnyRun,
}

fn symbols(tokens: &[PatternToken]) -> Vec<Symbol> {
    let mut out = Vec::new();
    for token in tokens {
        match token {
            PatternToken::Text(text) => out.extend(text.to_lowercase().chars().map(Symbol::Char)),
            PatternToken::AnyRun => out.push(Symbol::AnyRun),
            PatternToken::AnyChar => out.push(Symbol::AnyChar),
        }
    }
    out
}

/// Whether some concrete string is matched by both patterns.
pub fn patterns_overlap(a: &str, b: &str) -> bool {
    symbols_overlap(&symbols(&tokenize(a)), &symbols(&tokenize(b)))
}

/// Explores pairs of cursors `(i, j)` into the two patterns breadth first. A
/// `*` may match nothing (advance past it) or swallow one character of the
/// other side (stay put while the other cursor advances). Two non-`*` symbols
/// advance together when either is `?` or they are the same character. The
/// state space is `(len(a) + 1) * (len(b) + 1)`, so the search always ends.
fn symbols_overlap(a: &[Symbol], b: &[Symbol]) -> bool {
    let (n, m) = (a.len(), b.len());
    let width = m + 1;
    let mut visited = vec![false; (n + 1) * width];
    let mut queue = VecDeque::from([(0usize, 0usize)]);
    visited[0] = true;

    while let Some((i, j)) = queue.pop_front() {
        if i == n && j == m {
            return true;
        }
        let mut next = Vec::with_capacity(4);
        let a_star = a.get(i) == Some(&Symbol::AnyRun);
        let b_star = b.get(j) == Some(&Symbol::AnyRun);
        if a_star {
            next.push((i + 1, j));
            if j < m {
                next.push((i, j + 1));
            }
        }
        if b_star {
            next.push((i, j + 1));
            if i < n {
                next.push((i + 1, j));
            }
        }
        if i < n && j < m && !a_star && !b_star {
            let compatible = match (a[i], b[j]) {
                (Symbol::AnyChar, _) | (_, Symbol::AnyChar) => true,
                (x, y) => x == y,
            };
            if compatible {
                next.push((i + 1, j + 1));
            }
        }
        for (ni, nj) in next {
            let idx = ni * width + nj;
            if !visited[idx] {
                visited[idx] = true;
                queue.push_back((ni, nj));
            }
        }
    }
    false
}

/// Extend `states` with every position reachable by skipping `*`.
fn closure(pattern: &[Symbol], mut states: BTreeSet<usize>) -> BTreeSet<usize> {
    let mut stack: Vec<usize> = states.iter().copied().collect();
    while let Some(i) = stack.pop() {
        if pattern.get(i) == Some(&Symbol::AnyRun) && states.insert(i + 1) {
            stack.push(i + 1);
        }
    }
    states
}

/// Positions after reading one character. `None` stands for any character
/// that is a literal in neither pattern.
fn step(pattern: &[Symbol], states: &BTreeSet<usize>, c: Option<char>) -> BTreeSet<usize> {
    let next = states
        .iter()
        .filter_map(|&i| match (pattern.get(i)?, c) {
            (Symbol::AnyRun, _) => Some(i),
            (Symbol::AnyChar, _) => Some(i + 1),
            (Symbol::Char(p), Some(c)) if *p == c => Some(i + 1),
            _ => None,
        })
        .collect();
    closure(pattern, next)
}

/// Language inclusion by walking both patterns as determinized automata in
/// lockstep. Characters that are literal in neither pattern behave alike, so
/// the alphabet is the literals of both plus one stand-in.
fn symbols_cover(outer: &[Symbol], inner: &[Symbol]) -> bool {
    let alphabet: Vec<Option<char>> = outer
        .iter()
        .chain(inner)
        .filter_map(|symbol| match symbol {
            Symbol::Char(c) => Some(*c),
            _ => None,
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(Some)
        .chain([None])
        .collect();

    let start = (
        closure(inner, BTreeSet::from([0])),
        closure(outer, BTreeSet::from([0])),
    );
    let mut seen = HashSet::from([start.clone()]);
    let mut queue = VecDeque::from([start]);

    while let Some((inner_states, outer_states)) = queue.pop_front() {
        if inner_states.contains(&inner.len()) && !outer_states.contains(&outer.len()) {
            return false;
        }
        for &c in &alphabet {
            let next_inner = step(inner, &inner_states, c);
            if next_inner.is_empty() {
                continue;
            }
            let next = (next_inner, step(outer, &outer_states, c));
            if seen.insert(next.clone()) {
                queue.push_back(next);
            }
        }
    }
    true
}

/// Whether every string matched by `inner` is also matched by `outer`.
pub fn pattern_covers(outer: &str, inner: &str) -> bool {
    symbols_cover(&symbols(&tokenize(outer)), &symbols(&tokenize(inner)))
}

/// How a policy-side pattern relates to a request-side pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SegmentRelation {
    Equal,
    /// The policy pattern matches everything the request pattern does, and more.
    PolicyIsSuperset,
    /// The policy pattern matches only part of what the request pattern does.
    PolicyIsSubset,
    None,
}

pub fn classify_segment(policy: &str, request: &str) -> SegmentRelation {
    classify_tokens(&tokenize(policy), &tokenize(request))
}

/// Like [`classify_segment`], for a policy side that has already been
/// tokenized, so literal `*` and `?` from substitution stay literal.
pub fn classify_tokens(policy: &[PatternToken], request: &[PatternToken]) -> SegmentRelation {
    let policy = symbols(policy);
    let request = symbols(request);
    if policy == request {
        return SegmentRelation::Equal;
    }
    let policy_covers = symbols_cover(&policy, &request);
    let request_covers = symbols_cover(&request, &policy);
    match (policy_covers, request_covers) {
        (true, true) => SegmentRelation::Equal,
        (true, false) => SegmentRelation::PolicyIsSuperset,
        (false, true) => SegmentRelation::PolicyIsSubset,
        // partial overlap: some request values fall outside the policy
        (false, false) if symbols_overlap(&policy, &request) => SegmentRelation::PolicyIsSubset,
        (false, false) => SegmentRelation::None,
    }
}

/// Split a policy-side ARN into its five segments.
///
/// Colons inside `${...}` do not separate segments, so
/// `arn:aws:s3:::bucket/${aws:username}` keeps the variable intact. Returns
/// `None` when the value is not an ARN.
pub fn split_arn_pattern(value: &str) -> Option<[&str; 5]> {
    let mut parts = Vec::with_capacity(6);
    let mut start = 0;
    let mut depth = 0usize;
    let bytes = value.as_bytes();
    for (idx, &b) in bytes.iter().enumerate() {
        match b {
            b'{' if idx > 0 && bytes[idx - 1] == b'$' => depth += 1,
            b'}' if depth > 0 => depth -= 1,
            b':' if depth == 0 && parts.len() < 5 => {
                parts.push(&value[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    if parts.len() != 6 || !parts[0].eq_ignore_ascii_case("arn") {
        return None;
    }
    Some([parts[1], parts[2], parts[3], parts[4], parts[5]])
}

fn arn_segments(value: &str) -> Option<Vec<&str>> {
    let parts: Vec<&str> = value.splitn(6, ':').collect();
    (parts.len() == 6 && parts[0].eq_ignore_ascii_case("arn")).then(|| parts[1..].to_vec())
}

/// Whether two resource patterns can name the same resource.
///
/// `*` overlaps everything. ARNs are compared segment by segment; anything
/// else is compared as a whole string.
pub fn resource_arns_overlap(a: &str, b: &str) -> bool {
    if a == "*" || b == "*" {
        return true;
    }
    match (arn_segments(a), arn_segments(b)) {
        (Some(left), Some(right)) => left
            .iter()
            .zip(right.iter())
            .all(|(l, r)| patterns_overlap(l, r)),
        _ => patterns_overlap(a, b),
    }
}
