use crate::pattern::{
    SegmentRelation, classify_tokens, compile_tokens, has_wildcards, split_arn_pattern, tokenize,
};
use crate::types::{Effect, RequestContext, ResourceElement, split_resource_product};
use crate::variables::resolve;

/// Outcome of a `Resource` / `NotResource` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMatch {
    pub matched: bool,
    pub errors: Vec<String>,
}

struct Probe<'a> {
    effect: Effect,
    not_resource: bool,
    request: &'a str,
    context: &'a RequestContext,
}

impl Probe<'_> {
    /// The un-inverted result for one policy resource value.
    fn raw_match(&self, policy_value: &str, errors: &mut Vec<String>) -> bool {
        if policy_value == "*" {
            return true;
        }
        if self.request == "*" {
            return match (self.effect, self.not_resource) {
                (Effect::Allow, false) => true,
                (Effect::Allow, true) => false,
                (Effect::Deny, false) => false,
                (Effect::Deny, true) => true,
            };
        }

        let (Some(policy), Some(request)) = (
            split_arn_pattern(policy_value),
            split_arn_pattern(self.request),
        ) else {
            return self.segment_match(policy_value, self.request, errors);
        };

        if has_wildcards(self.request) {
            return self.classified_match(&policy, &request, errors);
        }

        let (policy_product, _) = split_resource_product(policy[4]);
        if !policy_product.is_empty() && !policy_product.contains(['*', '?', '$']) {
            let (request_product, _) = split_resource_product(request[4]);
            if !policy_product.eq_ignore_ascii_case(request_product) {
                return false;
            }
        }

        policy
            .iter()
            .zip(request.iter())
            .all(|(p, r)| self.segment_match(p, r, errors))
    }

    fn segment_match(&self, policy: &str, request: &str, errors: &mut Vec<String>) -> bool {
        let resolution = resolve(policy, self.context, true);
        if resolution.is_unmatchable() {
            errors.extend(resolution.errors);
            return false;
        }
        match resolution.literal() {
            Some(text) => text.to_lowercase() == request.to_lowercase(),
            None => match compile_tokens(&resolution.tokens) {
                Ok(re) => re.is_match(request),
                Err(e) => {
                    errors.push(format!("{policy} is not a usable pattern: {e}"));
                    false
                }
            },
        }
    }

    /// Compare against a request resource that itself carries wildcards.
    fn classified_match(
        &self,
        policy: &[&str; 5],
        request: &[&str; 5],
        errors: &mut Vec<String>,
    ) -> bool {
        let mut relations = Vec::with_capacity(5);
        for (p, r) in policy.iter().zip(request.iter()) {
            let resolution = resolve(p, self.context, true);
            if resolution.is_unmatchable() {
                errors.extend(resolution.errors);
                return false;
            }
            relations.push(classify_tokens(&resolution.tokens, &tokenize(r)));
        }
        let mut relations = relations.into_iter();
        match (self.effect, self.not_resource) {
            (Effect::Allow, false) | (Effect::Deny, true) => {
                relations.all(|r| r != SegmentRelation::None)
            }
            (Effect::Deny, false) => relations
                .all(|r| !matches!(r, SegmentRelation::None | SegmentRelation::PolicyIsSubset)),
            (Effect::Allow, true) => relations
                .all(|r| matches!(r, SegmentRelation::Equal | SegmentRelation::PolicyIsSuperset)),
        }
    }
}

/// Match a statement's resource element against the request resource.
///
/// `NotResource` inverts the result, except that any error makes the
/// element fail.
pub fn resource_element_matches(
    element: &ResourceElement,
    effect: Effect,
    request_resource: &str,
    context: &RequestContext,
) -> ResourceMatch {
    let (values, not_resource) = match element {
        ResourceElement::Resource(values) => (values, false),
        ResourceElement::NotResource(values) => (values, true),
    };
    let probe = Probe {
        effect,
        not_resource,
        request: request_resource,
        context,
    };
    let mut errors = Vec::new();
    let mut any = false;
    for value in values {
        any |= probe.raw_match(value, &mut errors);
    }
    let matched = if not_resource {
        !any && errors.is_empty()
    } else {
        any
    };
    ResourceMatch { matched, errors }
}
