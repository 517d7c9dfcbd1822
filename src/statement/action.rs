use crate::pattern::wildcard_match;
use crate::types::ActionElement;

/// Whether one policy action (`s3:Get*`, `*`) names the request action.
pub fn action_matches(policy_action: &str, service: &str, name: &str) -> bool {
    if policy_action == "*" {
        return true;
    }
    let Some((policy_service, policy_name)) = policy_action.split_once(':') else {
        return false;
    };
    policy_service.eq_ignore_ascii_case(service) && wildcard_match(policy_name, name)
}

/// `Action` matches when any entry does; `NotAction` when none does.
pub fn action_element_matches(element: &ActionElement, service: &str, name: &str) -> bool {
    match element {
        ActionElement::Action(actions) => actions
            .iter()
            .any(|action| action_matches(action, service, name)),
        ActionElement::NotAction(actions) => !actions
            .iter()
            .any(|action| action_matches(action, service, name)),
    }
}
