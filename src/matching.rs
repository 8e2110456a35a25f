use crate::resource::Resource;
use crate::rule::Rule;
use crate::types::{ActionName, PrincipalId, ResourceId, hierarchy};

/// Returns true when `rule_resource` is `resource` or one of its ancestors.
pub(crate) fn resource_matches(rule_resource: &ResourceId, resource: &ResourceId) -> bool {
    hierarchy(resource.as_str()).any(|level| level == rule_resource.as_str())
}

/// Tests one rule against a request.
///
/// `action` is the effective action: the caller's explicit action or the
/// resource's current one. A rule bound to an action only rejects a request
/// that names a different action; a request without one passes the check.
pub(crate) fn rule_allows(
    rule: &Rule,
    resource: &dyn Resource,
    resource_id: &ResourceId,
    action: Option<&ActionName>,
    principal: Option<&PrincipalId>,
) -> bool {
    if let (Some(required), Some(effective)) = (&rule.action, action)
        && effective != required
    {
        return false;
    }
    if let Some(pattern) = &rule.resource
        && !resource_matches(pattern, resource_id)
    {
        return false;
    }
    if let Some(condition) = &rule.condition
        && !resource.evaluate_condition(principal, condition)
    {
        return false;
    }
    true
}

/// Walks rules in order and returns the first one that allows the request.
pub(crate) fn first_match<'r>(
    rules: &'r [Rule],
    resource: &dyn Resource,
    action: Option<&ActionName>,
    principal: Option<&PrincipalId>,
) -> Option<&'r Rule> {
    let resource_id = resource.resource_id();
    rules
        .iter()
        .find(|rule| rule_allows(rule, resource, &resource_id, action, principal))
}
