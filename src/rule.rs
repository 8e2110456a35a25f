use crate::types::{
    ActionName, ConditionName, ResourceId, RoleId, RoleRef, RuleId, is_descendant,
};

/// A stored access rule.
///
/// Every field left as `None` acts as a wildcard: no role means every
/// principal (guests included), no resource means every resource, no
/// action means every action and no condition means no extra predicate.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rule {
    /// Storage key.
    pub id: RuleId,
    /// Role the rule is granted to.
    pub role: Option<RoleId>,
    /// Resource pattern.
    pub resource: Option<ResourceId>,
    /// Action constraint.
    pub action: Option<ActionName>,
    /// Condition constraint.
    pub condition: Option<ConditionName>,
}

/// A rule that has not been stored yet.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewRule {
    /// Role the rule is granted to.
    pub role: Option<RoleId>,
    /// Resource pattern.
    pub resource: Option<ResourceId>,
    /// Action constraint.
    pub action: Option<ActionName>,
    /// Condition constraint.
    pub condition: Option<ConditionName>,
}

impl NewRule {
    /// Attaches a storage key.
    pub fn with_id(self, id: RuleId) -> Rule {
        Rule {
            id,
            role: self.role,
            resource: self.resource,
            action: self.action,
            condition: self.condition,
        }
    }

    /// Returns true when storing `self` makes `existing` redundant.
    ///
    /// The existing rule must belong to the same role (or also be global),
    /// sit at or below the new resource, and share the new action and
    /// condition where those are set. A narrower new rule never supersedes
    /// a broader existing one.
    pub fn supersedes(&self, existing: &Rule) -> bool {
        if existing.role != self.role {
            return false;
        }
        if let Some(resource) = &self.resource {
            let Some(existing_resource) = &existing.resource else {
                return false;
            };
            if existing_resource != resource
                && !is_descendant(existing_resource.as_str(), resource.as_str())
            {
                return false;
            }
        }
        if self.action.is_some() && existing.action != self.action {
            return false;
        }
        if self.condition.is_some() && existing.condition != self.condition {
            return false;
        }
        true
    }
}

/// Equality constraint on one nullable rule column.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum FieldFilter<T> {
    /// Column is not constrained.
    #[default]
    Any,
    /// Column must be empty.
    Null,
    /// Column must equal the value.
    Eq(T),
}

impl<T: PartialEq> FieldFilter<T> {
    /// Tests a column value against the constraint.
    pub fn matches(&self, value: Option<&T>) -> bool {
        match self {
            Self::Any => true,
            Self::Null => value.is_none(),
            Self::Eq(expected) => value == Some(expected),
        }
    }
}

impl<T> From<Option<T>> for FieldFilter<T> {
    /// `None` becomes [`FieldFilter::Null`], not [`FieldFilter::Any`].
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Eq(value),
            None => Self::Null,
        }
    }
}

/// Conjunction of column constraints used for bulk deletion.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct RuleFilter {
    /// Role column.
    pub role: FieldFilter<RoleId>,
    /// Resource column.
    pub resource: FieldFilter<ResourceId>,
    /// Action column.
    pub action: FieldFilter<ActionName>,
    /// Condition column.
    pub condition: FieldFilter<ConditionName>,
}

impl RuleFilter {
    /// Returns true when every constraint accepts the rule.
    pub fn matches(&self, rule: &Rule) -> bool {
        self.role.matches(rule.role.as_ref())
            && self.resource.matches(rule.resource.as_ref())
            && self.action.matches(rule.action.as_ref())
            && self.condition.matches(rule.condition.as_ref())
    }
}

/// Sorts rules so the most general resource comes first.
///
/// Rules without a resource lead, the rest follow by ascending character
/// length of the resource; equal lengths keep storage order.
pub fn sort_by_specificity(rules: &mut [Rule]) {
    rules.sort_by_key(|rule| {
        (
            rule.resource
                .as_ref()
                .map(|resource| resource.as_str().chars().count()),
            rule.id,
        )
    });
}

/// Caller-facing description of a rule for `grant` and `revoke`.
///
/// Roles may be given by name; the engine resolves them before touching the
/// store.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct RuleSpec {
    pub(crate) role: Option<RoleRef>,
    pub(crate) resource: Option<ResourceId>,
    pub(crate) action: Option<ActionName>,
    pub(crate) condition: Option<ConditionName>,
}

impl RuleSpec {
    /// A rule for every principal, authenticated or not.
    pub fn everyone() -> Self {
        Self::default()
    }

    /// A rule for holders of `role`.
    pub fn role(role: impl Into<RoleRef>) -> Self {
        Self {
            role: Some(role.into()),
            ..Self::default()
        }
    }

    /// Restricts the rule to a resource and everything below it.
    pub fn resource(mut self, resource: ResourceId) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Restricts the rule to one action.
    pub fn action(mut self, action: ActionName) -> Self {
        self.action = Some(action);
        self
    }

    /// Requires a named resource condition to hold.
    pub fn condition(mut self, condition: ConditionName) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Role reference, if any.
    pub fn role_ref(&self) -> Option<&RoleRef> {
        self.role.as_ref()
    }

    pub(crate) fn into_new_rule(self, role: Option<RoleId>) -> NewRule {
        NewRule {
            role,
            resource: self.resource,
            action: self.action,
            condition: self.condition,
        }
    }

    /// Deletion filter for revoking this spec once the role is resolved.
    ///
    /// Without a resource every rule of the role matches, whatever its
    /// action or condition.
    pub(crate) fn revoke_filter(&self, role: Option<RoleId>) -> RuleFilter {
        let Some(resource) = &self.resource else {
            return RuleFilter {
                role: role.into(),
                ..RuleFilter::default()
            };
        };
        RuleFilter {
            role: role.into(),
            resource: FieldFilter::Eq(resource.clone()),
            action: self
                .action
                .clone()
                .map_or(FieldFilter::Any, FieldFilter::Eq),
            condition: self
                .condition
                .clone()
                .map_or(FieldFilter::Any, FieldFilter::Eq),
        }
    }
}
