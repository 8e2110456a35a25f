use std::sync::Arc;

use crate::rule::Rule;
use crate::types::RoleId;
use async_trait::async_trait;

/// Identity of an applicable rule set: the resolved roles plus whether global
/// rules were included.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RuleSetKey {
    roles: Vec<RoleId>,
    include_global: bool,
}

impl RuleSetKey {
    /// Builds a key; role order and duplicates do not matter.
    pub fn new(roles: impl IntoIterator<Item = RoleId>, include_global: bool) -> Self {
        let mut roles: Vec<RoleId> = roles.into_iter().collect();
        roles.sort_unstable();
        roles.dedup();
        Self {
            roles,
            include_global,
        }
    }

    /// Sorted, deduplicated roles.
    pub fn roles(&self) -> &[RoleId] {
        &self.roles
    }

    /// Whether global rules are part of the set.
    pub fn include_global(&self) -> bool {
        self.include_global
    }

    /// Returns true when a change to rules of `role` can alter this set.
    ///
    /// `None` stands for global rules.
    pub fn depends_on(&self, role: Option<&RoleId>) -> bool {
        match role {
            Some(role) => self.roles.binary_search(role).is_ok(),
            None => self.include_global,
        }
    }
}

/// A cached rule set tagged with the generation it was loaded under.
#[derive(Debug, Clone)]
pub struct CachedRules {
    /// Generation of the set's roles observed before loading.
    pub generation: u64,
    /// Rules in evaluation order.
    pub rules: Arc<[Rule]>,
}

/// Cache interface for applicable rule sets.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Gets the cached rule set for a key.
    async fn get_rules(&self, key: &RuleSetKey) -> Option<CachedRules>;

    /// Sets the cached rule set for a key.
    async fn set_rules(&self, key: &RuleSetKey, rules: CachedRules);

    /// Invalidates every set that depends on rules of `role` (`None` for
    /// global rules).
    async fn invalidate_role(&self, role: Option<&RoleId>);

    /// Invalidates everything.
    async fn invalidate_all(&self);
}

/// No-op cache implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl Cache for NoCache {
    async fn get_rules(&self, _key: &RuleSetKey) -> Option<CachedRules> {
        None
    }

    async fn set_rules(&self, _key: &RuleSetKey, _rules: CachedRules) {}

    async fn invalidate_role(&self, _role: Option<&RoleId>) {}

    async fn invalidate_all(&self) {}
}
