use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::rule::{NewRule, Rule, RuleFilter, sort_by_specificity};
use crate::store::{GrantOutcome, RoleStore, RuleStore};
use crate::types::{PrincipalId, Role, RoleId, RoleName, RuleId};

/// In-memory store implementation for tests and demos.
///
/// Roles, role assignments and rules share one lock so that a grant's prune
/// and insert, or a role's cascading delete, are observed all at once.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    roles: BTreeMap<RoleId, RoleName>,
    principal_roles: HashMap<PrincipalId, HashSet<RoleId>>,
    rules: BTreeMap<RuleId, Rule>,
    next_role: u64,
    next_rule: u64,
}

impl Inner {
    fn role_exists(&self, role: Option<&RoleId>) -> bool {
        role.is_none_or(|role| self.roles.contains_key(role))
    }

    fn insert(&mut self, rule: NewRule) -> std::result::Result<RuleId, StoreError> {
        if !self.role_exists(rule.role.as_ref()) {
            return Err(format!("rule references unknown role {:?}", rule.role).into());
        }
        self.next_rule += 1;
        let id = RuleId::new(self.next_rule);
        self.rules.insert(id, rule.with_id(id));
        Ok(id)
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a role, or returns the existing one with the same name.
    pub fn add_role(&self, name: RoleName) -> RoleId {
        let mut guard = self.write();
        if let Some((id, _)) = guard.roles.iter().find(|(_, existing)| **existing == name) {
            return *id;
        }
        guard.next_role += 1;
        let id = RoleId::new(guard.next_role);
        guard.roles.insert(id, name);
        id
    }

    /// Deletes a role together with its assignments and rules.
    ///
    /// Returns false when the role did not exist. Engines caching rule sets
    /// must be told through [`crate::Engine::invalidate_cache`].
    pub fn remove_role(&self, role: RoleId) -> bool {
        let mut guard = self.write();
        if guard.roles.remove(&role).is_none() {
            return false;
        }
        for roles in guard.principal_roles.values_mut() {
            roles.remove(&role);
        }
        guard.rules.retain(|_, rule| rule.role != Some(role));
        true
    }

    /// Assigns a role to a principal.
    pub fn assign_role(&self, principal: PrincipalId, role: RoleId) {
        let mut guard = self.write();
        guard.principal_roles.entry(principal).or_default().insert(role);
    }

    /// Removes a role from a principal.
    pub fn unassign_role(&self, principal: &PrincipalId, role: RoleId) {
        let mut guard = self.write();
        if let Some(roles) = guard.principal_roles.get_mut(principal) {
            roles.remove(&role);
        }
    }

    /// Snapshot of every stored rule in key order.
    pub fn rules(&self) -> Vec<Rule> {
        self.read().rules.values().cloned().collect()
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn insert_rule(&self, rule: NewRule) -> std::result::Result<RuleId, StoreError> {
        self.write().insert(rule)
    }

    async fn grant_rule(&self, rule: NewRule) -> std::result::Result<GrantOutcome, StoreError> {
        let mut guard = self.write();
        if !guard.role_exists(rule.role.as_ref()) {
            return Err(format!("rule references unknown role {:?}", rule.role).into());
        }
        let before = guard.rules.len();
        guard.rules.retain(|_, existing| !rule.supersedes(existing));
        let pruned = (before - guard.rules.len()) as u64;
        let id = guard.insert(rule)?;
        Ok(GrantOutcome { rule: id, pruned })
    }

    async fn applicable_rules(
        &self,
        roles: &[RoleId],
        include_global: bool,
    ) -> std::result::Result<Vec<Rule>, StoreError> {
        let guard = self.read();
        let mut selected: Vec<Rule> = guard
            .rules
            .values()
            .filter(|rule| match &rule.role {
                Some(role) => roles.contains(role),
                None => include_global,
            })
            .cloned()
            .collect();
        sort_by_specificity(&mut selected);
        Ok(selected)
    }

    async fn delete_rules(&self, filter: RuleFilter) -> std::result::Result<u64, StoreError> {
        let mut guard = self.write();
        let before = guard.rules.len();
        guard.rules.retain(|_, rule| !filter.matches(rule));
        Ok((before - guard.rules.len()) as u64)
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn role_by_name(
        &self,
        name: &RoleName,
    ) -> std::result::Result<Option<Role>, StoreError> {
        let guard = self.read();
        Ok(guard
            .roles
            .iter()
            .find(|(_, existing)| *existing == name)
            .map(|(id, name)| Role {
                id: *id,
                name: name.clone(),
            }))
    }

    async fn role_by_id(&self, id: RoleId) -> std::result::Result<Option<Role>, StoreError> {
        let guard = self.read();
        Ok(guard.roles.get(&id).map(|name| Role {
            id,
            name: name.clone(),
        }))
    }

    async fn principal_roles(
        &self,
        principal: &PrincipalId,
    ) -> std::result::Result<Vec<RoleId>, StoreError> {
        let guard = self.read();
        Ok(guard
            .principal_roles
            .get(principal)
            .map(|roles| roles.iter().copied().collect())
            .unwrap_or_default())
    }
}
