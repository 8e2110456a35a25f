use crate::error::StoreError;
use crate::rule::{NewRule, Rule, RuleFilter};
use crate::types::{PrincipalId, Role, RoleId, RoleName, RuleId};
use async_trait::async_trait;

/// Result of an atomic grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantOutcome {
    /// Key of the inserted rule.
    pub rule: RuleId,
    /// Number of superseded rules deleted before the insert.
    pub pruned: u64,
}

/// Rule repository.
#[async_trait]
pub trait RuleStore {
    /// Inserts a rule as-is and returns its key.
    ///
    /// Implementations must reject a rule whose role does not exist.
    async fn insert_rule(&self, rule: NewRule) -> std::result::Result<RuleId, StoreError>;

    /// Deletes every rule superseded by `rule` (see [`NewRule::supersedes`])
    /// and inserts `rule`, as one atomic unit of work.
    ///
    /// Concurrent readers must observe either the state before or the state
    /// after the whole operation.
    async fn grant_rule(&self, rule: NewRule) -> std::result::Result<GrantOutcome, StoreError>;

    /// Returns global rules (when `include_global` is set) together with the
    /// rules of `roles`, ordered by [`crate::sort_by_specificity`].
    async fn applicable_rules(
        &self,
        roles: &[RoleId],
        include_global: bool,
    ) -> std::result::Result<Vec<Rule>, StoreError>;

    /// Deletes rules accepted by `filter` and returns how many were removed.
    async fn delete_rules(&self, filter: RuleFilter) -> std::result::Result<u64, StoreError>;
}

/// Role lookup and principal role resolution.
#[async_trait]
pub trait RoleStore {
    /// Looks a role up by name.
    async fn role_by_name(&self, name: &RoleName)
    -> std::result::Result<Option<Role>, StoreError>;

    /// Looks a role up by key.
    async fn role_by_id(&self, id: RoleId) -> std::result::Result<Option<Role>, StoreError>;

    /// Returns the roles held by a principal.
    async fn principal_roles(
        &self,
        principal: &PrincipalId,
    ) -> std::result::Result<Vec<RoleId>, StoreError>;
}

/// Composite store trait.
pub trait Store: RuleStore + RoleStore + Send + Sync {}

impl<T> Store for T where T: RuleStore + RoleStore + Send + Sync {}
