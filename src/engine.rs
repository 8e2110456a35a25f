use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::cache::{Cache, CachedRules, NoCache, RuleSetKey};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::matching::first_match;
use crate::registry::{ResourceListing, ResourceQuery, ResourceRegistry};
use crate::resource::Resource;
use crate::rule::{Rule, RuleSpec};
use crate::store::Store;
use crate::types::{ActionName, PrincipalId, Role, RoleId, RoleName, RoleRef, RuleId};

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No principal was present.
    Unauthenticated,
    /// The principal holds no matching rule.
    Forbidden,
}

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Access is granted.
    Allow,
    /// Access is denied.
    Deny(DenyReason),
}

impl Decision {
    /// Returns true for [`Decision::Allow`].
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Converts a denial into [`Error::Unauthenticated`] or [`Error::Forbidden`].
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(DenyReason::Unauthenticated) => Err(Error::Unauthenticated),
            Self::Deny(DenyReason::Forbidden) => Err(Error::Forbidden),
        }
    }
}

/// Access control engine over a rule store, with an optional rule cache.
///
/// Rules are evaluated most general first: the first rule whose action,
/// resource and condition all match allows the request, and an exhausted
/// rule set denies it.
#[derive(Debug)]
pub struct Engine<S, C = NoCache> {
    store: S,
    cache: C,
    registry: Arc<ResourceRegistry>,
    include_global: bool,
    guest_role: Option<RoleName>,
    generations: Generations,
}

/// Rule change counters, one per role plus one for global rules.
///
/// The generation of a rule set is the sum of the counters it depends on.
/// Counters only grow, so any change to a contributing role makes the sum
/// differ from every value observed before the change.
#[derive(Debug, Default)]
struct Generations {
    epoch: AtomicU64,
    global: AtomicU64,
    roles: RwLock<HashMap<RoleId, u64>>,
}

impl Generations {
    fn of(&self, key: &RuleSetKey) -> u64 {
        let mut generation = self.epoch.load(Ordering::Acquire);
        if key.include_global() {
            generation = generation.wrapping_add(self.global.load(Ordering::Acquire));
        }
        let roles = self.roles.read().unwrap_or_else(PoisonError::into_inner);
        key.roles()
            .iter()
            .filter_map(|role| roles.get(role))
            .fold(generation, |sum, counter| sum.wrapping_add(*counter))
    }

    fn bump(&self, role: Option<&RoleId>) {
        match role {
            Some(role) => {
                let mut roles = self.roles.write().unwrap_or_else(PoisonError::into_inner);
                *roles.entry(*role).or_default() += 1;
            }
            None => {
                self.global.fetch_add(1, Ordering::AcqRel);
            }
        }
    }

    fn bump_all(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder<S, C = NoCache> {
    store: S,
    cache: C,
    registry: Arc<ResourceRegistry>,
    include_global: bool,
    guest_role: Option<RoleName>,
}

impl<S> EngineBuilder<S, NoCache> {
    /// Creates a new builder with default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: NoCache,
            registry: Arc::new(ResourceRegistry::new()),
            include_global: true,
            guest_role: None,
        }
    }
}

impl<S, C> EngineBuilder<S, C> {
    /// Includes or excludes rules without a role.
    pub fn include_global_rules(mut self, on: bool) -> Self {
        self.include_global = on;
        self
    }

    /// Sets a role whose rules also apply when there is no principal.
    pub fn guest_role(mut self, role: Option<RoleName>) -> Self {
        self.guest_role = role;
        self
    }

    /// Shares an existing resource registry.
    pub fn registry(mut self, registry: Arc<ResourceRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Applies engine settings. Cache settings are applied by constructing
    /// the cache, see [`EngineBuilder::cache`].
    pub fn config(self, config: &EngineConfig) -> Self {
        self.include_global_rules(config.include_global_rules)
            .guest_role(config.guest_role.clone())
    }

    /// Sets the cache implementation.
    pub fn cache<C2: Cache>(self, cache: C2) -> EngineBuilder<S, C2> {
        EngineBuilder {
            store: self.store,
            cache,
            registry: self.registry,
            include_global: self.include_global,
            guest_role: self.guest_role,
        }
    }

    /// Builds the engine.
    pub fn build(self) -> Engine<S, C> {
        Engine {
            store: self.store,
            cache: self.cache,
            registry: self.registry,
            include_global: self.include_global,
            guest_role: self.guest_role,
            generations: Generations::default(),
        }
    }
}

impl<S, C> Engine<S, C> {
    /// The rule store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The resource registry.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Lists registered resources.
    pub fn list_resources(&self, query: &ResourceQuery) -> ResourceListing {
        self.registry.list(query)
    }
}

impl<S, C> Engine<S, C>
where
    S: Store,
    C: Cache,
{
    /// Stores a rule, first deleting the rules it supersedes.
    ///
    /// Fails with [`Error::UnknownRole`] before touching the store when the
    /// role does not resolve.
    pub async fn grant(&self, spec: RuleSpec) -> Result<RuleId> {
        let role = match spec.role_ref() {
            Some(role_ref) => Some(
                self.resolve_role(role_ref)
                    .await?
                    .ok_or_else(|| Error::UnknownRole(role_ref.to_string()))?
                    .id,
            ),
            None => None,
        };

        let rule = spec.into_new_rule(role);
        let outcome = self.store.grant_rule(rule).await.map_err(Error::from)?;
        self.rules_changed(role.as_ref()).await;

        tracing::debug!(
            rule = %outcome.rule,
            role = ?role,
            pruned = outcome.pruned,
            "granted rule"
        );
        Ok(outcome.rule)
    }

    /// Deletes the rules described by `spec` and returns how many went.
    ///
    /// Without a resource every rule of the role is deleted. An unknown role
    /// deletes nothing and is not an error.
    pub async fn revoke(&self, spec: RuleSpec) -> Result<u64> {
        let role = match spec.role_ref() {
            Some(role_ref) => match self.resolve_role(role_ref).await? {
                Some(role) => Some(role.id),
                None => {
                    tracing::debug!(role = %role_ref, "revoke for unknown role ignored");
                    return Ok(0);
                }
            },
            None => None,
        };

        let deleted = self
            .store
            .delete_rules(spec.revoke_filter(role))
            .await
            .map_err(Error::from)?;
        if deleted > 0 {
            self.rules_changed(role.as_ref()).await;
        }

        tracing::debug!(role = ?role, deleted, "revoked rules");
        Ok(deleted)
    }

    /// Drops every cached rule set.
    ///
    /// Call this after changing rules or role assignments directly in the
    /// store.
    pub async fn invalidate_cache(&self) {
        self.generations.bump_all();
        self.cache.invalidate_all().await;
    }

    /// Evaluates a request.
    ///
    /// `action` defaults to the resource's current action.
    pub async fn evaluate(
        &self,
        principal: Option<&PrincipalId>,
        resource: &dyn Resource,
        action: Option<&ActionName>,
    ) -> Result<Decision> {
        let rules = self.load_rules(principal, false).await?;
        Ok(decide(&rules, principal, resource, action))
    }

    /// Evaluates a request and turns a denial into an error.
    pub async fn check(
        &self,
        principal: Option<&PrincipalId>,
        resource: &dyn Resource,
        action: Option<&ActionName>,
    ) -> Result<()> {
        self.evaluate(principal, resource, action)
            .await?
            .into_result()
    }

    /// Evaluates a request; any failure counts as a denial.
    pub async fn check_allowed(
        &self,
        principal: Option<&PrincipalId>,
        resource: &dyn Resource,
        action: Option<&ActionName>,
    ) -> bool {
        fold_denial(self.evaluate(principal, resource, action).await)
    }

    /// Opens an evaluation session that loads the principal's rules once.
    pub fn session(&self, principal: Option<PrincipalId>) -> Session<'_, S, C> {
        Session {
            engine: self,
            principal,
            rules: Mutex::new(None),
        }
    }

    async fn resolve_role(&self, role: &RoleRef) -> Result<Option<Role>> {
        let found = match role {
            RoleRef::Id(id) => self.store.role_by_id(*id).await,
            RoleRef::Name(name) => self.store.role_by_name(name).await,
        };
        found.map_err(Error::from)
    }

    async fn resolve_roles(&self, principal: Option<&PrincipalId>) -> Result<Vec<RoleId>> {
        if let Some(principal) = principal {
            return self
                .store
                .principal_roles(principal)
                .await
                .map_err(Error::from);
        }
        let Some(guest) = &self.guest_role else {
            return Ok(Vec::new());
        };
        let role = self
            .store
            .role_by_name(guest)
            .await
            .map_err(Error::from)?;
        Ok(role.map(|role| role.id).into_iter().collect())
    }

    async fn load_rules(
        &self,
        principal: Option<&PrincipalId>,
        force_reload: bool,
    ) -> Result<Arc<[Rule]>> {
        let roles = self.resolve_roles(principal).await?;
        let key = RuleSetKey::new(roles, self.include_global);
        let generation = self.generations.of(&key);

        if !force_reload
            && let Some(cached) = self.cache.get_rules(&key).await
            && cached.generation == generation
        {
            return Ok(cached.rules);
        }

        let rules: Arc<[Rule]> = self
            .store
            .applicable_rules(key.roles(), key.include_global())
            .await
            .map_err(Error::from)?
            .into();
        self.cache
            .set_rules(
                &key,
                CachedRules {
                    generation,
                    rules: Arc::clone(&rules),
                },
            )
            .await;

        tracing::debug!(
            roles = key.roles().len(),
            rules = rules.len(),
            force_reload,
            "loaded applicable rules"
        );
        Ok(rules)
    }

    async fn rules_changed(&self, role: Option<&RoleId>) {
        self.generations.bump(role);
        self.cache.invalidate_role(role).await;
    }
}

/// Evaluation session for one principal.
///
/// The applicable rule set is loaded on the first check and reused until
/// [`Session::reload`] is called, so grants made meanwhile are not seen.
#[derive(Debug)]
pub struct Session<'e, S, C = NoCache> {
    engine: &'e Engine<S, C>,
    principal: Option<PrincipalId>,
    rules: Mutex<Option<Arc<[Rule]>>>,
}

impl<S, C> Session<'_, S, C>
where
    S: Store,
    C: Cache,
{
    /// The principal being evaluated, `None` for guests.
    pub fn principal(&self) -> Option<&PrincipalId> {
        self.principal.as_ref()
    }

    /// Returns the session's rule set, loading it on first use.
    pub async fn rules(&self) -> Result<Arc<[Rule]>> {
        if let Some(rules) = self.loaded() {
            return Ok(rules);
        }
        let rules = self
            .engine
            .load_rules(self.principal.as_ref(), false)
            .await?;
        self.store_loaded(Arc::clone(&rules));
        Ok(rules)
    }

    /// Reloads the rule set from the store, bypassing every cache.
    pub async fn reload(&self) -> Result<()> {
        let rules = self
            .engine
            .load_rules(self.principal.as_ref(), true)
            .await?;
        self.store_loaded(rules);
        Ok(())
    }

    /// Evaluates a request against the session's rule set.
    pub async fn evaluate(
        &self,
        resource: &dyn Resource,
        action: Option<&ActionName>,
    ) -> Result<Decision> {
        let rules = self.rules().await?;
        Ok(decide(&rules, self.principal.as_ref(), resource, action))
    }

    /// Evaluates a request and turns a denial into an error.
    pub async fn check(&self, resource: &dyn Resource, action: Option<&ActionName>) -> Result<()> {
        self.evaluate(resource, action).await?.into_result()
    }

    /// Evaluates a request; any failure counts as a denial.
    pub async fn check_allowed(
        &self,
        resource: &dyn Resource,
        action: Option<&ActionName>,
    ) -> bool {
        fold_denial(self.evaluate(resource, action).await)
    }

    fn loaded(&self) -> Option<Arc<[Rule]>> {
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_loaded(&self, rules: Arc<[Rule]>) {
        *self.rules.lock().unwrap_or_else(PoisonError::into_inner) = Some(rules);
    }
}

fn decide(
    rules: &[Rule],
    principal: Option<&PrincipalId>,
    resource: &dyn Resource,
    action: Option<&ActionName>,
) -> Decision {
    let current;
    let action = match action {
        Some(action) => Some(action),
        None => {
            current = resource.current_action();
            current.as_ref()
        }
    };

    match first_match(rules, resource, action, principal) {
        Some(rule) => {
            tracing::trace!(rule = %rule.id, resource = %resource.resource_id(), "rule matched");
            Decision::Allow
        }
        None if principal.is_some() => Decision::Deny(DenyReason::Forbidden),
        None => Decision::Deny(DenyReason::Unauthenticated),
    }
}

fn fold_denial(decision: Result<Decision>) -> bool {
    match decision {
        Ok(decision) => decision.is_allowed(),
        Err(err) => {
            tracing::warn!(error = %err, "access check failed; denying");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::resource::{ControllerResource, ModelResource};
    use crate::rule::{NewRule, RuleFilter, sort_by_specificity};
    use crate::store::{GrantOutcome, RoleStore, RuleStore};
    use crate::types::{ConditionName, ResourceId};
    use async_trait::async_trait;
    use futures::executor::block_on;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct TestStore {
        roles: HashMap<RoleName, RoleId>,
        principal_roles: HashMap<PrincipalId, Vec<RoleId>>,
        rules: Mutex<Vec<Rule>>,
        next_rule: AtomicU64,
        loads: AtomicUsize,
        unavailable: bool,
    }

    impl TestStore {
        fn with_role(mut self, name: &str, id: u64) -> Self {
            self.roles.insert(RoleName::try_from(name).unwrap(), RoleId::new(id));
            self
        }

        fn with_member(mut self, principal: &str, role: u64) -> Self {
            self.principal_roles
                .entry(PrincipalId::try_from(principal).unwrap())
                .or_default()
                .push(RoleId::new(role));
            self
        }

        fn rule_count(&self) -> usize {
            self.rules.lock().unwrap().len()
        }

        fn check_available(&self) -> std::result::Result<(), StoreError> {
            if self.unavailable {
                return Err("store unavailable".into());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RuleStore for TestStore {
        async fn insert_rule(&self, rule: NewRule) -> std::result::Result<RuleId, StoreError> {
            self.check_available()?;
            let id = RuleId::new(self.next_rule.fetch_add(1, Ordering::Relaxed) + 1);
            self.rules.lock().unwrap().push(rule.with_id(id));
            Ok(id)
        }

        async fn grant_rule(
            &self,
            rule: NewRule,
        ) -> std::result::Result<GrantOutcome, StoreError> {
            self.check_available()?;
            let mut rules = self.rules.lock().unwrap();
            let before = rules.len();
            rules.retain(|existing| !rule.supersedes(existing));
            let pruned = (before - rules.len()) as u64;
            let id = RuleId::new(self.next_rule.fetch_add(1, Ordering::Relaxed) + 1);
            rules.push(rule.with_id(id));
            Ok(GrantOutcome { rule: id, pruned })
        }

        async fn applicable_rules(
            &self,
            roles: &[RoleId],
            include_global: bool,
        ) -> std::result::Result<Vec<Rule>, StoreError> {
            self.check_available()?;
            self.loads.fetch_add(1, Ordering::Relaxed);
            let mut selected: Vec<Rule> = self
                .rules
                .lock()
                .unwrap()
                .iter()
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
            self.check_available()?;
            let mut rules = self.rules.lock().unwrap();
            let before = rules.len();
            rules.retain(|rule| !filter.matches(rule));
            Ok((before - rules.len()) as u64)
        }
    }

    #[async_trait]
    impl RoleStore for TestStore {
        async fn role_by_name(
            &self,
            name: &RoleName,
        ) -> std::result::Result<Option<Role>, StoreError> {
            self.check_available()?;
            Ok(self.roles.get(name).map(|id| Role {
                id: *id,
                name: name.clone(),
            }))
        }

        async fn role_by_id(&self, id: RoleId) -> std::result::Result<Option<Role>, StoreError> {
            self.check_available()?;
            Ok(self
                .roles
                .iter()
                .find(|(_, role_id)| **role_id == id)
                .map(|(name, _)| Role {
                    id,
                    name: name.clone(),
                }))
        }

        async fn principal_roles(
            &self,
            principal: &PrincipalId,
        ) -> std::result::Result<Vec<RoleId>, StoreError> {
            self.check_available()?;
            Ok(self
                .principal_roles
                .get(principal)
                .cloned()
                .unwrap_or_default())
        }
    }

    struct Page {
        id: &'static str,
        allow_condition: bool,
    }

    impl Resource for Page {
        fn resource_id(&self) -> ResourceId {
            ResourceId::try_from(self.id).unwrap()
        }

        fn actions(&self) -> Vec<ActionName> {
            vec![action("view")]
        }

        fn evaluate_condition(
            &self,
            _principal: Option<&PrincipalId>,
            _condition: &ConditionName,
        ) -> bool {
            self.allow_condition
        }
    }

    fn role(name: &str) -> RoleName {
        RoleName::try_from(name).unwrap()
    }

    fn res(value: &str) -> ResourceId {
        ResourceId::try_from(value).unwrap()
    }

    fn action(value: &str) -> ActionName {
        ActionName::try_from(value).unwrap()
    }

    fn principal(value: &str) -> PrincipalId {
        PrincipalId::try_from(value).unwrap()
    }

    #[test]
    fn empty_rule_set_denies_with_reason() {
        let engine = EngineBuilder::new(TestStore::default()).build();
        let page = Page { id: "c:home", allow_condition: true };
        let alice = principal("alice");

        let guest = block_on(engine.evaluate(None, &page, Some(&action("view")))).unwrap();
        assert_eq!(guest, Decision::Deny(DenyReason::Unauthenticated));

        let user = block_on(engine.evaluate(Some(&alice), &page, None)).unwrap();
        assert_eq!(user, Decision::Deny(DenyReason::Forbidden));

        assert!(matches!(
            block_on(engine.check(None, &page, None)),
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            block_on(engine.check(Some(&alice), &page, None)),
            Err(Error::Forbidden)
        ));
        assert!(!block_on(engine.check_allowed(Some(&alice), &page, None)));
    }

    #[test]
    fn grant_with_unknown_role_fails_without_mutation() {
        let engine = EngineBuilder::new(TestStore::default()).build();

        let result = block_on(engine.grant(RuleSpec::role(role("ghost")).resource(res("a"))));

        assert!(matches!(result, Err(Error::UnknownRole(name)) if name == "ghost"));
        assert_eq!(engine.store().rule_count(), 0);
    }

    #[test]
    fn global_rule_allows_guests() {
        let engine = EngineBuilder::new(TestStore::default()).build();
        block_on(engine.grant(
            RuleSpec::everyone()
                .resource(res("c:home"))
                .action(action("index")),
        ))
        .unwrap();

        let home = ControllerResource::new("home", [action("index")]).unwrap();
        assert!(block_on(engine.check_allowed(None, &home, Some(&action("index")))));
        assert!(!block_on(engine.check_allowed(None, &home, Some(&action("edit")))));
    }

    #[test]
    fn current_action_is_used_when_none_is_passed() {
        let engine = EngineBuilder::new(TestStore::default()).build();
        block_on(engine.grant(
            RuleSpec::everyone()
                .resource(res("c:home"))
                .action(action("index")),
        ))
        .unwrap();

        let index = ControllerResource::new("home", [action("index"), action("edit")])
            .unwrap()
            .dispatching(action("index"));
        let edit = index.clone().dispatching(action("edit"));
        let idle = ControllerResource::new("home", [action("index")]).unwrap();

        assert!(block_on(engine.check_allowed(None, &index, None)));
        assert!(!block_on(engine.check_allowed(None, &edit, None)));
        assert!(block_on(engine.check_allowed(None, &idle, None)));
    }

    #[test]
    fn role_rule_matches_descendant_records_for_any_action() {
        let store = TestStore::default()
            .with_role("admin", 1)
            .with_member("alice", 1);
        let engine = EngineBuilder::new(store).build();
        block_on(engine.grant(RuleSpec::role(role("admin")).resource(res("m:user")))).unwrap();

        let record = ModelResource::record("user", 42).unwrap();
        let alice = principal("alice");
        let bob = principal("bob");

        assert!(block_on(engine.check_allowed(Some(&alice), &record, Some(&action("delete")))));
        assert!(!block_on(engine.check_allowed(Some(&bob), &record, Some(&action("delete")))));
        assert!(!block_on(engine.check_allowed(None, &record, Some(&action("delete")))));
    }

    #[test]
    fn general_rule_wins_over_failing_specific_condition() {
        let engine = EngineBuilder::new(TestStore::default()).build();
        block_on(engine.grant(RuleSpec::everyone())).unwrap();
        block_on(engine.grant(
            RuleSpec::everyone()
                .resource(res("a.b"))
                .condition(ConditionName::try_from("never").unwrap()),
        ))
        .unwrap();
        assert_eq!(engine.store().rule_count(), 2);

        let failing = Page { id: "a.b", allow_condition: false };
        assert!(block_on(engine.check_allowed(None, &failing, None)));
    }

    #[test]
    fn broader_grant_prunes_narrower_rules() {
        let engine = EngineBuilder::new(TestStore::default()).build();
        block_on(engine.grant(
            RuleSpec::everyone()
                .resource(res("a.b"))
                .condition(ConditionName::try_from("never").unwrap()),
        ))
        .unwrap();
        let failing = Page { id: "a.b", allow_condition: false };
        assert!(!block_on(engine.check_allowed(None, &failing, None)));

        block_on(engine.grant(RuleSpec::everyone())).unwrap();
        assert_eq!(engine.store().rule_count(), 1);
        assert!(block_on(engine.check_allowed(None, &failing, None)));
    }

    #[test]
    fn revoke_unknown_role_is_a_no_op() {
        let store = TestStore::default().with_role("admin", 1);
        let engine = EngineBuilder::new(store).build();
        block_on(engine.grant(RuleSpec::role(role("admin")).resource(res("a")))).unwrap();

        let deleted = block_on(engine.revoke(RuleSpec::role(role("ghost")))).unwrap();
        assert_eq!(deleted, 0);
        assert_eq!(engine.store().rule_count(), 1);

        assert_eq!(block_on(engine.revoke(RuleSpec::role(role("admin")))).unwrap(), 1);
        assert_eq!(block_on(engine.revoke(RuleSpec::role(role("admin")))).unwrap(), 0);
    }

    #[test]
    fn guest_role_rules_apply_without_principal() {
        let store = TestStore::default().with_role("guest", 7);
        let engine = EngineBuilder::new(store)
            .guest_role(Some(role("guest")))
            .build();
        block_on(engine.grant(RuleSpec::role(role("guest")).resource(res("c:blog")))).unwrap();

        let blog = Page { id: "c:blog", allow_condition: false };
        assert!(block_on(engine.check_allowed(None, &blog, None)));
        assert!(!block_on(engine.check_allowed(Some(&principal("alice")), &blog, None)));
    }

    #[test]
    fn excluded_global_rules_do_not_apply() {
        let engine = EngineBuilder::new(TestStore::default())
            .include_global_rules(false)
            .build();
        block_on(engine.grant(RuleSpec::everyone())).unwrap();

        let page = Page { id: "c:home", allow_condition: true };
        assert!(!block_on(engine.check_allowed(None, &page, None)));
    }

    #[test]
    fn store_failure_propagates_from_check_but_not_check_allowed() {
        let store = TestStore {
            unavailable: true,
            ..TestStore::default()
        };
        let engine = EngineBuilder::new(store).build();
        let page = Page { id: "c:home", allow_condition: true };

        assert!(matches!(block_on(engine.check(None, &page, None)), Err(Error::Store(_))));
        assert!(!block_on(engine.check_allowed(None, &page, None)));
    }

    #[test]
    fn session_loads_rules_once_until_reload() {
        let engine = EngineBuilder::new(TestStore::default()).build();
        let page = Page { id: "c:home", allow_condition: true };
        let session = engine.session(None);

        assert!(!block_on(session.check_allowed(&page, None)));
        block_on(engine.grant(RuleSpec::everyone())).unwrap();
        assert!(!block_on(session.check_allowed(&page, None)));
        assert_eq!(engine.store().loads.load(Ordering::Relaxed), 1);

        block_on(session.reload()).unwrap();
        assert!(block_on(session.check_allowed(&page, None)));
        assert!(block_on(session.check(&page, None)).is_ok());
        assert_eq!(engine.store().loads.load(Ordering::Relaxed), 2);
    }

    #[cfg(feature = "memory-cache")]
    #[test]
    fn cached_rule_sets_are_refreshed_after_grant() {
        let store = TestStore::default()
            .with_role("admin", 1)
            .with_member("alice", 1);
        let engine = EngineBuilder::new(store)
            .cache(crate::MemoryCache::new(8))
            .build();
        let alice = principal("alice");
        let page = Page { id: "m:user.1", allow_condition: true };

        assert!(!block_on(engine.check_allowed(Some(&alice), &page, None)));
        assert!(!block_on(engine.check_allowed(Some(&alice), &page, None)));
        assert_eq!(engine.store().loads.load(Ordering::Relaxed), 1);

        block_on(engine.grant(RuleSpec::role(role("admin")).resource(res("m:user")))).unwrap();
        assert!(block_on(engine.check_allowed(Some(&alice), &page, None)));
        assert_eq!(engine.store().loads.load(Ordering::Relaxed), 2);

        block_on(engine.invalidate_cache());
        assert!(block_on(engine.check_allowed(Some(&alice), &page, None)));
        assert_eq!(engine.store().loads.load(Ordering::Relaxed), 3);
    }

    #[cfg(feature = "memory-cache")]
    #[test]
    fn grant_keeps_cached_sets_of_unrelated_roles() {
        let store = TestStore::default()
            .with_role("admin", 1)
            .with_role("editor", 2)
            .with_member("alice", 1)
            .with_member("bob", 2);
        let engine = EngineBuilder::new(store)
            .include_global_rules(false)
            .cache(crate::MemoryCache::new(8))
            .build();
        let alice = principal("alice");
        let bob = principal("bob");
        let page = Page { id: "m:user.1", allow_condition: true };

        assert!(!block_on(engine.check_allowed(Some(&alice), &page, None)));
        assert!(!block_on(engine.check_allowed(Some(&bob), &page, None)));
        assert_eq!(engine.store().loads.load(Ordering::Relaxed), 2);

        block_on(engine.grant(RuleSpec::role(role("admin")).resource(res("m:user")))).unwrap();
        assert!(!block_on(engine.check_allowed(Some(&bob), &page, None)));
        assert_eq!(engine.store().loads.load(Ordering::Relaxed), 2);

        assert!(block_on(engine.check_allowed(Some(&alice), &page, None)));
        assert_eq!(engine.store().loads.load(Ordering::Relaxed), 3);

        block_on(engine.grant(RuleSpec::role(role("editor")).resource(res("m:user")))).unwrap();
        assert!(block_on(engine.check_allowed(Some(&bob), &page, None)));
        assert!(block_on(engine.check_allowed(Some(&alice), &page, None)));
        assert_eq!(engine.store().loads.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn generations_only_move_for_dependent_keys() {
        let generations = Generations::default();
        let admin = RuleSetKey::new([RoleId::new(1)], false);
        let editor_and_global = RuleSetKey::new([RoleId::new(2)], true);
        let before = (generations.of(&admin), generations.of(&editor_and_global));

        generations.bump(Some(&RoleId::new(2)));
        assert_eq!(generations.of(&admin), before.0);
        assert_ne!(generations.of(&editor_and_global), before.1);

        let before = (generations.of(&admin), generations.of(&editor_and_global));
        generations.bump(None);
        assert_eq!(generations.of(&admin), before.0);
        assert_ne!(generations.of(&editor_and_global), before.1);

        generations.bump_all();
        assert_ne!(generations.of(&admin), before.0);
    }
}
