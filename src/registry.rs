use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::resource::{Resource, ResourceType};
use crate::types::{ActionName, ConditionName, ResourceId};

/// Declared actions and condition names of a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceInfo {
    /// Supported actions.
    pub actions: BTreeSet<ActionName>,
    /// Names of evaluable conditions.
    pub conditions: BTreeSet<ConditionName>,
}

impl ResourceInfo {
    /// Collects the declarations of a live resource.
    pub fn of(resource: &dyn Resource) -> Self {
        Self {
            actions: resource.actions().into_iter().collect(),
            conditions: resource.conditions().into_iter().collect(),
        }
    }
}

/// What [`ResourceRegistry::list`] should return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceQuery {
    /// Every entry.
    All,
    /// The entry for one identifier.
    One(ResourceId),
    /// Only the identifiers.
    IdsOnly,
}

/// Answer to a [`ResourceQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceListing {
    /// Every entry, ordered by identifier.
    All(BTreeMap<ResourceId, ResourceInfo>),
    /// The requested entry, if registered.
    One(Option<ResourceInfo>),
    /// Every identifier, ordered.
    Ids(Vec<ResourceId>),
}

/// Catalog of known resources.
///
/// Populated by registration calls at startup and read-mostly afterwards.
/// Listing order is the identifier order.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    entries: RwLock<BTreeMap<ResourceId, ResourceInfo>>,
}

impl ResourceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<ResourceId, ResourceInfo>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<ResourceId, ResourceInfo>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers or replaces an entry.
    pub fn register(
        &self,
        id: ResourceId,
        actions: impl IntoIterator<Item = ActionName>,
        conditions: impl IntoIterator<Item = ConditionName>,
    ) {
        let info = ResourceInfo {
            actions: actions.into_iter().collect(),
            conditions: conditions.into_iter().collect(),
        };
        tracing::trace!(resource = %id, actions = info.actions.len(), "registered resource");
        self.write().insert(id, info);
    }

    /// Registers a live resource under its own identifier.
    pub fn register_resource(&self, resource: &dyn Resource) {
        let info = ResourceInfo::of(resource);
        self.write().insert(resource.resource_id(), info);
    }

    /// Registers a resource type through its registry instance.
    pub fn register_type<R: ResourceType>(&self) {
        self.register_resource(&R::registry_instance());
    }

    /// Returns the entry for `id`.
    pub fn lookup(&self, id: &str) -> Option<ResourceInfo> {
        self.read().get(id).cloned()
    }

    /// Returns every known identifier in order.
    pub fn list_ids(&self) -> Vec<ResourceId> {
        self.read().keys().cloned().collect()
    }

    /// Returns a snapshot of every entry.
    pub fn entries(&self) -> BTreeMap<ResourceId, ResourceInfo> {
        self.read().clone()
    }

    /// Answers a listing query.
    pub fn list(&self, query: &ResourceQuery) -> ResourceListing {
        match query {
            ResourceQuery::All => ResourceListing::All(self.entries()),
            ResourceQuery::One(id) => ResourceListing::One(self.lookup(id.as_str())),
            ResourceQuery::IdsOnly => ResourceListing::Ids(self.list_ids()),
        }
    }

    /// Atomically replaces every entry.
    pub fn replace_all(&self, entries: impl IntoIterator<Item = (ResourceId, ResourceInfo)>) {
        let fresh: BTreeMap<ResourceId, ResourceInfo> = entries.into_iter().collect();
        tracing::debug!(resources = fresh.len(), "reloaded resource registry");
        *self.write() = fresh;
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
