//! Hierarchical role-based access control.
//!
//! Access is granted by rules stored per role (or for everyone) over
//! dot-hierarchical resource identifiers such as `m:order.42`. A rule on
//! `m:order` covers every order record; rules without an action or condition
//! cover every action and need no predicate. The default behavior is
//! deny-by-default. Use [`Engine`] to grant, revoke and check access, and
//! [`ResourceRegistry`] to publish which resources exist.
//!
//! # Examples
//!
//! Granting and checking with the in-memory store (enable `memory-store`):
//! ```
//! use futures::executor::block_on;
//! use rs_aacl::{ActionName, EngineBuilder, ModelResource, PrincipalId, ResourceId, RoleName};
//! use rs_aacl::RuleSpec;
//! # #[cfg(feature = "memory-store")]
//! # {
//! use rs_aacl::MemoryStore;
//! let store = MemoryStore::new();
//! let admin = store.add_role(RoleName::try_from("admin").unwrap());
//! let alice = PrincipalId::try_from("alice").unwrap();
//! store.assign_role(alice.clone(), admin);
//!
//! let engine = EngineBuilder::new(store).build();
//! let spec = RuleSpec::role(admin).resource(ResourceId::try_from("m:user").unwrap());
//! block_on(engine.grant(spec)).unwrap();
//!
//! let record = ModelResource::record("user", 42).unwrap();
//! let delete = ActionName::try_from("delete").unwrap();
//! assert!(block_on(engine.check_allowed(Some(&alice), &record, Some(&delete))));
//! # }
//! ```
//!
//! Creating a process-local rule cache (enable `memory-cache`):
//! ```no_run
//! # #[cfg(feature = "memory-cache")]
//! # {
//! use rs_aacl::MemoryCache;
//! use std::time::Duration;
//! let cache = MemoryCache::new(1024).with_ttl(Duration::from_secs(30));
//! # let _ = cache;
//! # }
//! ```
#![forbid(unsafe_code)]

mod cache;
mod config;
mod engine;
mod error;
mod matching;
mod registry;
mod resource;
mod rule;
mod store;
mod types;
#[cfg(feature = "memory-cache")]
mod memory_cache;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::cache::{Cache, CachedRules, NoCache, RuleSetKey};
pub use crate::config::{CacheConfig, EngineConfig};
pub use crate::engine::{Decision, DenyReason, Engine, EngineBuilder, Session};
pub use crate::error::{Error, Result, StoreError};
pub use crate::registry::{ResourceInfo, ResourceListing, ResourceQuery, ResourceRegistry};
pub use crate::resource::{
    ControllerResource, MODEL_ACTIONS, ModelResource, Resource, ResourceType,
};
pub use crate::rule::{FieldFilter, NewRule, Rule, RuleFilter, RuleSpec, sort_by_specificity};
pub use crate::store::{GrantOutcome, RoleStore, RuleStore, Store};
pub use crate::types::{
    ActionName, ConditionName, PrincipalId, ResourceId, Role, RoleId, RoleName, RoleRef, RuleId,
};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;

#[cfg(feature = "memory-cache")]
pub use crate::memory_cache::MemoryCache;
