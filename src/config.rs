use std::time::Duration;

use crate::types::RoleName;

/// Engine settings that can be loaded from a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Whether rules without a role apply to everyone.
    pub include_global_rules: bool,
    /// Role whose rules also apply to requests without a principal.
    pub guest_role: Option<RoleName>,
    /// Cross-call rule cache settings.
    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            include_global_rules: true,
            guest_role: None,
            cache: CacheConfig::default(),
        }
    }
}

/// Settings for the in-memory rule cache.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CacheConfig {
    /// Maximum number of cached rule sets; zero disables caching.
    pub capacity: usize,
    /// Entry lifetime in seconds.
    pub ttl_secs: Option<u64>,
}

impl CacheConfig {
    /// Entry lifetime.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl_secs: Some(300),
        }
    }
}
