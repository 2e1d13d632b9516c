//! Provisioner configuration
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use s3iam_core::config::{ConfigProvider, HotReloadConfigProvider, ProvisionerConfig, StaticConfigProvider};
//!
//! let provider = StaticConfigProvider::default();
//! assert_eq!(provider.snapshot().max_credentials_per_user, 2);
//!
//! let provider = HotReloadConfigProvider::default();
//! let mut config = ProvisionerConfig::default();
//! config.max_conflict_retries = 3;
//! provider.update(Arc::new(config));
//! assert_eq!(provider.snapshot().max_conflict_retries, 3);
//! ```

use crate::access::AccessMode;

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

/// Source of [`ProvisionerConfig`] snapshots.
///
/// The provisioner takes one snapshot per grant or revoke, so a single call never observes a
/// mix of old and new values.
pub trait ConfigProvider: Send + Sync + 'static {
    fn snapshot(&self) -> Arc<ProvisionerConfig>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ProvisionerConfig {
    /// Prefix of the user name derived from a grant id.
    ///
    /// Default: `cosi-user-`
    pub user_name_prefix: String,

    /// Number of access keys the backend lets one user hold.
    ///
    /// Reaching it does not stop a grant from minting a key, see
    /// [`IdentityManager::ensure_principal`](crate::identity::IdentityManager::ensure_principal).
    ///
    /// Default: 2
    pub max_credentials_per_user: usize,

    /// How many times a policy edit is re-run after losing a conditional write.
    ///
    /// Only backends with conditional writes can report a lost write.
    ///
    /// Default: 0
    pub max_conflict_retries: u32,

    /// Access mode used when a bucket access class carries no annotation.
    ///
    /// Default: `admin`
    pub default_access_mode: AccessMode,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            user_name_prefix: "cosi-user-".to_owned(),
            max_credentials_per_user: 2,
            max_conflict_retries: 0,
            default_access_mode: AccessMode::Admin,
        }
    }
}

/// Immutable configuration.
#[derive(Debug)]
pub struct StaticConfigProvider {
    inner: Arc<ProvisionerConfig>,
}

impl StaticConfigProvider {
    #[must_use]
    pub fn new(config: Arc<ProvisionerConfig>) -> Self {
        Self { inner: config }
    }
}

impl Default for StaticConfigProvider {
    fn default() -> Self {
        Self::new(Arc::new(ProvisionerConfig::default()))
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn snapshot(&self) -> Arc<ProvisionerConfig> {
        Arc::clone(&self.inner)
    }
}

/// Configuration that can be swapped at runtime.
#[derive(Debug)]
pub struct HotReloadConfigProvider {
    inner: ArcSwap<ProvisionerConfig>,
}

impl HotReloadConfigProvider {
    #[must_use]
    pub fn new(config: Arc<ProvisionerConfig>) -> Self {
        Self {
            inner: ArcSwap::from(config),
        }
    }

    /// Replaces the whole configuration atomically.
    pub fn update(&self, config: Arc<ProvisionerConfig>) {
        self.inner.store(config);
    }
}

impl Default for HotReloadConfigProvider {
    fn default() -> Self {
        Self::new(Arc::new(ProvisionerConfig::default()))
    }
}

impl ConfigProvider for HotReloadConfigProvider {
    fn snapshot(&self) -> Arc<ProvisionerConfig> {
        self.inner.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProvisionerConfig::default();
        assert_eq!(config.user_name_prefix, "cosi-user-");
        assert_eq!(config.max_credentials_per_user, 2);
        assert_eq!(config.max_conflict_retries, 0);
        assert_eq!(config.default_access_mode, AccessMode::Admin);
    }

    #[test]
    fn test_static_snapshots_share() {
        let provider = StaticConfigProvider::default();
        assert!(Arc::ptr_eq(&provider.snapshot(), &provider.snapshot()));
    }

    #[test]
    fn test_hot_reload_snapshot_immutable() {
        let provider = HotReloadConfigProvider::default();
        let before = provider.snapshot();

        provider.update(Arc::new(ProvisionerConfig {
            max_conflict_retries: 5,
            ..Default::default()
        }));

        assert_eq!(before.max_conflict_retries, 0);
        assert_eq!(provider.snapshot().max_conflict_retries, 5);
    }

    #[test]
    fn test_serde_default_values() {
        let json = r#"{"user_name_prefix": "tenant-a-", "default_access_mode": "ro"}"#;
        let config: ProvisionerConfig = serde_json::from_str(json).expect("deserialize failed");

        assert_eq!(config.user_name_prefix, "tenant-a-");
        assert_eq!(config.default_access_mode, AccessMode::ReadOnly);
        assert_eq!(config.max_credentials_per_user, 2);
    }

    #[test]
    fn test_provider_trait_object() {
        let provider: Arc<dyn ConfigProvider> = Arc::new(HotReloadConfigProvider::default());
        assert_eq!(provider.snapshot().max_credentials_per_user, 2);
    }
}
