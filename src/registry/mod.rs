//! Registry client implementations

pub mod cargo_registry;
pub mod dry_run;
#[cfg(any(test, feature = "testing"))]
pub mod fakes;
pub mod sparse_index;

pub use cargo_registry::{CargoRegistry, classify_publish_failure};
pub use dry_run::DryRunRegistry;
#[cfg(any(test, feature = "testing"))]
pub use fakes::{PackageScript, PublishScript, RegistryCall, ScriptedRegistry};
pub use sparse_index::{IndexEntry, IndexError, SparseIndex};

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::config::{RegistryKind, ReleaseConfig};
use crate::core::error::ReleaseError;
use crate::core::traits::RegistryClient;
use crate::security::SecureTokenManager;

/// Build the registry a configuration asks for
///
/// The token is read from `env` here, once, and handed to the registry.
pub fn from_config(
    config: &ReleaseConfig,
    env: &HashMap<String, String>,
) -> Result<Arc<dyn RegistryClient>, ReleaseError> {
    match config.effective_registry_kind() {
        RegistryKind::DryRun => Ok(Arc::new(DryRunRegistry::new())),
        RegistryKind::Cargo => {
            let token = SecureTokenManager::from_map(&config.registry.token_env, env);
            Ok(Arc::new(CargoRegistry::new(&config.registry, token)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_selects_registry() {
        let mut config = ReleaseConfig::default();
        let env = HashMap::new();

        assert_eq!(from_config(&config, &env).unwrap().name(), "cargo");

        config.release.dry_run = true;
        assert_eq!(from_config(&config, &env).unwrap().name(), "dry-run");
    }
}
