//! Registry that touches nothing

use async_trait::async_trait;

use crate::core::error::PublishError;
use crate::core::traits::{PackageId, PackageSpec, RegistryClient};

/// Accepts every publish and reports every package resolvable at once
///
/// Lets `--dry-run` exercise ordering, retries and reporting end to end.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunRegistry;

impl DryRunRegistry {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RegistryClient for DryRunRegistry {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn publish(&self, package: &PackageSpec) -> Result<(), PublishError> {
        tracing::info!(
            package = %package.id,
            path = %package.path.display(),
            "dry run: would publish"
        );
        Ok(())
    }

    async fn is_resolvable(&self, _id: &PackageId) -> bool {
        true
    }
}
