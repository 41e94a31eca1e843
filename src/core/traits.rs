//! Core traits and types for release publishing
//!
//! This module defines package identity and the registry seam the
//! coordinator publishes through.

use crate::core::error::{ConfigError, PublishError};
use async_trait::async_trait;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ============================================================================
// Package identity
// ============================================================================

/// Name and exact version of a package in a release
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageId {
    pub name: String,
    pub version: Version,
}

impl PackageId {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// Build an id from a name and a SemVer string
    ///
    /// # Examples
    ///
    /// ```
    /// use release_publisher::core::PackageId;
    ///
    /// let id = PackageId::parse("core", "0.1.0").unwrap();
    /// assert_eq!(id.to_string(), "core@0.1.0");
    /// ```
    pub fn parse(name: &str, version: &str) -> Result<Self, ConfigError> {
        let parsed = Version::parse(version).map_err(|e| ConfigError::InvalidVersion {
            package: name.to_string(),
            version: version.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self::new(name, parsed))
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// A package to publish, as declared in the release configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub id: PackageId,

    /// Source directory (the one holding the package manifest)
    pub path: PathBuf,

    /// Dependency names, in declaration order
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl PackageSpec {
    pub fn new(id: PackageId, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            path: path.into(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }
}

// ============================================================================
// Registry Client Trait
// ============================================================================

/// Capability over a remote package registry
///
/// Implementations stay thin: one upload per `publish` call and one lookup
/// per `is_resolvable` call. Retrying and sequencing belong to the
/// coordinator.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Registry name used in logs and reports (e.g. "cargo", "dry-run")
    fn name(&self) -> &str;

    /// Upload a package
    ///
    /// `AlreadyPublished` is tolerated by the coordinator, `Transient` is
    /// retried a bounded number of times, `Rejected` fails the package.
    async fn publish(&self, package: &PackageSpec) -> Result<(), PublishError>;

    /// Whether a downstream publish can already resolve `id`
    ///
    /// Never fails: an unreachable registry reads as "not yet resolvable".
    async fn is_resolvable(&self, id: &PackageId) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_id_display() {
        let id = PackageId::parse("axum", "1.2.3-beta.1").unwrap();
        assert_eq!(id.to_string(), "axum@1.2.3-beta.1");
    }

    #[test]
    fn test_package_id_rejects_invalid_version() {
        let result = PackageId::parse("core", "1.0");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidVersion { ref package, .. }) if package == "core"
        ));
    }

    #[test]
    fn test_package_spec_builder() {
        let spec = PackageSpec::new(PackageId::parse("axum", "0.1.0").unwrap(), "axum")
            .with_dependencies(["core", "tokio"]);

        assert_eq!(spec.name(), "axum");
        assert_eq!(spec.depends_on, vec!["core", "tokio"]);
        assert_eq!(spec.path, PathBuf::from("axum"));
    }

    #[test]
    fn test_package_spec_serialization() {
        let spec = PackageSpec::new(PackageId::parse("core", "0.1.0").unwrap(), "core");

        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"version\":\"0.1.0\""));

        let back: PackageSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
