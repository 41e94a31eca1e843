//! Configuration structures and types for release-publisher
//!
//! This module provides type-safe configuration management with serde support.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::core::error::ConfigError;
use crate::core::retry::{
    DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL, ExponentialBackoff, FixedInterval, Jittered,
    RetryOptions, RetryPolicy,
};
use crate::core::traits::{PackageId, PackageSpec};

/// Supported configuration schema version
pub const CONFIG_VERSION: &str = "1.0";

/// Default cargo sparse index
pub const DEFAULT_INDEX_URL: &str = "https://index.crates.io";

/// Default environment variable holding the registry token
pub const DEFAULT_TOKEN_ENV: &str = "CARGO_REGISTRY_TOKEN";

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseConfig {
    /// Schema version
    #[serde(default = "default_version")]
    pub version: String,

    /// Registry to publish to
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Resolvability polling and publish retry budgets
    #[serde(default)]
    pub retry: RetryConfig,

    /// Run-wide options
    #[serde(default)]
    pub release: ReleaseOptionsConfig,

    /// Dependencies outside the release, assumed already resolvable
    #[serde(default)]
    pub external: Vec<String>,

    /// Packages in declaration order
    #[serde(default)]
    pub packages: Vec<PackageConfig>,

    /// Directory relative package paths resolve against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

/// Registry implementation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RegistryKind {
    /// `cargo publish` plus the cargo sparse index
    #[default]
    Cargo,
    /// No side effects; every package is accepted and resolvable at once
    DryRun,
}

impl RegistryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryKind::Cargo => "cargo",
            RegistryKind::DryRun => "dry-run",
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    pub kind: RegistryKind,

    /// Alternate cargo registry name (`cargo publish --registry <name>`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Sparse index base URL used for resolvability checks
    pub index_url: String,

    /// Environment variable the token is read from
    pub token_env: String,

    /// Upper bound for a single `cargo publish` invocation
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            kind: RegistryKind::Cargo,
            name: None,
            index_url: DEFAULT_INDEX_URL.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            command_timeout: Duration::from_secs(10 * 60),
        }
    }
}

/// Backoff strategy between resolvability polls
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    #[default]
    Fixed,
    Exponential,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub strategy: RetryStrategy,

    /// Fixed interval, or the first wait for exponential backoff
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Cap on a single exponential wait
    #[serde(with = "humantime_serde")]
    pub max_interval: Duration,

    pub multiplier: f64,

    /// Deadline for a package to become resolvable after publishing
    #[serde(with = "humantime_serde")]
    pub max_wait: Duration,

    /// Fraction (0.0..=1.0) each wait may be shortened by at random
    pub jitter: f64,

    /// Publish attempts on transient errors, including the first
    pub publish_attempts: u32,

    /// First backoff between publish attempts
    #[serde(with = "humantime_serde")]
    pub publish_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: RetryStrategy::Fixed,
            interval: DEFAULT_POLL_INTERVAL,
            max_interval: Duration::from_secs(60),
            multiplier: 2.0,
            max_wait: DEFAULT_MAX_WAIT,
            jitter: 0.0,
            publish_attempts: 3,
            publish_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    /// Resolvability policy described by this configuration
    pub fn build_policy(&self) -> Arc<dyn RetryPolicy> {
        match (self.strategy, self.jitter > 0.0) {
            (RetryStrategy::Fixed, false) => {
                Arc::new(FixedInterval::new(self.interval, self.max_wait))
            }
            (RetryStrategy::Fixed, true) => Arc::new(Jittered::new(
                FixedInterval::new(self.interval, self.max_wait),
                self.jitter,
            )),
            (RetryStrategy::Exponential, jitter) => {
                let backoff = ExponentialBackoff {
                    initial: self.interval,
                    multiplier: self.multiplier,
                    max_interval: self.max_interval,
                    max_wait: self.max_wait,
                };
                if jitter {
                    Arc::new(Jittered::new(backoff, self.jitter))
                } else {
                    Arc::new(backoff)
                }
            }
        }
    }

    /// Budget for retrying transient publish failures
    pub fn publish_retry_options(&self) -> RetryOptions {
        RetryOptions {
            max_attempts: self.publish_attempts,
            initial_delay: self.publish_backoff,
            max_delay: self.max_interval.max(self.publish_backoff),
            backoff_multiplier: 2.0,
        }
    }
}

/// Run-wide options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReleaseOptionsConfig {
    /// Packages allowed in flight at once (1 = strictly sequential)
    pub concurrency: usize,

    /// Start no new package after the first failure
    pub fail_fast: bool,

    /// Use the dry-run registry regardless of `registry.kind`
    pub dry_run: bool,
}

impl Default for ReleaseOptionsConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            fail_fast: false,
            dry_run: false,
        }
    }
}

/// A package entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PackageConfig {
    pub name: String,

    pub version: String,

    /// Source directory; defaults to `<base_dir>/<name>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Names of packages (in this release or external) this one depends on
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Dependencies of this package that are already published
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external: Vec<String>,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            registry: RegistryConfig::default(),
            retry: RetryConfig::default(),
            release: ReleaseOptionsConfig::default(),
            external: Vec::new(),
            packages: Vec::new(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl ReleaseConfig {
    /// Effective registry kind after applying dry-run
    pub fn effective_registry_kind(&self) -> RegistryKind {
        if self.release.dry_run {
            RegistryKind::DryRun
        } else {
            self.registry.kind
        }
    }

    /// Package specs in declaration order, with paths resolved
    ///
    /// Per-package `external` entries are folded into their `depends_on`
    /// list so the graph sees every declared dependency.
    pub fn package_specs(&self) -> Result<Vec<PackageSpec>, ConfigError> {
        self.packages
            .iter()
            .map(|pkg| {
                let id = PackageId::parse(&pkg.name, &pkg.version)?;
                let path = self.resolve_path(pkg);
                let mut deps = pkg.depends_on.clone();
                for ext in &pkg.external {
                    if !deps.contains(ext) {
                        deps.push(ext.clone());
                    }
                }
                Ok(PackageSpec::new(id, path).with_dependencies(deps))
            })
            .collect()
    }

    /// Every name declared external, globally or on a package
    pub fn external_names(&self) -> BTreeSet<String> {
        self.external
            .iter()
            .chain(self.packages.iter().flat_map(|p| p.external.iter()))
            .cloned()
            .collect()
    }

    fn resolve_path(&self, pkg: &PackageConfig) -> PathBuf {
        match &pkg.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.base_dir.join(path),
            None => self.base_dir.join(&pkg.name),
        }
    }

    /// Set the directory relative paths resolve against
    pub fn with_base_dir(mut self, base_dir: impl AsRef<Path>) -> Self {
        self.base_dir = base_dir.as_ref().to_path_buf();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::retry::RetryDecision;

    const SAMPLE: &str = r#"
version: "1.0"
registry:
  kind: cargo
  index_url: https://index.example.com
retry:
  interval: 2s
  max_wait: 1m
release:
  concurrency: 2
external: [tokio]
packages:
  - name: core
    version: 0.1.0
  - name: axum
    version: 0.1.0
    path: crates/axum
    depends_on: [core]
    external: [http]
"#;

    #[test]
    fn test_parse_yaml_with_defaults() {
        let config: ReleaseConfig = serde_yaml::from_str(SAMPLE).unwrap();

        assert_eq!(config.registry.index_url, "https://index.example.com");
        assert_eq!(config.registry.token_env, DEFAULT_TOKEN_ENV);
        assert_eq!(config.retry.interval, Duration::from_secs(2));
        assert_eq!(config.retry.max_wait, Duration::from_secs(60));
        assert_eq!(config.retry.publish_attempts, 3);
        assert_eq!(config.release.concurrency, 2);
        assert!(!config.release.fail_fast);
        assert_eq!(config.packages.len(), 2);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: ReleaseConfig = serde_yaml::from_str("{}").unwrap();

        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.registry, RegistryConfig::default());
        assert_eq!(config.retry, RetryConfig::default());
        assert!(config.packages.is_empty());
    }

    #[test]
    fn test_package_specs_resolve_paths_and_externals() {
        let config: ReleaseConfig = serde_yaml::from_str(SAMPLE).unwrap();
        let config = config.with_base_dir("/work");

        let specs = config.package_specs().unwrap();

        assert_eq!(specs[0].path, PathBuf::from("/work/core"));
        assert_eq!(specs[1].path, PathBuf::from("/work/crates/axum"));
        assert_eq!(specs[1].depends_on, vec!["core", "http"]);

        let external = config.external_names();
        assert!(external.contains("tokio"));
        assert!(external.contains("http"));
    }

    #[test]
    fn test_package_specs_reject_bad_version() {
        let mut config = ReleaseConfig::default();
        config.packages.push(PackageConfig {
            name: "core".to_string(),
            version: "one".to_string(),
            path: None,
            depends_on: Vec::new(),
            external: Vec::new(),
        });

        assert!(matches!(
            config.package_specs(),
            Err(ConfigError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_build_fixed_policy() {
        let retry = RetryConfig {
            interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(20),
            ..Default::default()
        };

        let policy = retry.build_policy();
        assert_eq!(
            policy.next(1, Duration::ZERO),
            RetryDecision::Wait(Duration::from_secs(5))
        );
        assert_eq!(policy.next(5, Duration::from_secs(20)), RetryDecision::GiveUp);
    }

    #[test]
    fn test_build_exponential_policy() {
        let retry = RetryConfig {
            strategy: RetryStrategy::Exponential,
            interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(8),
            ..Default::default()
        };

        let policy = retry.build_policy();
        assert_eq!(
            policy.next(3, Duration::from_secs(3)),
            RetryDecision::Wait(Duration::from_secs(4))
        );
        assert_eq!(
            policy.next(6, Duration::from_secs(20)),
            RetryDecision::Wait(Duration::from_secs(8))
        );
    }

    #[test]
    fn test_dry_run_overrides_registry_kind() {
        let mut config = ReleaseConfig::default();
        assert_eq!(config.effective_registry_kind(), RegistryKind::Cargo);

        config.release.dry_run = true;
        assert_eq!(config.effective_registry_kind(), RegistryKind::DryRun);
    }

    #[test]
    fn test_toml_round_trip_keeps_durations_readable() {
        let config: ReleaseConfig = serde_yaml::from_str(SAMPLE).unwrap();
        let rendered = toml::to_string(&config.retry).unwrap();

        assert!(rendered.contains("interval = \"2s\""));
        assert!(rendered.contains("max_wait = \"1m\""));
    }
}
