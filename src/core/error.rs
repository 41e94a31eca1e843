//! Error handling for release publishing
//!
//! Configuration errors are fatal and always surface before the first
//! registry call. Registry errors are classified so the coordinator can tell
//! tolerated, retryable and fatal outcomes apart. Package failures are the
//! per-package reasons that end up in the release report.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading configuration or building the release graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("dependency cycle detected: {}", .cycle.join(" -> "))]
    Cycle { cycle: Vec<String> },

    #[error(
        "package '{package}' depends on '{dependency}', which is neither part of the release nor declared external"
    )]
    UnknownDependency { package: String, dependency: String },

    #[error("package '{name}' is declared more than once")]
    DuplicatePackage { name: String },

    #[error("release contains no packages")]
    EmptyRelease,

    #[error("failed to read config file {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("failed to parse config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("package '{package}' has invalid version '{version}': {message}")]
    InvalidVersion {
        package: String,
        version: String,
        message: String,
    },

    #[error("invalid configuration at '{field}': {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cycle { .. } => "DEPENDENCY_CYCLE",
            Self::UnknownDependency { .. } => "UNKNOWN_DEPENDENCY",
            Self::DuplicatePackage { .. } => "DUPLICATE_PACKAGE",
            Self::EmptyRelease => "EMPTY_RELEASE",
            Self::Read { .. } => "CONFIG_READ",
            Self::Parse { .. } => "CONFIG_PARSE",
            Self::InvalidVersion { .. } => "INVALID_VERSION",
            Self::Invalid { .. } => "INVALID_CONFIG",
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::Cycle { .. } => vec![
                "Remove one of the depends_on edges listed in the cycle",
                "Packages in a release must form a directed acyclic graph",
            ],
            Self::UnknownDependency { .. } => vec![
                "Add the dependency to `packages` if it is released together",
                "Otherwise list it under `external` (already published)",
            ],
            Self::DuplicatePackage { .. } => {
                vec!["Each package name may appear only once per release"]
            }
            Self::EmptyRelease => vec!["Declare at least one entry under `packages`"],
            Self::Read { .. } => vec![
                "Check the --config path",
                "Check file permissions",
            ],
            Self::Parse { .. } => vec![
                "Check the YAML/TOML syntax",
                "Durations use humantime syntax, e.g. 5s, 10m",
            ],
            Self::InvalidVersion { .. } => vec!["Use SemVer (e.g. 1.2.3)"],
            Self::Invalid { .. } => vec!["Run `release check` to list every problem"],
        }
    }
}

/// Errors returned by a registry publish call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The exact version is already on the registry.
    #[error("[{package}] version is already published")]
    AlreadyPublished { package: String },

    /// The registry refused the upload; retrying will not help.
    #[error("[{package}] registry rejected the upload: {message}")]
    Rejected { package: String, message: String },

    /// Network failure, 5xx, or the registry not seeing a fresh dependency yet.
    #[error("[{package}] transient registry error: {message}")]
    Transient { package: String, message: String },
}

impl PublishError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Terminal reason recorded for a package that did not become resolvable
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PackageFailure {
    #[error("registry rejected the upload: {message}")]
    Rejected { message: String },

    #[error("publish failed after {attempts} attempt(s): {message}")]
    PublishRetriesExhausted { attempts: u32, message: String },

    #[error("not resolvable after {attempts} poll(s) over {waited_ms}ms")]
    ResolvabilityTimeout { attempts: u32, waited_ms: u64 },

    #[error("blocked by {dependency}")]
    DependencyFailed { dependency: String },

    #[error("not started: release stopped after an earlier failure")]
    FailFast,

    #[error("release was cancelled")]
    Cancelled,

    #[error("publish task ended unexpectedly: {message}")]
    Internal { message: String },
}

impl PackageFailure {
    /// Get error code for this failure
    pub fn code(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "PUBLISH_REJECTED",
            Self::PublishRetriesExhausted { .. } => "TRANSIENT_NETWORK_ERROR",
            Self::ResolvabilityTimeout { .. } => "RESOLVABILITY_TIMEOUT",
            Self::DependencyFailed { .. } => "DEPENDENCY_FAILED",
            Self::FailFast => "FAIL_FAST",
            Self::Cancelled => "CANCELLED",
            Self::Internal { .. } => "INTERNAL",
        }
    }
}

/// Top-level error for a release run
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to set up registry '{registry}': {message}")]
    RegistrySetup { registry: String, message: String },

    #[error("failed to write report {}: {source}", .path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReleaseError {
    /// Process exit code for this error
    ///
    /// Configuration problems exit with 2 so CI can tell them apart from a
    /// release that ran and failed.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::RegistrySetup { .. } | Self::ReportWrite { .. } => 1,
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.code(),
            Self::RegistrySetup { .. } => "REGISTRY_SETUP",
            Self::ReportWrite { .. } => "REPORT_WRITE",
        }
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::Config(e) => e.suggested_actions(),
            Self::RegistrySetup { .. } => vec![
                "Check the `registry` section of the config",
                "Check that the index URL is reachable",
            ],
            Self::ReportWrite { .. } => vec!["Check that the report directory exists and is writable"],
        }
    }
}
