//! Registry client backed by `cargo publish` and the cargo sparse index

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::config::RegistryConfig;
use crate::core::error::{PublishError, ReleaseError};
use crate::core::traits::{PackageId, PackageSpec, RegistryClient};
use crate::registry::sparse_index::SparseIndex;
use crate::security::{CommandError, SafeCommandExecutor, SecureTokenManager};

/// stderr fragments meaning the version is already on the registry
const ALREADY_PUBLISHED_PATTERNS: &[&str] = &["already uploaded", "already exists"];

/// stderr fragments worth another publish attempt
///
/// The last three cover a dependency published moments ago that the index
/// does not serve yet.
const TRANSIENT_PATTERNS: &[&str] = &[
    "timed out",
    "timeout",
    "connection reset",
    "connection refused",
    "failed to connect",
    "dns error",
    "too many requests",
    "500 internal server error",
    "502 bad gateway",
    "503 service unavailable",
    "504 gateway timeout",
    "no matching package named",
    "failed to select a version",
    "failed to get `",
];

/// Lines of stderr kept in a rejection message
const REJECTION_TAIL_LINES: usize = 5;

const INDEX_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Publishes crates with `cargo publish` and confirms them in the sparse index
#[derive(Debug)]
pub struct CargoRegistry {
    registry_name: Option<String>,
    token: SecureTokenManager,
    index: SparseIndex,
    command_timeout: Duration,
}

impl CargoRegistry {
    pub fn new(config: &RegistryConfig, token: SecureTokenManager) -> Result<Self, ReleaseError> {
        let index = SparseIndex::new(&config.index_url, INDEX_REQUEST_TIMEOUT).map_err(|e| {
            ReleaseError::RegistrySetup {
                registry: "cargo".to_string(),
                message: e.to_string(),
            }
        })?;

        if !token.has_token() {
            tracing::warn!(
                token_env = token.token_env(),
                "no registry token set; relying on cargo's own credentials"
            );
        }

        Ok(Self {
            registry_name: config.name.clone(),
            token,
            index,
            command_timeout: config.command_timeout,
        })
    }

    /// Environment variable cargo reads the token from
    pub fn cargo_token_env(&self) -> String {
        match &self.registry_name {
            Some(name) => format!(
                "CARGO_REGISTRIES_{}_TOKEN",
                name.to_uppercase().replace('-', "_")
            ),
            None => "CARGO_REGISTRY_TOKEN".to_string(),
        }
    }

    fn manifest_path(package: &PackageSpec) -> PathBuf {
        package.path.join("Cargo.toml")
    }

    /// Arguments for `cargo`, excluding the program name
    pub fn publish_args(&self, package: &PackageSpec) -> Vec<String> {
        let mut args = vec![
            "publish".to_string(),
            "--manifest-path".to_string(),
            Self::manifest_path(package).to_string_lossy().into_owned(),
        ];

        if let Some(name) = &self.registry_name {
            args.push("--registry".to_string());
            args.push(name.clone());
        }

        args
    }
}

/// Map a failed `cargo publish` run to a publish error
pub fn classify_publish_failure(package: &str, stderr: &str) -> PublishError {
    let lower = stderr.to_lowercase();

    if ALREADY_PUBLISHED_PATTERNS.iter().any(|p| lower.contains(p)) {
        return PublishError::AlreadyPublished {
            package: package.to_string(),
        };
    }

    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let message = lines[lines.len().saturating_sub(REJECTION_TAIL_LINES)..].join(" | ");

    if TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p)) {
        PublishError::Transient {
            package: package.to_string(),
            message,
        }
    } else {
        PublishError::Rejected {
            package: package.to_string(),
            message: if message.is_empty() {
                "cargo publish exited with an error".to_string()
            } else {
                message
            },
        }
    }
}

#[async_trait]
impl RegistryClient for CargoRegistry {
    fn name(&self) -> &str {
        "cargo"
    }

    async fn publish(&self, package: &PackageSpec) -> Result<(), PublishError> {
        let label = package.id.to_string();

        let mut executor =
            SafeCommandExecutor::new(&package.path).map_err(|e| PublishError::Rejected {
                package: label.clone(),
                message: e.to_string(),
            })?;
        executor.set_timeout(self.command_timeout);
        if let Some(token) = self.token.token() {
            executor.set_secret_env(self.cargo_token_env(), token.clone());
        }

        let args = self.publish_args(package);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        tracing::info!(package = %label, registry = ?self.registry_name, "cargo publish");

        let output = match executor.execute("cargo", &arg_refs).await {
            Ok(output) => output,
            Err(CommandError::Timeout(limit)) => {
                return Err(PublishError::Transient {
                    package: label,
                    message: format!("cargo publish timed out after {:?}", limit),
                });
            }
            Err(e) => {
                return Err(PublishError::Rejected {
                    package: label,
                    message: e.to_string(),
                });
            }
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = self.token.mask(&String::from_utf8_lossy(&output.stderr));
        tracing::debug!(package = %label, stderr = %stderr, "cargo publish failed");

        Err(classify_publish_failure(&label, &stderr))
    }

    async fn is_resolvable(&self, id: &PackageId) -> bool {
        self.index.contains(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::PackageId;
    use secrecy::SecretString;

    fn registry(name: Option<&str>) -> CargoRegistry {
        let config = RegistryConfig {
            name: name.map(str::to_string),
            ..Default::default()
        };
        CargoRegistry::new(
            &config,
            SecureTokenManager::with_token(
                "CARGO_REGISTRY_TOKEN",
                SecretString::from("cio-secret-token"),
            ),
        )
        .unwrap()
    }

    fn spec(path: &str) -> PackageSpec {
        PackageSpec::new(PackageId::parse("core", "0.1.0").unwrap(), path)
    }

    #[test]
    fn test_publish_args_default_registry() {
        let args = registry(None).publish_args(&spec("/work/core"));

        assert_eq!(args, vec!["publish", "--manifest-path", "/work/core/Cargo.toml"]);
    }

    #[test]
    fn test_publish_args_alternate_registry() {
        let registry = registry(Some("my-corp"));
        let args = registry.publish_args(&spec("core"));

        assert_eq!(&args[3..], &["--registry", "my-corp"]);
        assert_eq!(registry.cargo_token_env(), "CARGO_REGISTRIES_MY_CORP_TOKEN");
    }

    #[test]
    fn test_token_never_on_command_line() {
        let args = registry(None).publish_args(&spec("core"));
        assert!(args.iter().all(|a| !a.contains("cio-secret-token")));
    }

    #[test]
    fn test_classify_already_published() {
        let stderr = "error: failed to publish to registry at https://crates.io\n\n\
                      Caused by:\n  the remote server responded with an error: \
                      crate version `0.1.0` is already uploaded";

        assert_eq!(
            classify_publish_failure("core@0.1.0", stderr),
            PublishError::AlreadyPublished {
                package: "core@0.1.0".to_string()
            }
        );
    }

    #[test]
    fn test_classify_index_lag_is_transient() {
        let stderr = "error: failed to prepare local package for uploading\n\n\
                      Caused by:\n  no matching package named `core` found\n  \
                      location searched: registry `crates-io`";

        assert!(classify_publish_failure("axum@0.1.0", stderr).is_transient());
    }

    #[test]
    fn test_classify_server_error_is_transient() {
        let stderr = "error: failed to publish\n\nCaused by:\n  \
                      the remote server responded with an error (status 503 Service Unavailable)";

        assert!(classify_publish_failure("core@0.1.0", stderr).is_transient());
    }

    #[test]
    fn test_classify_auth_error_is_rejected() {
        let stderr = "error: failed to publish\n\nCaused by:\n  \
                      the remote server responded with an error (status 403 Forbidden): \
                      this token does not have the required permissions";

        match classify_publish_failure("core@0.1.0", stderr) {
            PublishError::Rejected { message, .. } => {
                assert!(message.contains("403 Forbidden"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_empty_stderr() {
        match classify_publish_failure("core@0.1.0", "") {
            PublishError::Rejected { message, .. } => assert!(!message.is_empty()),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_package_dir_is_rejected() {
        let result = registry(None)
            .publish(&spec("/nonexistent/release-publisher/core"))
            .await;

        assert!(matches!(result, Err(PublishError::Rejected { .. })));
    }
}
