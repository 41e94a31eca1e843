//! Configuration file loader for release-publisher
//!
//! This module provides configuration loading, layering, and validation.

use super::config::*;
use crate::core::error::ConfigError;
use crate::core::retry::MAX_JITTER;
use crate::core::traits::PackageId;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Configuration file name looked up in the project directory
pub const CONFIG_FILENAME: &str = ".release-config.yaml";

lazy_static! {
    /// `${VAR_NAME}` references inside string values
    static ref ENV_VAR_REGEX: Regex =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid");
}

/// Values that override the configuration file
///
/// Filled from the command line, or from `RELEASE_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub dry_run: Option<bool>,
    pub max_wait: Option<Duration>,
    pub poll_interval: Option<Duration>,
    pub concurrency: Option<usize>,
    pub fail_fast: Option<bool>,
}

impl ConfigOverrides {
    /// Read overrides from `RELEASE_*` variables
    pub fn from_env(env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Ok(Self {
            dry_run: env_value(env, "RELEASE_DRY_RUN", parse_bool)?,
            max_wait: env_value(env, "RELEASE_MAX_WAIT", parse_duration)?,
            poll_interval: env_value(env, "RELEASE_POLL_INTERVAL", parse_duration)?,
            concurrency: env_value(env, "RELEASE_CONCURRENCY", |v| {
                v.parse::<usize>().map_err(|e| e.to_string())
            })?,
            fail_fast: env_value(env, "RELEASE_FAIL_FAST", parse_bool)?,
        })
    }

    fn apply(&self, config: &mut ReleaseConfig) {
        if let Some(dry_run) = self.dry_run {
            config.release.dry_run = dry_run;
        }
        if let Some(max_wait) = self.max_wait {
            config.retry.max_wait = max_wait;
        }
        if let Some(interval) = self.poll_interval {
            config.retry.interval = interval;
        }
        if let Some(concurrency) = self.concurrency {
            config.release.concurrency = concurrency;
        }
        if let Some(fail_fast) = self.fail_fast {
            config.release.fail_fast = fail_fast;
        }
    }
}

fn env_value<T>(
    env: &HashMap<String, String>,
    key: &str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<Option<T>, ConfigError> {
    match env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        Some(raw) => parse(raw).map(Some).map_err(|message| ConfigError::Invalid {
            field: format!("env.{}", key),
            message,
        }),
        None => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got '{}'", other)),
    }
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    humantime::parse_duration(raw).map_err(|e| e.to_string())
}

/// Configuration load options
#[derive(Debug, Clone, Default)]
pub struct ConfigLoadOptions {
    /// Explicit config file; defaults to `<project_path>/.release-config.yaml`
    pub config_path: Option<PathBuf>,

    /// Project path to look up the default config file in
    pub project_path: PathBuf,

    /// CLI arguments (highest priority)
    pub overrides: ConfigOverrides,

    /// Environment variables
    pub env: HashMap<String, String>,
}

impl ConfigLoadOptions {
    /// Config file this load reads
    pub fn resolved_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| self.project_path.join(CONFIG_FILENAME))
    }
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    /// Is configuration valid?
    pub valid: bool,

    /// Validation errors
    pub errors: Vec<ConfigValidationError>,

    /// Validation warnings
    pub warnings: Vec<ConfigValidationWarning>,
}

impl ConfigValidationResult {
    /// First error as a [`ConfigError`], if any
    pub fn into_error(self) -> Option<ConfigError> {
        self.errors.into_iter().next().map(|e| ConfigError::Invalid {
            field: e.field,
            message: e.message,
        })
    }
}

/// Configuration validation error
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationError {
    /// Field path (e.g., "retry.interval")
    pub field: String,

    /// Error message
    pub message: String,

    /// Expected type/value
    pub expected: Option<String>,

    /// Actual type/value
    pub actual: Option<String>,
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationWarning {
    /// Field path
    pub field: String,

    /// Warning message
    pub message: String,

    /// Suggestion
    pub suggestion: Option<String>,
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables (`RELEASE_*`)
    /// 3. Config file (YAML, or TOML when the extension is `.toml`)
    /// 4. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<ReleaseConfig, ConfigError> {
        let path = options.resolved_path();

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| ConfigError::Read {
                path: path.clone(),
                message: e.to_string(),
            })?;

        let mut config = Self::parse(&content, &path)?;

        // 2. Environment variables
        ConfigOverrides::from_env(&options.env)?.apply(&mut config);

        // 1. CLI arguments
        options.overrides.apply(&mut config);

        Self::expand_env_vars(&mut config, &options.env);

        tracing::debug!(
            path = %path.display(),
            packages = config.packages.len(),
            registry = config.effective_registry_kind().as_str(),
            "configuration loaded"
        );

        Ok(config)
    }

    /// Parse a config document; relative paths resolve against its directory
    pub fn parse(content: &str, path: &Path) -> Result<ReleaseConfig, ConfigError> {
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let config: ReleaseConfig = if is_toml {
            toml::from_str(content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };

        let base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(config.with_base_dir(base_dir))
    }

    /// Expand `${VAR}` references in the index URL and package paths
    fn expand_env_vars(config: &mut ReleaseConfig, env: &HashMap<String, String>) {
        config.registry.index_url = Self::expand_string(&config.registry.index_url, env);

        for package in &mut config.packages {
            if let Some(path) = &package.path {
                let expanded = Self::expand_string(&path.to_string_lossy(), env);
                package.path = Some(PathBuf::from(expanded));
            }
        }
    }

    /// Expand environment variables in a single string
    ///
    /// Unknown variables are left in place.
    fn expand_string(input: &str, env: &HashMap<String, String>) -> String {
        ENV_VAR_REGEX
            .replace_all(input, |caps: &Captures| match env.get(&caps[1]) {
                Some(value) => value.clone(),
                None => {
                    tracing::warn!(variable = &caps[1], "environment variable not set");
                    caps[0].to_string()
                }
            })
            .into_owned()
    }

    /// Validate configuration
    pub fn validate(config: &ReleaseConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Check version (required)
        if config.version.is_empty() {
            errors.push(ConfigValidationError {
                field: "version".to_string(),
                message: "Version is required".to_string(),
                expected: Some(format!("string (e.g., \"{}\")", CONFIG_VERSION)),
                actual: Some("empty".to_string()),
            });
        } else if config.version != CONFIG_VERSION {
            warnings.push(ConfigValidationWarning {
                field: "version".to_string(),
                message: format!("Unknown version: {}", config.version),
                suggestion: Some(format!(
                    "Currently supported version is \"{}\" only",
                    CONFIG_VERSION
                )),
            });
        }

        // 2. Registry
        Self::validate_registry(config, &mut errors, &mut warnings);

        // 3. Retry budgets
        Self::validate_retry(&config.retry, &mut errors, &mut warnings);

        // 4. Run options
        if config.release.concurrency == 0 {
            errors.push(ConfigValidationError {
                field: "release.concurrency".to_string(),
                message: "concurrency must be at least 1".to_string(),
                expected: Some("integer >= 1".to_string()),
                actual: Some("0".to_string()),
            });
        }

        // 5. Packages
        Self::validate_packages(config, &mut errors, &mut warnings);

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    fn validate_registry(
        config: &ReleaseConfig,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        let registry = &config.registry;

        if config.effective_registry_kind() == RegistryKind::Cargo {
            if !(registry.index_url.starts_with("https://")
                || registry.index_url.starts_with("http://"))
            {
                errors.push(ConfigValidationError {
                    field: "registry.index_url".to_string(),
                    message: "index_url must be an http(s) URL".to_string(),
                    expected: Some("https://...".to_string()),
                    actual: Some(registry.index_url.clone()),
                });
            }

            if registry.token_env.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: "registry.token_env".to_string(),
                    message: "token_env is required".to_string(),
                    expected: Some("environment variable name".to_string()),
                    actual: Some("empty".to_string()),
                });
            }

            if registry.command_timeout.is_zero() {
                errors.push(ConfigValidationError {
                    field: "registry.command_timeout".to_string(),
                    message: "command_timeout must be positive".to_string(),
                    expected: Some("duration (e.g., \"10m\")".to_string()),
                    actual: Some("0s".to_string()),
                });
            }
        } else if registry.name.is_some() {
            warnings.push(ConfigValidationWarning {
                field: "registry.name".to_string(),
                message: "registry name is ignored in dry-run mode".to_string(),
                suggestion: None,
            });
        }

        if ENV_VAR_REGEX.is_match(&registry.index_url) {
            warnings.push(ConfigValidationWarning {
                field: "registry.index_url".to_string(),
                message: "index_url references an unset environment variable".to_string(),
                suggestion: Some("Export the variable before running".to_string()),
            });
        }
    }

    fn validate_retry(
        retry: &RetryConfig,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        if retry.interval.is_zero() {
            errors.push(ConfigValidationError {
                field: "retry.interval".to_string(),
                message: "poll interval must be positive".to_string(),
                expected: Some("duration (e.g., \"5s\")".to_string()),
                actual: Some("0s".to_string()),
            });
        }

        if retry.max_interval.is_zero() {
            errors.push(ConfigValidationError {
                field: "retry.max_interval".to_string(),
                message: "max interval must be positive".to_string(),
                expected: Some("duration (e.g., \"1m\")".to_string()),
                actual: Some("0s".to_string()),
            });
        }

        if !(0.0..=MAX_JITTER).contains(&retry.jitter) {
            errors.push(ConfigValidationError {
                field: "retry.jitter".to_string(),
                message: "jitter must be a fraction of at most 0.9".to_string(),
                expected: Some(format!("0.0 ..= {}", MAX_JITTER)),
                actual: Some(retry.jitter.to_string()),
            });
        }

        if retry.publish_attempts == 0 {
            errors.push(ConfigValidationError {
                field: "retry.publish_attempts".to_string(),
                message: "at least one publish attempt is required".to_string(),
                expected: Some("integer >= 1".to_string()),
                actual: Some("0".to_string()),
            });
        }

        if retry.strategy == RetryStrategy::Exponential {
            if retry.multiplier.is_nan() || retry.multiplier < 1.0 {
                errors.push(ConfigValidationError {
                    field: "retry.multiplier".to_string(),
                    message: "multiplier must be at least 1.0".to_string(),
                    expected: Some("number >= 1.0".to_string()),
                    actual: Some(retry.multiplier.to_string()),
                });
            }

            if retry.max_interval < retry.interval {
                warnings.push(ConfigValidationWarning {
                    field: "retry.max_interval".to_string(),
                    message: "max_interval is shorter than interval".to_string(),
                    suggestion: Some("Every wait will be capped at max_interval".to_string()),
                });
            }
        }

        if retry.max_wait < retry.interval {
            warnings.push(ConfigValidationWarning {
                field: "retry.max_wait".to_string(),
                message: "max_wait is shorter than one poll interval".to_string(),
                suggestion: Some("Packages will get at most two polls".to_string()),
            });
        }
    }

    fn validate_packages(
        config: &ReleaseConfig,
        errors: &mut Vec<ConfigValidationError>,
        warnings: &mut Vec<ConfigValidationWarning>,
    ) {
        let names: HashSet<&str> = config.packages.iter().map(|p| p.name.as_str()).collect();

        for (i, package) in config.packages.iter().enumerate() {
            if package.name.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: format!("packages[{}].name", i),
                    message: "name is required".to_string(),
                    expected: Some("non-empty string".to_string()),
                    actual: Some("empty".to_string()),
                });
                continue;
            }

            if let Err(e) = PackageId::parse(&package.name, &package.version) {
                errors.push(ConfigValidationError {
                    field: format!("packages[{}].version", i),
                    message: e.to_string(),
                    expected: Some("SemVer (e.g., 1.2.3)".to_string()),
                    actual: Some(package.version.clone()),
                });
            }

            for ext in &package.external {
                if names.contains(ext.as_str()) {
                    warnings.push(ConfigValidationWarning {
                        field: format!("packages[{}].external", i),
                        message: format!("'{}' is also released here", ext),
                        suggestion: Some(
                            "The in-release package is waited for; drop the external entry"
                                .to_string(),
                        ),
                    });
                }
            }
        }

        for ext in &config.external {
            if names.contains(ext.as_str()) {
                warnings.push(ConfigValidationWarning {
                    field: "external".to_string(),
                    message: format!("'{}' is also released here", ext),
                    suggestion: Some(
                        "The in-release package is waited for; drop the external entry"
                            .to_string(),
                    ),
                });
            }
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("✅ Configuration validation succeeded".to_string());
        } else {
            lines.push("❌ Configuration has errors".to_string());
        }

        if !result.errors.is_empty() {
            lines.push("\n🔴 Errors:".to_string());
            for error in &result.errors {
                lines.push(format!("  - [{}] {}", error.field, error.message));
                if let (Some(expected), Some(actual)) = (&error.expected, &error.actual) {
                    lines.push(format!("    Expected: {}", expected));
                    lines.push(format!("    Actual: {}", actual));
                }
            }
        }

        if !result.warnings.is_empty() {
            lines.push("\n🟡 Warnings:".to_string());
            for warning in &result.warnings {
                lines.push(format!("  - [{}] {}", warning.field, warning.message));
                if let Some(suggestion) = &warning.suggestion {
                    lines.push(format!("    Suggestion: {}", suggestion));
                }
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::retry::RetryDecision;
    use tempfile::TempDir;

    const YAML: &str = r#"
version: "1.0"
registry:
  index_url: ${INDEX_HOST}/index
retry:
  interval: 5s
  max_wait: 10m
packages:
  - name: core
    version: 0.1.0
    path: ${CRATES_DIR}/core
  - name: axum
    version: 0.1.0
    depends_on: [core]
"#;

    fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_load_yaml_from_project_dir() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, CONFIG_FILENAME, YAML);

        let config = ConfigLoader::load(ConfigLoadOptions {
            project_path: dir.path().to_path_buf(),
            env: env(&[("INDEX_HOST", "https://mirror.local"), ("CRATES_DIR", "crates")]),
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(config.registry.index_url, "https://mirror.local/index");
        assert_eq!(config.packages[0].path, Some(PathBuf::from("crates/core")));
        assert_eq!(config.base_dir, dir.path());

        let specs = config.package_specs().unwrap();
        assert_eq!(specs[0].path, dir.path().join("crates/core"));
        assert_eq!(specs[1].path, dir.path().join("axum"));
    }

    #[tokio::test]
    async fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "release.toml",
            r#"
[registry]
kind = "dry-run"

[retry]
interval = "250ms"

[[packages]]
name = "core"
version = "1.0.0"
"#,
        );

        let config = ConfigLoader::load(ConfigLoadOptions {
            config_path: Some(path),
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(config.registry.kind, RegistryKind::DryRun);
        assert_eq!(config.retry.interval, Duration::from_millis(250));
        assert_eq!(config.packages.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();

        let result = ConfigLoader::load(ConfigLoadOptions {
            project_path: dir.path().to_path_buf(),
            ..Default::default()
        })
        .await;

        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[tokio::test]
    async fn test_malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "bad.yaml", "packages: [unterminated");

        let result = ConfigLoader::load(ConfigLoadOptions {
            config_path: Some(path),
            ..Default::default()
        })
        .await;

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_cli_overrides_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "release.yaml", YAML);

        let config = ConfigLoader::load(ConfigLoadOptions {
            config_path: Some(path),
            overrides: ConfigOverrides {
                max_wait: Some(Duration::from_secs(30)),
                ..Default::default()
            },
            env: env(&[
                ("RELEASE_MAX_WAIT", "2m"),
                ("RELEASE_POLL_INTERVAL", "1s"),
                ("RELEASE_CONCURRENCY", "4"),
                ("RELEASE_FAIL_FAST", "true"),
            ]),
            ..Default::default()
        })
        .await
        .unwrap();

        assert_eq!(config.retry.max_wait, Duration::from_secs(30));
        assert_eq!(config.retry.interval, Duration::from_secs(1));
        assert_eq!(config.release.concurrency, 4);
        assert!(config.release.fail_fast);
        assert!(!config.release.dry_run);
    }

    #[test]
    fn test_invalid_env_override() {
        let result = ConfigOverrides::from_env(&env(&[("RELEASE_CONCURRENCY", "many")]));

        assert!(matches!(
            result,
            Err(ConfigError::Invalid { ref field, .. }) if field == "env.RELEASE_CONCURRENCY"
        ));
    }

    #[test]
    fn test_expand_string_leaves_unknown_vars() {
        let result = ConfigLoader::expand_string(
            "${HOST}/${MISSING}",
            &env(&[("HOST", "https://index.local")]),
        );

        assert_eq!(result, "https://index.local/${MISSING}");
    }

    #[test]
    fn test_validate_default_config_with_package() {
        let mut config = ReleaseConfig::default();
        config.packages.push(PackageConfig {
            name: "core".to_string(),
            version: "0.1.0".to_string(),
            path: None,
            depends_on: Vec::new(),
            external: Vec::new(),
        });

        let result = ConfigLoader::validate(&config);

        assert!(result.valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_interval_and_concurrency() {
        let mut config = ReleaseConfig::default();
        config.retry.interval = Duration::ZERO;
        config.release.concurrency = 0;

        let result = ConfigLoader::validate(&config);

        assert!(!result.valid);
        let fields: Vec<_> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"retry.interval"));
        assert!(fields.contains(&"release.concurrency"));
    }

    #[test]
    fn test_validate_rejects_waits_that_collapse_to_zero() {
        let mut config = ReleaseConfig::default();
        config.retry.strategy = RetryStrategy::Exponential;
        config.retry.max_interval = Duration::ZERO;
        config.retry.jitter = 1.0;

        let result = ConfigLoader::validate(&config);

        assert!(!result.valid);
        let fields: Vec<_> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"retry.max_interval"));
        assert!(fields.contains(&"retry.jitter"));
    }

    #[test]
    fn test_valid_retry_config_never_waits_zero() {
        let mut config = ReleaseConfig::default();
        config.retry.strategy = RetryStrategy::Exponential;
        config.retry.max_interval = Duration::from_millis(1);
        config.retry.jitter = MAX_JITTER;
        assert!(ConfigLoader::validate(&config).valid);

        let policy = config.retry.build_policy();
        for attempt in 1..20 {
            match policy.next(attempt, Duration::ZERO) {
                RetryDecision::Wait(d) => assert!(!d.is_zero(), "attempt {attempt} waits 0"),
                RetryDecision::GiveUp => panic!("unexpected give up"),
            }
        }
    }

    #[test]
    fn test_validate_bad_version_and_url() {
        let mut config = ReleaseConfig::default();
        config.registry.index_url = "index.crates.io".to_string();
        config.packages.push(PackageConfig {
            name: "core".to_string(),
            version: "latest".to_string(),
            path: None,
            depends_on: Vec::new(),
            external: Vec::new(),
        });

        let result = ConfigLoader::validate(&config);

        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].field, "registry.index_url");
        assert_eq!(result.errors[1].field, "packages[0].version");

        let error = result.into_error().unwrap();
        assert_eq!(error.code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_dry_run_skips_registry_checks() {
        let mut config = ReleaseConfig::default();
        config.registry.index_url = String::new();
        config.release.dry_run = true;

        assert!(ConfigLoader::validate(&config).valid);
    }

    #[test]
    fn test_validate_unknown_version_warning() {
        let config = ReleaseConfig {
            version: "2.0".to_string(),
            ..Default::default()
        };

        let result = ConfigLoader::validate(&config);

        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].field, "version");
    }

    #[test]
    fn test_format_validation_result() {
        let result = ConfigValidationResult {
            valid: false,
            errors: vec![ConfigValidationError {
                field: "retry.interval".to_string(),
                message: "poll interval must be positive".to_string(),
                expected: Some("duration".to_string()),
                actual: Some("0s".to_string()),
            }],
            warnings: vec![ConfigValidationWarning {
                field: "external".to_string(),
                message: "'core' is also released here".to_string(),
                suggestion: None,
            }],
        };

        let formatted = ConfigLoader::format_validation_result(&result);

        assert!(formatted.contains("❌ Configuration has errors"));
        assert!(formatted.contains("[retry.interval]"));
        assert!(formatted.contains("Actual: 0s"));
        assert!(formatted.contains("🟡 Warnings:"));
    }
}
