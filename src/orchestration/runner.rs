//! Release runner
//!
//! Glue between a loaded [`ReleaseConfig`] and the [`PublishCoordinator`]:
//! build the graph, run it, aggregate the [`ReleaseReport`].

use chrono::Utc;
use std::sync::Arc;
use tracing::Instrument;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::config::{RegistryKind, ReleaseConfig};
use crate::core::config_loader::ConfigLoader;
use crate::core::error::{ConfigError, ReleaseError};
use crate::core::retry::RetryPolicy;
use crate::core::traits::RegistryClient;
use crate::graph::PackageGraph;
use crate::orchestration::coordinator::{CoordinatorOptions, PublishCoordinator};
use crate::orchestration::report::ReleaseReport;

pub struct ReleaseRunner;

impl ReleaseRunner {
    /// Validate `config` and build its package graph
    ///
    /// Makes no registry calls. Any error here is a configuration error.
    pub fn plan(config: &ReleaseConfig) -> Result<PackageGraph, ConfigError> {
        if let Some(error) = ConfigLoader::validate(config).into_error() {
            return Err(error);
        }

        let specs = config.package_specs()?;
        PackageGraph::build(specs, config.external_names())
    }

    /// Coordinator options derived from `config`
    pub fn coordinator_options(config: &ReleaseConfig) -> CoordinatorOptions {
        CoordinatorOptions {
            concurrency: config.release.concurrency,
            fail_fast: config.release.fail_fast,
            publish_retry: config.retry.publish_retry_options(),
        }
    }

    /// Publish every package in `config` through `registry`
    ///
    /// Uses the retry policy described by `config.retry`.
    pub async fn run(
        config: &ReleaseConfig,
        registry: Arc<dyn RegistryClient>,
        cancel: CancellationToken,
    ) -> Result<ReleaseReport, ReleaseError> {
        let policy = config.retry.build_policy();
        Self::run_with_policy(config, registry, policy, cancel).await
    }

    /// Like [`ReleaseRunner::run`] with an injected retry policy
    pub async fn run_with_policy(
        config: &ReleaseConfig,
        registry: Arc<dyn RegistryClient>,
        policy: Arc<dyn RetryPolicy>,
        cancel: CancellationToken,
    ) -> Result<ReleaseReport, ReleaseError> {
        let graph = Self::plan(config)?;
        let dry_run = config.effective_registry_kind() == RegistryKind::DryRun;

        Ok(Self::run_graph(
            &graph,
            registry,
            policy,
            Self::coordinator_options(config),
            dry_run,
            cancel,
        )
        .await)
    }

    /// Run an already built graph
    pub async fn run_graph(
        graph: &PackageGraph,
        registry: Arc<dyn RegistryClient>,
        policy: Arc<dyn RetryPolicy>,
        options: CoordinatorOptions,
        dry_run: bool,
        cancel: CancellationToken,
    ) -> ReleaseReport {
        let run_id = Uuid::new_v4();
        let registry_name = registry.name().to_string();
        let started_at = Utc::now();

        let span = tracing::info_span!("release", %run_id, registry = %registry_name, dry_run);
        let packages = PublishCoordinator::new(registry, policy)
            .with_options(options)
            .run(graph, cancel)
            .instrument(span)
            .await;

        let report =
            ReleaseReport::new(run_id, started_at, Utc::now(), registry_name, dry_run, packages);

        tracing::info!(
            %run_id,
            status = report.status().as_str(),
            total = report.counts().total,
            resolvable = report.counts().resolvable,
            failed = report.counts().failed,
            skipped = report.counts().skipped,
            cancelled = report.counts().cancelled,
            "release finished"
        );

        report
    }
}
