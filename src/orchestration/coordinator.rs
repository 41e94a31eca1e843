//! Publish coordinator
//!
//! Drives a [`PackageGraph`] to completion against a [`RegistryClient`].
//! Each in-flight package runs in its own task: publish once (retrying
//! transient errors), then poll resolvability under the [`RetryPolicy`].
//! A single loop owns every state transition. It starts a package only when
//! all of its in-graph dependencies are `Resolvable`, so the dependency
//! check and the `Publishing` transition cannot interleave with other
//! updates.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use crate::core::error::{PackageFailure, PublishError};
use crate::core::retry::{
    PollOutcome, RetryAttempt, RetryDecision, RetryManager, RetryOptions, RetryPolicy,
};
use crate::core::state_machine::{PackageState, PackageStateMachine};
use crate::core::traits::{PackageSpec, RegistryClient};
use crate::graph::PackageGraph;
use crate::orchestration::report::PackageReport;

/// Coordinator options
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Packages in flight at once (default: 1, strictly sequential)
    pub concurrency: usize,

    /// Start nothing new after the first failure (default: false)
    pub fail_fast: bool,

    /// Budget for transient publish errors
    pub publish_retry: RetryOptions,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            fail_fast: false,
            publish_retry: RetryOptions::default(),
        }
    }
}

/// Sent by a task once the registry accepted its package
#[derive(Debug)]
enum Progress {
    Published { index: usize, publish_attempts: u32 },
}

#[derive(Debug)]
enum TaskOutcome {
    Resolvable,
    Failed(PackageFailure),
    Cancelled,
}

/// Final word of a package task
#[derive(Debug)]
struct TaskResult {
    index: usize,
    /// Whether the registry accepted the package
    published: bool,
    outcome: TaskOutcome,
    attempts: u32,
    publish_attempts: u32,
    waited: Duration,
    polls: Vec<RetryAttempt>,
}

impl TaskResult {
    fn new(index: usize, outcome: TaskOutcome) -> Self {
        Self {
            index,
            published: false,
            outcome,
            attempts: 0,
            publish_attempts: 0,
            waited: Duration::ZERO,
            polls: Vec::new(),
        }
    }
}

/// Bookkeeping for one package, owned by the coordinator loop
#[derive(Debug)]
struct Tracker {
    machine: PackageStateMachine,
    attempts: u32,
    publish_attempts: u32,
    waited: Duration,
    failure: Option<PackageFailure>,
    polls: Vec<RetryAttempt>,
}

impl Tracker {
    fn new(spec: &PackageSpec) -> Self {
        Self {
            machine: PackageStateMachine::new(spec.id.to_string()),
            attempts: 0,
            publish_attempts: 0,
            waited: Duration::ZERO,
            failure: None,
            polls: Vec::new(),
        }
    }

    fn state(&self) -> PackageState {
        self.machine.state()
    }

    fn transition(&mut self, to: PackageState) {
        if let Err(e) = self.machine.transition(to) {
            tracing::error!(error = %e, "rejected state transition");
        }
    }

    fn finish(&mut self, to: PackageState, failure: Option<PackageFailure>) {
        self.transition(to);
        self.failure = failure;
    }

    /// Failed, or skipped because something upstream failed
    fn blocks_dependents(&self) -> bool {
        match self.state() {
            PackageState::Failed => true,
            PackageState::Skipped => {
                matches!(self.failure, Some(PackageFailure::DependencyFailed { .. }))
            }
            _ => false,
        }
    }
}

/// Dependency-ordered publisher
pub struct PublishCoordinator {
    registry: Arc<dyn RegistryClient>,
    policy: Arc<dyn RetryPolicy>,
    options: CoordinatorOptions,
}

impl PublishCoordinator {
    pub fn new(registry: Arc<dyn RegistryClient>, policy: Arc<dyn RetryPolicy>) -> Self {
        Self {
            registry,
            policy,
            options: CoordinatorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CoordinatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Publish every package of `graph`
    ///
    /// Returns one report per package, in topological order, each in a
    /// terminal state.
    pub async fn run(&self, graph: &PackageGraph, cancel: CancellationToken) -> Vec<PackageReport> {
        let concurrency = self.options.concurrency.max(1);
        let mut trackers: Vec<Tracker> = graph.packages().iter().map(Tracker::new).collect();

        let (tx, mut rx) = mpsc::unbounded_channel::<Progress>();
        let mut tasks: JoinSet<TaskResult> = JoinSet::new();
        let mut in_flight = 0usize;
        let mut halted = false;

        tracing::info!(
            packages = graph.len(),
            concurrency,
            fail_fast = self.options.fail_fast,
            registry = self.registry.name(),
            "starting release"
        );

        loop {
            if !halted && !cancel.is_cancelled() {
                for &index in graph.topological_indices() {
                    if in_flight >= concurrency {
                        break;
                    }
                    if trackers[index].state() != PackageState::Pending {
                        continue;
                    }
                    let ready = graph
                        .upstream_of(index)
                        .iter()
                        .all(|&dep| trackers[dep].state() == PackageState::Resolvable);
                    if !ready {
                        continue;
                    }

                    trackers[index].transition(PackageState::Publishing);
                    in_flight += 1;
                    self.spawn_package(&mut tasks, index, graph.spec(index), &cancel, &tx);
                }
            }

            if in_flight == 0 {
                break;
            }

            tokio::select! {
                Some(progress) = rx.recv() => {
                    Self::apply_progress(&mut trackers, progress);
                }
                Some(joined) = tasks.join_next() => {
                    while let Ok(progress) = rx.try_recv() {
                        Self::apply_progress(&mut trackers, progress);
                    }
                    in_flight -= 1;

                    let failed = match joined {
                        Ok(result) => Self::apply_result(&mut trackers, result),
                        Err(e) => {
                            tracing::error!(error = %e, "publish task ended unexpectedly");
                            true
                        }
                    };

                    if failed && self.options.fail_fast && !halted {
                        tracing::warn!("fail-fast: no further packages will be started");
                        halted = true;
                    }
                }
                else => break,
            }
        }

        Self::settle(graph, &mut trackers, cancel.is_cancelled(), halted);
        debug_assert!(
            trackers.iter().all(|t| t.state().is_terminal()),
            "package left in a non-terminal state"
        );

        graph
            .topological_indices()
            .iter()
            .map(|&index| {
                let tracker = &trackers[index];
                PackageReport {
                    id: graph.spec(index).id.clone(),
                    status: tracker.state(),
                    attempts: tracker.attempts,
                    publish_attempts: tracker.publish_attempts,
                    waited: tracker.waited,
                    failure: tracker.failure.clone(),
                    polls: tracker.polls.clone(),
                    transitions: tracker.machine.transitions().to_vec(),
                }
            })
            .collect()
    }

    fn spawn_package(
        &self,
        tasks: &mut JoinSet<TaskResult>,
        index: usize,
        spec: &PackageSpec,
        cancel: &CancellationToken,
        tx: &mpsc::UnboundedSender<Progress>,
    ) {
        let registry = Arc::clone(&self.registry);
        let policy = Arc::clone(&self.policy);
        let publish_retry = self.options.publish_retry.clone();
        let spec = spec.clone();
        let cancel = cancel.clone();
        let tx = tx.clone();

        tracing::info!(package = %spec.id, "publishing");

        tasks.spawn(async move {
            publish_and_confirm(index, registry, policy, publish_retry, spec, cancel, tx).await
        });
    }

    fn apply_progress(trackers: &mut [Tracker], progress: Progress) {
        match progress {
            Progress::Published {
                index,
                publish_attempts,
            } => {
                let tracker = &mut trackers[index];
                tracker.publish_attempts = publish_attempts;
                if tracker.state() == PackageState::Publishing {
                    tracker.transition(PackageState::WaitingResolvable);
                }
            }
        }
    }

    /// Record a task's outcome; true when the package failed
    fn apply_result(trackers: &mut [Tracker], result: TaskResult) -> bool {
        let tracker = &mut trackers[result.index];

        tracker.attempts = result.attempts;
        tracker.publish_attempts = result.publish_attempts;
        tracker.waited = result.waited;
        tracker.polls = result.polls;

        if result.published && tracker.state() == PackageState::Publishing {
            tracker.transition(PackageState::WaitingResolvable);
        }

        match result.outcome {
            TaskOutcome::Resolvable => {
                tracker.finish(PackageState::Resolvable, None);
                false
            }
            TaskOutcome::Failed(failure) => {
                tracker.finish(PackageState::Failed, Some(failure));
                true
            }
            TaskOutcome::Cancelled => {
                tracker.finish(PackageState::Cancelled, Some(PackageFailure::Cancelled));
                false
            }
        }
    }

    /// Give every package that never finished a terminal state
    fn settle(graph: &PackageGraph, trackers: &mut [Tracker], cancelled: bool, halted: bool) {
        for &index in graph.topological_indices() {
            match trackers[index].state() {
                PackageState::Publishing | PackageState::WaitingResolvable => {
                    trackers[index].finish(
                        PackageState::Failed,
                        Some(PackageFailure::Internal {
                            message: "publish task did not report a result".to_string(),
                        }),
                    );
                }
                PackageState::Pending => {
                    let upstream = graph.upstream_of(index);
                    let blocker = upstream
                        .iter()
                        .copied()
                        .find(|&dep| trackers[dep].blocks_dependents());

                    let (state, failure) = if let Some(dep) = blocker {
                        let dependency = graph.spec(dep).name().to_string();
                        (PackageState::Skipped, PackageFailure::DependencyFailed { dependency })
                    } else if cancelled {
                        (PackageState::Cancelled, PackageFailure::Cancelled)
                    } else if halted {
                        (PackageState::Skipped, PackageFailure::FailFast)
                    } else {
                        let dependency = upstream
                            .iter()
                            .find(|&&dep| trackers[dep].state() != PackageState::Resolvable)
                            .map(|&dep| graph.spec(dep).name().to_string())
                            .unwrap_or_default();
                        (PackageState::Skipped, PackageFailure::DependencyFailed { dependency })
                    };

                    tracing::info!(
                        package = %graph.spec(index).id,
                        status = %state,
                        reason = %failure,
                        "package not started"
                    );
                    trackers[index].finish(state, Some(failure));
                }
                _ => {}
            }
        }
    }
}

/// Publish one package and wait until it is resolvable
async fn publish_and_confirm(
    index: usize,
    registry: Arc<dyn RegistryClient>,
    policy: Arc<dyn RetryPolicy>,
    publish_retry: RetryOptions,
    spec: PackageSpec,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<Progress>,
) -> TaskResult {
    let label = spec.id.to_string();

    if cancel.is_cancelled() {
        return TaskResult::new(index, TaskOutcome::Cancelled);
    }

    // Dropping an in-flight publish on cancel also kills a running `cargo publish`.
    let manager = RetryManager::new(publish_retry).with_cancellation(cancel.clone());
    let client = registry.as_ref();
    let package = &spec;
    let mut publish_calls = 0u32;
    let calls = &mut publish_calls;
    let publish = tokio::select! {
        outcome = manager.retry(move || {
            *calls += 1;
            client.publish(package)
        }) => Some(outcome),
        _ = cancel.cancelled() => None,
    };

    let Some(publish) = publish else {
        tracing::info!(package = %label, "cancelled while publishing");
        let mut result = TaskResult::new(index, TaskOutcome::Cancelled);
        result.publish_attempts = publish_calls;
        return result;
    };

    let mut result = TaskResult::new(index, TaskOutcome::Resolvable);
    result.publish_attempts = publish.attempts;

    match publish.result {
        Ok(()) => {
            tracing::info!(package = %label, attempts = publish.attempts, "accepted by registry");
        }
        Err(PublishError::AlreadyPublished { .. }) => {
            tracing::info!(package = %label, "already published; confirming resolvability");
        }
        Err(PublishError::Rejected { message, .. }) => {
            tracing::error!(package = %label, error = %message, "publish rejected");
            result.outcome = TaskOutcome::Failed(PackageFailure::Rejected { message });
            return result;
        }
        Err(PublishError::Transient { .. }) if cancel.is_cancelled() => {
            result.outcome = TaskOutcome::Cancelled;
            return result;
        }
        Err(PublishError::Transient { message, .. }) => {
            tracing::error!(
                package = %label,
                attempts = publish.attempts,
                error = %message,
                "publish retries exhausted"
            );
            result.outcome = TaskOutcome::Failed(PackageFailure::PublishRetriesExhausted {
                attempts: publish.attempts,
                message,
            });
            return result;
        }
    }

    result.published = true;
    let _ = tx.send(Progress::Published {
        index,
        publish_attempts: publish.attempts,
    });

    let accepted_at = Instant::now();

    loop {
        if cancel.is_cancelled() {
            result.outcome = TaskOutcome::Cancelled;
            return result;
        }

        result.attempts += 1;
        let resolvable = registry.is_resolvable(&spec.id).await;
        result.polls.push(RetryAttempt {
            package: label.clone(),
            attempt: result.attempts,
            timestamp: Utc::now(),
            outcome: if resolvable {
                PollOutcome::Resolvable
            } else {
                PollOutcome::NotResolvable
            },
        });

        if resolvable {
            tracing::info!(
                package = %label,
                attempts = result.attempts,
                waited_ms = result.waited.as_millis() as u64,
                "resolvable"
            );
            return result;
        }

        match policy.next(result.attempts, accepted_at.elapsed()) {
            RetryDecision::GiveUp => {
                tracing::error!(
                    package = %label,
                    attempts = result.attempts,
                    waited_ms = result.waited.as_millis() as u64,
                    "gave up waiting for resolvability"
                );
                result.outcome = TaskOutcome::Failed(PackageFailure::ResolvabilityTimeout {
                    attempts: result.attempts,
                    waited_ms: result.waited.as_millis() as u64,
                });
                return result;
            }
            RetryDecision::Wait(delay) => {
                tracing::debug!(
                    package = %label,
                    attempt = result.attempts,
                    wait_ms = delay.as_millis() as u64,
                    "not resolvable yet"
                );

                let slept_from = Instant::now();
                tokio::select! {
                    _ = sleep(delay) => {
                        result.waited += delay;
                    }
                    _ = cancel.cancelled() => {
                        result.waited += slept_from.elapsed();
                        tracing::info!(package = %label, "cancelled while waiting");
                        result.outcome = TaskOutcome::Cancelled;
                        return result;
                    }
                }
            }
        }
    }
}
