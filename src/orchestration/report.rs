//! Release report
//!
//! One [`PackageReport`] per package, in publish order, wrapped in a
//! [`ReleaseReport`] that is immutable once built. Rendered as `key=value`
//! lines for CI logs, as JSON for tooling, or as a human summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use uuid::Uuid;

use crate::core::error::{PackageFailure, ReleaseError};
use crate::core::retry::RetryAttempt;
use crate::core::state_machine::{PackageState, StateTransition};
use crate::core::traits::PackageId;

/// Outcome of one package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageReport {
    pub id: PackageId,
    pub status: PackageState,
    /// Resolvability polls made
    pub attempts: u32,
    /// Publish calls made, including transient retries
    pub publish_attempts: u32,
    /// Time slept between polls
    #[serde(with = "humantime_serde")]
    pub waited: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<PackageFailure>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub polls: Vec<RetryAttempt>,
    #[serde(default)]
    pub transitions: Vec<StateTransition>,
}

impl PackageReport {
    pub fn name(&self) -> &str {
        &self.id.name
    }

    /// `key=value` line for this package
    pub fn render_line(&self) -> String {
        let mut line = format!(
            "package={} version={} status={} attempts={} publish_attempts={} waited_ms={}",
            self.id.name,
            self.id.version,
            self.status,
            self.attempts,
            self.publish_attempts,
            self.waited.as_millis()
        );

        if let Some(failure) = &self.failure {
            line.push_str(&format!(" reason={}", failure.code().to_lowercase()));
            if let PackageFailure::DependencyFailed { dependency } = failure {
                line.push_str(&format!(" blocked_by={}", dependency));
            }
        }

        line
    }
}

/// Overall result of a release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    Success,
    Failed,
    Cancelled,
}

impl ReleaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStatus::Success => "success",
            ReleaseStatus::Failed => "failed",
            ReleaseStatus::Cancelled => "cancelled",
        }
    }
}

/// Packages per terminal status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCounts {
    pub total: usize,
    pub resolvable: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
}

/// Result of a whole release run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseReport {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    registry: String,
    dry_run: bool,
    status: ReleaseStatus,
    counts: ReleaseCounts,
    packages: Vec<PackageReport>,
}

impl ReleaseReport {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        registry: impl Into<String>,
        dry_run: bool,
        packages: Vec<PackageReport>,
    ) -> Self {
        let counts = Self::count(&packages);
        let status = if counts.resolvable == counts.total {
            ReleaseStatus::Success
        } else if counts.cancelled > 0 {
            ReleaseStatus::Cancelled
        } else {
            ReleaseStatus::Failed
        };

        Self {
            run_id,
            started_at,
            finished_at,
            registry: registry.into(),
            dry_run,
            status,
            counts,
            packages,
        }
    }

    fn count(packages: &[PackageReport]) -> ReleaseCounts {
        let mut counts = ReleaseCounts {
            total: packages.len(),
            ..Default::default()
        };
        for package in packages {
            match package.status {
                PackageState::Resolvable => counts.resolvable += 1,
                PackageState::Failed => counts.failed += 1,
                PackageState::Skipped => counts.skipped += 1,
                PackageState::Cancelled => counts.cancelled += 1,
                // Never left in a finished report
                PackageState::Pending
                | PackageState::Publishing
                | PackageState::WaitingResolvable => counts.failed += 1,
            }
        }
        counts
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn status(&self) -> ReleaseStatus {
        self.status
    }

    pub fn counts(&self) -> ReleaseCounts {
        self.counts
    }

    /// Package reports in publish order
    pub fn packages(&self) -> &[PackageReport] {
        &self.packages
    }

    pub fn get(&self, name: &str) -> Option<&PackageReport> {
        self.packages.iter().find(|p| p.name() == name)
    }

    pub fn is_success(&self) -> bool {
        self.status == ReleaseStatus::Success
    }

    /// 0 when every package is resolvable, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0)
    }

    /// One line per package followed by the summary line
    pub fn render_lines(&self) -> String {
        let mut lines: Vec<String> = self.packages.iter().map(PackageReport::render_line).collect();

        lines.push(format!(
            "release run_id={} status={} total={} resolvable={} failed={} skipped={} cancelled={} duration_ms={}",
            self.run_id,
            self.status.as_str(),
            self.counts.total,
            self.counts.resolvable,
            self.counts.failed,
            self.counts.skipped,
            self.counts.cancelled,
            self.duration_ms()
        ));

        lines.join("\n")
    }

    /// Human-readable summary
    pub fn render_summary(&self) -> String {
        let mut out = Vec::new();
        let rule = "=".repeat(60);

        out.push(format!("\n{}", rule));
        out.push(format!(
            "📊 Release Summary{}",
            if self.dry_run { " (dry run)" } else { "" }
        ));
        out.push(rule.clone());

        let section = |out: &mut Vec<String>, title: &str, status: PackageState, count: usize| {
            if count == 0 {
                return;
            }
            out.push(format!("\n{} {}", title, count));
            for package in self.packages.iter().filter(|p| p.status == status) {
                let detail = match &package.failure {
                    Some(failure) => format!(": {}", failure),
                    None => format!(
                        " ({} poll(s), waited {}ms)",
                        package.attempts,
                        package.waited.as_millis()
                    ),
                };
                out.push(format!("   - {}{}", package.id, detail));
            }
        };

        section(&mut out, "✅ Resolvable:", PackageState::Resolvable, self.counts.resolvable);
        section(&mut out, "❌ Failed:", PackageState::Failed, self.counts.failed);
        section(&mut out, "⏭️  Skipped:", PackageState::Skipped, self.counts.skipped);
        section(&mut out, "🛑 Cancelled:", PackageState::Cancelled, self.counts.cancelled);

        out.push(format!("\n{}", rule));
        out.push(format!(
            "Overall Status: {}",
            match self.status {
                ReleaseStatus::Success => "✅ SUCCESS",
                ReleaseStatus::Failed => "❌ FAILED",
                ReleaseStatus::Cancelled => "🛑 CANCELLED",
            }
        ));
        out.push(format!("{}\n", rule));

        out.join("\n")
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the JSON report through a temp file and a rename
    pub async fn write_json(&self, path: &Path) -> Result<(), ReleaseError> {
        let to_error = |source: std::io::Error| ReleaseError::ReportWrite {
            path: path.to_path_buf(),
            source,
        };

        let json = self.to_json().map_err(|e| to_error(e.into()))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report.json".to_string());
        let tmp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, self.run_id));

        fs::write(&tmp_path, json).await.map_err(to_error)?;
        if let Err(e) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(to_error(e));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn package(name: &str, status: PackageState, failure: Option<PackageFailure>) -> PackageReport {
        PackageReport {
            id: PackageId::parse(name, "0.1.0").unwrap(),
            status,
            attempts: if status == PackageState::Resolvable { 3 } else { 0 },
            publish_attempts: 1,
            waited: Duration::from_secs(10),
            failure,
            polls: Vec::new(),
            transitions: Vec::new(),
        }
    }

    fn report(packages: Vec<PackageReport>) -> ReleaseReport {
        let now = Utc::now();
        ReleaseReport::new(Uuid::new_v4(), now, now, "scripted", false, packages)
    }

    #[test]
    fn test_success_report() {
        let report = report(vec![
            package("core", PackageState::Resolvable, None),
            package("axum", PackageState::Resolvable, None),
        ]);

        assert_eq!(report.status(), ReleaseStatus::Success);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.counts().resolvable, 2);
        assert_eq!(
            report.packages()[0].render_line(),
            "package=core version=0.1.0 status=resolvable attempts=3 publish_attempts=1 waited_ms=10000"
        );
    }

    #[test]
    fn test_failed_report_lines() {
        let report = report(vec![
            package(
                "core",
                PackageState::Failed,
                Some(PackageFailure::Rejected {
                    message: "forbidden".to_string(),
                }),
            ),
            package(
                "axum",
                PackageState::Skipped,
                Some(PackageFailure::DependencyFailed {
                    dependency: "core".to_string(),
                }),
            ),
        ]);

        assert_eq!(report.status(), ReleaseStatus::Failed);
        assert_eq!(report.exit_code(), 1);

        let lines = report.render_lines();
        let lines: Vec<&str> = lines.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("reason=publish_rejected"));
        assert!(lines[1].contains("status=skipped"));
        assert!(lines[1].ends_with("blocked_by=core"));
        assert!(lines[2].starts_with(&format!("release run_id={} status=failed", report.run_id())));
        assert!(lines[2].contains("total=2 resolvable=0 failed=1 skipped=1 cancelled=0"));
    }

    #[test]
    fn test_cancelled_status_wins_over_failed() {
        let report = report(vec![
            package("core", PackageState::Failed, Some(PackageFailure::FailFast)),
            package("axum", PackageState::Cancelled, Some(PackageFailure::Cancelled)),
        ]);

        assert_eq!(report.status(), ReleaseStatus::Cancelled);
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_render_summary() {
        let report = report(vec![
            package("core", PackageState::Resolvable, None),
            package(
                "axum",
                PackageState::Failed,
                Some(PackageFailure::ResolvabilityTimeout {
                    attempts: 4,
                    waited_ms: 12_000,
                }),
            ),
        ]);

        let summary = report.render_summary();
        assert!(summary.contains("✅ Resolvable: 1"));
        assert!(summary.contains("❌ Failed: 1"));
        assert!(summary.contains("axum@0.1.0: not resolvable after 4 poll(s)"));
        assert!(summary.contains("❌ FAILED"));
        assert!(!summary.contains("Skipped"));
    }

    #[tokio::test]
    async fn test_write_json_atomically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        let report = report(vec![package("core", PackageState::Resolvable, None)]);

        report.write_json(&path).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["packages"][0]["id"]["name"], "core");
        assert_eq!(value["packages"][0]["waited"], "10s");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_write_json_into_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("report.json");
        let report = report(vec![package("core", PackageState::Resolvable, None)]);

        let result = report.write_json(&path).await;
        assert!(matches!(result, Err(ReleaseError::ReportWrite { .. })));
    }
}
