//! Orchestration layer for a release
//!
//! [`PublishCoordinator`] drives one package graph against a registry;
//! [`ReleaseRunner`] wires configuration to it and aggregates the
//! [`ReleaseReport`].

pub mod coordinator;
pub mod report;
pub mod runner;

// Re-export main types for convenience
pub use coordinator::{CoordinatorOptions, PublishCoordinator};
pub use report::{PackageReport, ReleaseCounts, ReleaseReport, ReleaseStatus};
pub use runner::ReleaseRunner;
