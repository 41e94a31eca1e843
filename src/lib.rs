pub mod core;
pub mod graph;
pub mod orchestration;
pub mod registry;
pub mod security;
pub mod telemetry;

pub use self::core::*;
pub use graph::PackageGraph;
pub use orchestration::{
    CoordinatorOptions, PackageReport, PublishCoordinator, ReleaseCounts, ReleaseReport,
    ReleaseRunner, ReleaseStatus,
};
pub use registry::{CargoRegistry, DryRunRegistry, SparseIndex};
#[cfg(any(test, feature = "testing"))]
pub use registry::{PackageScript, ScriptedRegistry};
pub use security::{CommandError, SafeCommandExecutor, SecureTokenManager};
