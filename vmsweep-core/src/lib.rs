pub mod backend;
pub mod config;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod resolver;
pub mod task_waiter;
pub mod types;

// Test helpers are exposed for integration tests
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use error::{SweepError, SweepResult};
pub use lifecycle::{LifecycleOrchestrator, LifecycleReport, TargetSet};
pub use task_waiter::TaskWaiter;
