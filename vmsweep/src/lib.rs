pub mod logging;
pub mod sweeper;

pub use sweeper::{ConsoleProgress, Sweeper};

// Re-export commonly used types
pub use vmsweep_core::{
    config::{Config, ConfigBuilder},
    error::{SweepError, SweepResult},
    lifecycle::LifecycleReport,
};
