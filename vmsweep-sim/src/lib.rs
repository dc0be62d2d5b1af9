//! Simulated inventory backend
//!
//! Serves folders and virtual machines described by a YAML file and runs
//! power-off and destroy requests as asynchronous tasks, reporting progress
//! through property filters and long-poll update waits the same way a real
//! inventory service does.

pub mod factory;
pub mod inventory;
pub mod model;
pub mod session;

pub use factory::SimulatedBackendFactory;
pub use inventory::SimulatedInventory;
pub use model::{Credentials, FolderSpec, InventoryFile, VmSpec};
pub use session::{SimulatedConnector, SimulatedSession};

// Re-export core types for convenience
pub use vmsweep_core::error::{SweepError, SweepResult};
