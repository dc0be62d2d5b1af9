use std::sync::Arc;

use vmsweep_core::backend::InventoryBackendFactory;
use vmsweep_core::config::Config;
use vmsweep_core::error::{SweepError, SweepResult};
use vmsweep_core::inventory::InventoryConnector;

use crate::inventory::SimulatedInventory;
use crate::session::SimulatedConnector;

/// Factory for the YAML-driven simulated backend
pub struct SimulatedBackendFactory;

impl InventoryBackendFactory for SimulatedBackendFactory {
    fn create_connector(&self, config: &Config) -> SweepResult<Arc<dyn InventoryConnector>> {
        let path = config.inventory.path.as_ref().ok_or_else(|| {
            SweepError::configuration(
                "inventory.path",
                "The simulated backend requires an inventory file",
            )
        })?;
        let inventory = SimulatedInventory::load(path)?;
        Ok(Arc::new(SimulatedConnector::new(inventory)))
    }

    fn backend_type(&self) -> &'static str {
        "simulated"
    }

    fn description(&self) -> &'static str {
        "In-memory inventory loaded from a YAML file, with asynchronous tasks"
    }
}
