use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::error::{SweepError, SweepResult};
use crate::inventory::InventoryConnector;

/// Factory trait for inventory backends
///
/// Backends live in their own crates and register a factory with the
/// [`BackendRegistry`] at startup; the binary then picks one by name from
/// `connection.backend`.
pub trait InventoryBackendFactory: Send + Sync {
    /// Build a connector from the loaded configuration
    fn create_connector(&self, config: &Config) -> SweepResult<Arc<dyn InventoryConnector>>;

    /// Get the name of this backend type
    fn backend_type(&self) -> &'static str;

    /// Get a description of this backend
    fn description(&self) -> &'static str;
}

/// Registry for inventory backend factories
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: HashMap<String, Arc<dyn InventoryBackendFactory>>,
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend factory
    pub fn register(&mut self, factory: Arc<dyn InventoryBackendFactory>) {
        let backend_type = factory.backend_type().to_string();
        tracing::debug!(
            "Registering inventory backend: {} ({})",
            backend_type,
            factory.description()
        );
        self.factories.insert(backend_type, factory);
    }

    /// Create a connector for the backend named in `config.connection.backend`
    pub fn create_connector(&self, config: &Config) -> SweepResult<Arc<dyn InventoryConnector>> {
        let backend_type = config.connection.backend.as_str();
        let factory = self.factories.get(backend_type).ok_or_else(|| {
            SweepError::configuration(
                "connection.backend",
                format!(
                    "Unknown inventory backend type: '{}'. Available backends: {:?}",
                    backend_type,
                    self.list_available_backends()
                ),
            )
        })?;

        factory.create_connector(config)
    }

    /// List all available backend types, sorted
    pub fn list_available_backends(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}
