use std::sync::Arc;

use vmsweep_core::{
    backend::BackendRegistry,
    config::Config,
    error::SweepResult,
    inventory::InventorySession,
    lifecycle::{LifecycleEvent, LifecycleOrchestrator, LifecycleReport, ProgressObserver},
    resolver::resolve_targets,
};
use vmsweep_sim::SimulatedBackendFactory;

/// Prints lifecycle progress to stdout when verbose
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleProgress {
    pub verbose: bool,
}

impl ProgressObserver for ConsoleProgress {
    fn on_event(&self, event: &LifecycleEvent) {
        if self.verbose {
            println!("{}", event);
        }
    }
}

/// One complete run: connect, resolve targets, power down and destroy,
/// disconnect.
///
/// The session is always disconnected before `run` returns, whatever
/// happened in between.
pub struct Sweeper {
    config: Config,
    registry: BackendRegistry,
    progress: ConsoleProgress,
}

impl Sweeper {
    /// Sweeper with every built-in backend registered
    pub fn new(config: Config) -> Self {
        let mut registry = BackendRegistry::new();
        registry.register(Arc::new(SimulatedBackendFactory));
        Self::with_registry(config, registry)
    }

    pub fn with_registry(config: Config, registry: BackendRegistry) -> Self {
        Self {
            config,
            registry,
            progress: ConsoleProgress::default(),
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.progress.verbose = verbose;
        self
    }

    pub async fn run(&self, folder: Option<&str>, vm_names: &[String]) -> SweepResult<LifecycleReport> {
        tracing::info!(
            "Connecting to {} using the {} backend",
            self.config.connection.endpoint(),
            self.config.connection.backend
        );
        let connector = self.registry.create_connector(&self.config)?;
        let session = connector.connect(&self.config.connection).await?;

        if self.progress.verbose {
            println!(
                "Authenticated to {}, current session id: {}",
                self.config.connection.address,
                session.session_key()
            );
        }

        let outcome = self.sweep(session.as_ref(), folder, vm_names).await;
        let closed = session.disconnect().await;

        match (outcome, closed) {
            (Ok(report), closed) => closed.map(|()| report),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(disconnect_error)) => {
                tracing::warn!("Failed to disconnect after an unsuccessful run: {}", disconnect_error);
                Err(e)
            }
        }
    }

    async fn sweep(
        &self,
        session: &dyn InventorySession,
        folder: Option<&str>,
        vm_names: &[String],
    ) -> SweepResult<LifecycleReport> {
        let targets = resolve_targets(session, folder, vm_names).await?;
        let report = LifecycleOrchestrator::new(session, &self.progress)
            .power_down_and_destroy(&targets)
            .await?;

        tracing::info!(
            "Sweep complete: {} powered off, {} destroyed",
            report.powered_off,
            report.destroyed
        );
        Ok(report)
    }
}
