use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};

use crate::database::DatabaseManager;
use crate::observability::lifecycle_metrics;
use crate::orchestrator::SideEffectOrchestrator;

/// Graceful shutdown coordinator for Clean Streets
pub struct ShutdownCoordinator {
    orchestrator: SideEffectOrchestrator,
    database: DatabaseManager,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(
        orchestrator: SideEffectOrchestrator,
        database: DatabaseManager,
        drain_timeout: Duration,
    ) -> Self {
        Self {
            orchestrator,
            database,
            drain_timeout,
        }
    }

    /// Wait for SIGINT, then shut everything down
    pub async fn wait_for_shutdown(self) -> Result<()> {
        info!("Shutdown coordinator ready - will shutdown gracefully on Ctrl-C");
        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");
        self.shutdown_all_services().await;
        Ok(())
    }

    /// Perform graceful shutdown operations
    pub async fn shutdown_all_services(&self) {
        info!("Initiating graceful shutdown of all services...");

        // Let in-flight notifications and emails finish
        if !self.orchestrator.drain(self.drain_timeout).await {
            warn!(
                remaining = self.orchestrator.in_flight(),
                "Some side effects did not finish before shutdown"
            );
        }

        // Log final lifecycle statistics
        lifecycle_metrics().log_stats();

        self.database.shutdown().await;

        info!("Graceful shutdown completed successfully");
    }
}
