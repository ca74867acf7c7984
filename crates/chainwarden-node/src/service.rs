//! Service wiring
//!
//! Builds the probers from configuration, assembles the supervisor
//! with its actuator and alert sink, and runs the metrics surface
//! until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{error, info};

use chainwarden_metrics::MetricsServer;
use chainwarden_monitor::{NodeSupervisor, MonitorStats};
use chainwarden_probe::{ChainProber, EvmProber, UtxoProber};
use chainwarden_recovery::{DockerRuntime, WebhookAlerter};

use crate::config::{ChainConfig, ChainKind, Config};

/// Stop deadline granted to the supervisor on shutdown.
const STOP_DEADLINE: Duration = Duration::from_secs(10);

/// Long-running supervisor service.
pub struct WardenService {
    config: Config,
    supervisor: NodeSupervisor,
    metrics_task: Option<JoinHandle<()>>,
}

impl WardenService {
    /// Assemble the supervisor and register every configured chain.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let runtime = Arc::new(DockerRuntime::new(
            config.recovery.docker_binary.clone(),
            Duration::from_secs(config.recovery.restart_timeout),
        ));
        let alerter = Arc::new(WebhookAlerter::new(config.alerts.webhook_url.clone()));
        if alerter.is_enabled() {
            info!("🔔 Alert webhook configured");
        }

        let supervisor =
            NodeSupervisor::new(config.monitor.to_monitor_config(), runtime, alerter);
        for chain in &config.chains {
            let prober = build_prober(chain)?;
            supervisor.register_node(&chain.name, &chain.container_name, prober)?;
            info!(
                "  ✓ Watching {} ({:?}) at {}",
                chain.name, chain.kind, chain.rpc_url
            );
        }

        chainwarden_monitor::init_global(supervisor.clone());

        Ok(Self {
            config,
            supervisor,
            metrics_task: None,
        })
    }

    /// Start the supervisor loop and, when enabled, the metrics
    /// surface.
    pub fn start(&mut self) -> Result<()> {
        self.supervisor.start()?;

        if self.config.metrics.prometheus_enabled {
            let server = MetricsServer::for_supervisor(
                &self.config.metrics.prometheus_addr,
                self.supervisor.clone(),
            );
            let task = tokio::spawn(async move {
                if let Err(err) = server.run().await {
                    error!("Metrics server error: {}", err);
                }
            });
            self.metrics_task = Some(task);
        }

        info!("✅ Supervisor running over {} chains", self.config.chains.len());
        Ok(())
    }

    /// Block until SIGINT/SIGTERM, then shut everything down.
    pub async fn wait_for_shutdown(&mut self) -> Result<()> {
        wait_for_shutdown_signal().await;
        self.shutdown().await
    }

    async fn shutdown(&mut self) -> Result<()> {
        info!("🛑 Shutting down supervisor...");
        self.supervisor.stop(STOP_DEADLINE).await?;
        if let Some(task) = self.metrics_task.take() {
            task.abort();
        }
        info!("✅ Shutdown complete");
        Ok(())
    }

    pub fn supervisor(&self) -> &NodeSupervisor {
        &self.supervisor
    }

    pub fn stats(&self) -> MonitorStats {
        self.supervisor.stats()
    }
}

fn build_prober(chain: &ChainConfig) -> Result<Arc<dyn ChainProber>> {
    match chain.kind {
        ChainKind::Utxo => {
            let user = chain
                .rpc_user
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("Chain {} missing rpc_user", chain.name))?;
            let password = chain
                .rpc_password
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("Chain {} missing rpc_password", chain.name))?;
            Ok(Arc::new(UtxoProber::new(
                &chain.name,
                &chain.rpc_url,
                user,
                password,
            )))
        }
        ChainKind::Evm => Ok(Arc::new(EvmProber::new(&chain.name, &chain.rpc_url))),
    }
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(sig) => sig,
            Err(err) => {
                error!("Failed to install SIGINT handler: {}", err);
                return;
            }
        };
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => info!("📥 Received SIGINT, initiating shutdown..."),
            _ = sigterm.recv() => info!("📥 Received SIGTERM, initiating shutdown..."),
        }
    }

    #[cfg(windows)]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            return;
        }
        info!("📥 Received Ctrl+C, initiating shutdown...");
    }
}
