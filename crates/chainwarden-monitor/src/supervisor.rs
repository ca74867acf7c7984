//! Supervisor loop
//!
//! One driver task ticks at the configured interval and fans out a
//! probe task per registered node. Probes run unlocked; each snapshot
//! merges into the node's health record under the write lock, where
//! the restart decision is also made. The actuator itself runs outside
//! the lock, serialized per node by the in-flight guard.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use chainwarden_probe::{run_diagnostics, ChainProber, Diagnostics, CHAIN_ERROR_MWEB};
use chainwarden_recovery::{Alert, AlertSeverity, AlertSink, ContainerRuntime};

use crate::error::{MonitorError, Result};
use crate::health::{NodeHealth, NodeStatus};
use crate::rules::{builtin_rules, HealthRule, RuleAction};
use crate::stats::MonitorStats;

/// Supervisor tuning knobs.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between probe rounds.
    pub check_interval: Duration,
    /// Deadline for each individual RPC call; a whole probe gets twice
    /// this budget.
    pub rpc_timeout: Duration,
    pub consecutive_failures_before_restart: u32,
    pub max_restarts_per_hour: u32,
    pub restart_cooldown: Duration,
    pub enable_auto_restart: bool,
    pub enable_alerts: bool,
    /// RPC latency above this raises an alert.
    pub max_rpc_latency: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
            rpc_timeout: Duration::from_secs(10),
            consecutive_failures_before_restart: 3,
            max_restarts_per_hour: 3,
            restart_cooldown: Duration::from_secs(60),
            enable_auto_restart: true,
            enable_alerts: true,
            max_rpc_latency: Duration::from_secs(5),
        }
    }
}

struct NodeSlot {
    prober: Arc<dyn ChainProber>,
    health: NodeHealth,
    /// Set while a probe (and any resulting restart) runs for this
    /// node; a tick skips nodes whose previous probe is still going.
    in_flight: bool,
}

struct SupervisorInner {
    config: MonitorConfig,
    nodes: RwLock<HashMap<String, NodeSlot>>,
    /// Built-in rule set, fixed at construction.
    base_rules: Vec<HealthRule>,
    /// Operator-registered rules; fired restart rules here are an
    /// independent restart trigger.
    extra_rules: RwLock<Vec<HealthRule>>,
    runtime: Arc<dyn ContainerRuntime>,
    alerts: Arc<dyn AlertSink>,
    checks_total: AtomicU64,
    restarts_total: AtomicU64,
    alerts_total: AtomicU64,
    started_at: DateTime<Utc>,
    shutdown_tx: broadcast::Sender<()>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

/// Multi-chain node health supervisor. Cheap to clone; all clones
/// share the same state.
#[derive(Clone)]
pub struct NodeSupervisor {
    inner: Arc<SupervisorInner>,
}

impl NodeSupervisor {
    pub fn new(
        config: MonitorConfig,
        runtime: Arc<dyn ContainerRuntime>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(4);
        let base_rules = builtin_rules(config.max_rpc_latency);
        Self {
            inner: Arc::new(SupervisorInner {
                config,
                nodes: RwLock::new(HashMap::new()),
                base_rules,
                extra_rules: RwLock::new(Vec::new()),
                runtime,
                alerts,
                checks_total: AtomicU64::new(0),
                restarts_total: AtomicU64::new(0),
                alerts_total: AtomicU64::new(0),
                started_at: Utc::now(),
                shutdown_tx,
                driver: Mutex::new(None),
            }),
        }
    }

    /// Add a node to the registry. Nodes leave only by explicit
    /// unregistration.
    pub fn register_node(
        &self,
        name: &str,
        container_name: &str,
        prober: Arc<dyn ChainProber>,
    ) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        if nodes.contains_key(name) {
            return Err(MonitorError::DuplicateNode(name.to_string()));
        }
        nodes.insert(
            name.to_string(),
            NodeSlot {
                prober,
                health: NodeHealth::new(name, container_name, Utc::now()),
                in_flight: false,
            },
        );
        info!("Registered node {} (container {})", name, container_name);
        Ok(())
    }

    pub fn unregister_node(&self, name: &str) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        if nodes.remove(name).is_none() {
            return Err(MonitorError::UnknownNode(name.to_string()));
        }
        info!("Unregistered node {}", name);
        Ok(())
    }

    /// Register an additional health rule, evaluated after the
    /// built-in set in insertion order.
    pub fn add_rule(&self, rule: HealthRule) {
        self.inner.extra_rules.write().push(rule);
    }

    pub fn node_health(&self, name: &str) -> Option<NodeHealth> {
        self.inner
            .nodes
            .read()
            .get(name)
            .map(|slot| slot.health.clone())
    }

    /// Copy of the full state table for the scrape surface.
    pub fn stats(&self) -> MonitorStats {
        let nodes = self.inner.nodes.read();
        let mut list: Vec<NodeHealth> = nodes.values().map(|slot| slot.health.clone()).collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));

        MonitorStats {
            checks_total: self.inner.checks_total.load(Ordering::Relaxed),
            restarts_total: self.inner.restarts_total.load(Ordering::Relaxed),
            alerts_total: self.inner.alerts_total.load(Ordering::Relaxed),
            nodes_monitored: list.len(),
            started_at: self.inner.started_at,
            uptime: Utc::now()
                .signed_duration_since(self.inner.started_at)
                .to_std()
                .unwrap_or_default(),
            nodes: list,
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.driver.lock().is_some()
    }

    /// Launch the background driver. Returns once it is spawned; the
    /// first probe round starts immediately in the background.
    pub fn start(&self) -> Result<()> {
        let mut driver = self.inner.driver.lock();
        if driver.is_some() {
            return Err(MonitorError::AlreadyRunning);
        }

        let inner = self.inner.clone();
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            info!(
                "🩺 Node supervisor started (interval {:?}, auto-restart {})",
                inner.config.check_interval, inner.config.enable_auto_restart
            );
            let mut ticker = tokio::time::interval(inner.config.check_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => probe_all(&inner),
                    _ = shutdown_rx.recv() => {
                        info!("Node supervisor shutting down");
                        break;
                    }
                }
            }
        });
        *driver = Some(handle);
        Ok(())
    }

    /// Signal the driver to exit and wait for it, bounded by the
    /// deadline. In-flight probes observe the same signal.
    pub async fn stop(&self, deadline: Duration) -> Result<()> {
        let handle = self
            .inner
            .driver
            .lock()
            .take()
            .ok_or(MonitorError::NotRunning)?;
        let _ = self.inner.shutdown_tx.send(());

        match tokio::time::timeout(deadline, handle).await {
            Ok(_) => Ok(()),
            Err(_) => Err(MonitorError::ShutdownTimeout),
        }
    }

    /// Probe one node right now, outside the ticker, applying the full
    /// state-update and recovery logic.
    pub async fn force_check(&self, name: &str) -> Result<NodeStatus> {
        if !self.inner.nodes.read().contains_key(name) {
            return Err(MonitorError::UnknownNode(name.to_string()));
        }
        probe_node(&self.inner, name)
            .await
            .ok_or_else(|| MonitorError::UnknownNode(name.to_string()))
    }
}

/// Fan out one probe task per registered node.
fn probe_all(inner: &Arc<SupervisorInner>) {
    let names: Vec<String> = inner.nodes.read().keys().cloned().collect();
    debug!("Probing {} nodes", names.len());
    for name in names {
        let inner = inner.clone();
        tokio::spawn(async move {
            probe_node(&inner, &name).await;
        });
    }
}

fn clear_in_flight(inner: &SupervisorInner, name: &str) {
    if let Some(slot) = inner.nodes.write().get_mut(name) {
        slot.in_flight = false;
    }
}

/// Probe a node and merge the outcome. Returns the post-probe status,
/// or `None` when the node vanished from the registry.
async fn probe_node(inner: &Arc<SupervisorInner>, name: &str) -> Option<NodeStatus> {
    let prober = {
        let mut nodes = inner.nodes.write();
        let slot = nodes.get_mut(name)?;
        if slot.in_flight {
            debug!("Probe for {} still in flight, skipping", name);
            return Some(slot.health.status);
        }
        slot.in_flight = true;
        slot.prober.clone()
    };

    // The whole sequenced probe gets twice the per-call budget.
    let budget = inner.config.rpc_timeout * 2;
    let mut shutdown_rx = inner.shutdown_tx.subscribe();
    let diag = tokio::select! {
        outcome = tokio::time::timeout(budget, run_diagnostics(prober.as_ref(), inner.config.rpc_timeout)) => {
            match outcome {
                Ok(diag) => Some(diag),
                Err(_) => {
                    warn!("Probe for {} exceeded its {:?} budget", name, budget);
                    None
                }
            }
        }
        _ = shutdown_rx.recv() => {
            clear_in_flight(inner, name);
            return None;
        }
    };

    apply_probe(inner, name, diag).await
}

struct ProbeDecision {
    status: NodeStatus,
    container: String,
    restart_reason: Option<String>,
    alert_reasons: Vec<String>,
}

/// Merge a snapshot into the node state and act on the outcome.
async fn apply_probe(
    inner: &Arc<SupervisorInner>,
    name: &str,
    diag: Option<Diagnostics>,
) -> Option<NodeStatus> {
    let now = Utc::now();
    inner.checks_total.fetch_add(1, Ordering::Relaxed);

    let decision = {
        let extra_rules = inner.extra_rules.read();
        let mut nodes = inner.nodes.write();
        let slot = match nodes.get_mut(name) {
            Some(slot) => slot,
            // Unregistered while the probe was running.
            None => return None,
        };

        slot.health.roll_hourly_window(now);
        let failed = slot.health.observe(diag.clone(), now);
        if failed {
            debug!(
                "Probe for {} failed ({} consecutive)",
                name, slot.health.consecutive_fails
            );
        }

        let snapshot = diag.as_ref();
        let mut alert_reasons = Vec::new();
        let mut custom_restart = None;
        let builtin = inner.base_rules.len();
        for (index, rule) in inner.base_rules.iter().chain(extra_rules.iter()).enumerate() {
            if !rule.fires(snapshot) {
                continue;
            }
            debug!("Rule fired for {}: {}", name, rule.description);
            match rule.action {
                RuleAction::Alert => alert_reasons.push(rule.description.clone()),
                // Operator-registered restart rules are their own
                // trigger; the built-in ones feed the failure counter
                // and the MWEB check instead.
                RuleAction::Restart if index >= builtin && custom_restart.is_none() => {
                    custom_restart = Some(rule.description.clone());
                }
                RuleAction::Restart => {}
            }
        }

        let restart_reason = restart_decision(
            &inner.config,
            &slot.health,
            snapshot,
            custom_restart,
            now,
        );
        if restart_reason.is_none() {
            slot.in_flight = false;
        }

        ProbeDecision {
            status: slot.health.status,
            container: slot.health.container_name.clone(),
            restart_reason,
            alert_reasons,
        }
    };

    for reason in &decision.alert_reasons {
        warn!("⚠️  {}: {}", name, reason);
        send_alert(
            inner,
            Alert::new(name, "Node health warning", reason, AlertSeverity::Warning),
        )
        .await;
    }

    if let Some(reason) = decision.restart_reason {
        warn!(
            "Restarting {} (container {}): {}",
            name, decision.container, reason
        );
        match inner.runtime.restart(&decision.container).await {
            Ok(()) => {
                inner.restarts_total.fetch_add(1, Ordering::Relaxed);
                if let Some(slot) = inner.nodes.write().get_mut(name) {
                    slot.health
                        .record_restart(Utc::now(), inner.config.restart_cooldown);
                }
                send_alert(
                    inner,
                    Alert::new(name, "Node restarted", &reason, AlertSeverity::Critical)
                        .with_action("container restart"),
                )
                .await;
            }
            Err(err) => {
                // Counters and cooldown stay put so a later tick can
                // retry, still subject to the gates.
                error!("Restart of {} failed: {}", name, err);
                match inner.runtime.status(&decision.container).await {
                    Ok(status) => warn!("Container {} is {:?}", decision.container, status),
                    Err(status_err) => {
                        debug!("Status query for {} failed: {}", decision.container, status_err)
                    }
                }
                send_alert(
                    inner,
                    Alert::new(
                        name,
                        "Node restart failed",
                        &err.to_string(),
                        AlertSeverity::Warning,
                    ),
                )
                .await;
            }
        }
        clear_in_flight(inner, name);
    }

    Some(decision.status)
}

/// Decide whether this probe warrants a restart, and for what reason.
///
/// Gates first: auto-restart off, cooldown, hourly budget. Then the
/// triggers in tie-break order: MWEB signature beats the
/// consecutive-failure threshold beats operator rules.
fn restart_decision(
    config: &MonitorConfig,
    health: &NodeHealth,
    diag: Option<&Diagnostics>,
    custom_restart: Option<String>,
    now: DateTime<Utc>,
) -> Option<String> {
    if !config.enable_auto_restart {
        return None;
    }
    if health.in_cooldown(now) {
        debug!("{} in cooldown until {:?}", health.name, health.cooldown_until);
        return None;
    }
    if health.restarts_this_hour >= config.max_restarts_per_hour {
        warn!(
            "{} exhausted its restart budget ({} this hour)",
            health.name, health.restarts_this_hour
        );
        return None;
    }

    let mweb = diag
        .map(|d| d.has_chain_error(CHAIN_ERROR_MWEB))
        .unwrap_or(false);
    if mweb {
        return Some("MWEB block validation failure".to_string());
    }
    if health.consecutive_fails >= config.consecutive_failures_before_restart {
        return Some(format!(
            "{} consecutive failed checks",
            health.consecutive_fails
        ));
    }
    custom_restart
}

async fn send_alert(inner: &Arc<SupervisorInner>, alert: Alert) {
    if !inner.config.enable_alerts {
        return;
    }
    match inner.alerts.send(&alert).await {
        Ok(()) => {
            inner.alerts_total.fetch_add(1, Ordering::Relaxed);
        }
        Err(err) => warn!("Failed to deliver alert for {}: {}", alert.node, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chainwarden_probe::test_utils::StubProber;
    use chainwarden_recovery::{ContainerStatus, RecoveryError};

    struct MockRuntime {
        restarts: parking_lot::Mutex<Vec<String>>,
        fail: bool,
    }

    impl MockRuntime {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                restarts: parking_lot::Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                restarts: parking_lot::Mutex::new(Vec::new()),
                fail: true,
            })
        }

        fn restarted(&self) -> Vec<String> {
            self.restarts.lock().clone()
        }

        fn attempts(&self) -> usize {
            self.restarts.lock().len()
        }
    }

    #[async_trait]
    impl ContainerRuntime for MockRuntime {
        async fn restart(&self, container: &str) -> chainwarden_recovery::Result<()> {
            self.restarts.lock().push(container.to_string());
            if self.fail {
                return Err(RecoveryError::RestartFailed {
                    container: container.to_string(),
                    output: "mock failure".to_string(),
                });
            }
            Ok(())
        }

        async fn status(&self, _container: &str) -> chainwarden_recovery::Result<ContainerStatus> {
            Ok(ContainerStatus::Running)
        }
    }

    struct MockAlerts {
        sent: parking_lot::Mutex<Vec<(String, AlertSeverity)>>,
    }

    impl MockAlerts {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: parking_lot::Mutex::new(Vec::new()),
            })
        }

        fn titles(&self) -> Vec<String> {
            self.sent.lock().iter().map(|(t, _)| t.clone()).collect()
        }
    }

    #[async_trait]
    impl AlertSink for MockAlerts {
        async fn send(&self, alert: &Alert) -> chainwarden_recovery::Result<()> {
            self.sent
                .lock()
                .push((alert.title.clone(), alert.severity));
            Ok(())
        }
    }

    fn quick_config() -> MonitorConfig {
        MonitorConfig {
            check_interval: Duration::from_millis(50),
            rpc_timeout: Duration::from_secs(2),
            ..MonitorConfig::default()
        }
    }

    fn supervisor_with(
        config: MonitorConfig,
        runtime: Arc<MockRuntime>,
        alerts: Arc<MockAlerts>,
    ) -> NodeSupervisor {
        NodeSupervisor::new(config, runtime, alerts)
    }

    #[tokio::test]
    async fn test_healthy_probe() {
        let runtime = MockRuntime::new();
        let supervisor = supervisor_with(quick_config(), runtime.clone(), MockAlerts::new());
        supervisor
            .register_node(
                "litecoin",
                "litecoin-node",
                Arc::new(StubProber::named("litecoin").with_height(3_026_575)),
            )
            .unwrap();

        assert_eq!(
            supervisor.node_health("litecoin").unwrap().status,
            NodeStatus::Unknown
        );

        let status = supervisor.force_check("litecoin").await.unwrap();
        assert_eq!(status, NodeStatus::Healthy);

        let health = supervisor.node_health("litecoin").unwrap();
        assert_eq!(health.consecutive_fails, 0);
        assert_eq!(health.total_checks, 1);
        assert_eq!(health.total_failures, 0);
        assert!(health.last_healthy.is_some());
        assert_eq!(
            health.last_diagnostics.as_ref().unwrap().block_height,
            3_026_575
        );
        assert!(runtime.restarted().is_empty());
    }

    #[tokio::test]
    async fn test_ibd_node_never_restarts() {
        let runtime = MockRuntime::new();
        let config = MonitorConfig {
            consecutive_failures_before_restart: 1,
            ..quick_config()
        };
        let supervisor = supervisor_with(config, runtime.clone(), MockAlerts::new());
        supervisor
            .register_node(
                "litecoin",
                "litecoin-node",
                Arc::new(StubProber::named("litecoin").with_template_error(
                    -10,
                    "Litecoin Core is in initial sync and waiting for blocks...",
                )),
            )
            .unwrap();

        for _ in 0..5 {
            let status = supervisor.force_check("litecoin").await.unwrap();
            assert_eq!(status, NodeStatus::Degraded);
        }

        let health = supervisor.node_health("litecoin").unwrap();
        assert_eq!(health.consecutive_fails, 0);
        assert_eq!(health.total_restarts, 0);
        assert!(health
            .last_diagnostics
            .as_ref()
            .unwrap()
            .has_chain_error(chainwarden_probe::CHAIN_ERROR_IBD));
        assert!(health.last_diagnostics.as_ref().unwrap().is_ibd);
        assert!(runtime.restarted().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_node_restarts_after_threshold() {
        let runtime = MockRuntime::new();
        let supervisor = supervisor_with(quick_config(), runtime.clone(), MockAlerts::new());
        supervisor
            .register_node(
                "litecoin",
                "litecoin-node",
                Arc::new(StubProber::named("litecoin").with_connect_error("connection refused")),
            )
            .unwrap();

        // Two failures stay below the default threshold of three.
        for expected in 1..=2u32 {
            let status = supervisor.force_check("litecoin").await.unwrap();
            assert_eq!(status, NodeStatus::Unhealthy);
            let health = supervisor.node_health("litecoin").unwrap();
            assert_eq!(health.consecutive_fails, expected);
            assert_eq!(health.total_failures, u64::from(expected));
            assert!(runtime.restarted().is_empty());
        }

        // Third failure crosses it.
        supervisor.force_check("litecoin").await.unwrap();
        assert_eq!(runtime.restarted(), vec!["litecoin-node".to_string()]);

        let health = supervisor.node_health("litecoin").unwrap();
        assert_eq!(health.total_restarts, 1);
        assert_eq!(health.restarts_this_hour, 1);
        assert_eq!(health.consecutive_fails, 0);
        assert!(health.last_restart.is_some());

        // Still failing, but inside the cooldown window.
        supervisor.force_check("litecoin").await.unwrap();
        assert_eq!(runtime.attempts(), 1);
    }

    #[tokio::test]
    async fn test_mweb_failure_restarts_immediately() {
        let runtime = MockRuntime::new();
        let alerts = MockAlerts::new();
        let config = MonitorConfig {
            consecutive_failures_before_restart: 2,
            max_restarts_per_hour: 3,
            ..quick_config()
        };
        let supervisor = supervisor_with(config, runtime.clone(), alerts.clone());
        supervisor
            .register_node(
                "litecoin",
                "litecoin-node",
                Arc::new(StubProber::named("litecoin").with_template_error(
                    -1,
                    "CreateNewBlock: TestBlockValidity failed: mweb-connect-failed, MWEB::Node::ConnectBlock()",
                )),
            )
            .unwrap();

        // First failing probe restarts despite the threshold of two.
        let status = supervisor.force_check("litecoin").await.unwrap();
        assert_eq!(status, NodeStatus::Degraded);
        assert_eq!(runtime.attempts(), 1);

        let health = supervisor.node_health("litecoin").unwrap();
        assert_eq!(health.total_restarts, 1);
        assert!(health
            .last_diagnostics
            .as_ref()
            .unwrap()
            .has_chain_error(CHAIN_ERROR_MWEB));

        // Probes inside the cooldown do not restart again.
        supervisor.force_check("litecoin").await.unwrap();
        supervisor.force_check("litecoin").await.unwrap();
        assert_eq!(runtime.attempts(), 1);

        assert!(alerts.titles().contains(&"Node restarted".to_string()));
    }

    #[tokio::test]
    async fn test_restart_rate_limit() {
        let runtime = MockRuntime::new();
        let config = MonitorConfig {
            consecutive_failures_before_restart: 1,
            max_restarts_per_hour: 2,
            restart_cooldown: Duration::from_millis(10),
            ..quick_config()
        };
        let supervisor = supervisor_with(config, runtime.clone(), MockAlerts::new());
        supervisor
            .register_node(
                "litecoin",
                "litecoin-node",
                Arc::new(StubProber::named("litecoin").with_connect_error("connection refused")),
            )
            .unwrap();

        // Hold the node in failure well past the cooldown each round.
        for _ in 0..10 {
            supervisor.force_check("litecoin").await.unwrap();
            tokio::time::sleep(Duration::from_millis(15)).await;
        }

        assert_eq!(runtime.attempts(), 2);
        let health = supervisor.node_health("litecoin").unwrap();
        assert_eq!(health.total_restarts, 2);
        assert_eq!(health.restarts_this_hour, 2);
    }

    #[tokio::test]
    async fn test_auto_restart_disabled() {
        let runtime = MockRuntime::new();
        let config = MonitorConfig {
            enable_auto_restart: false,
            consecutive_failures_before_restart: 1,
            ..quick_config()
        };
        let supervisor = supervisor_with(config, runtime.clone(), MockAlerts::new());
        supervisor
            .register_node(
                "litecoin",
                "litecoin-node",
                Arc::new(StubProber::named("litecoin").with_connect_error("connection refused")),
            )
            .unwrap();

        for _ in 0..5 {
            supervisor.force_check("litecoin").await.unwrap();
        }

        assert_eq!(runtime.attempts(), 0);
        assert_eq!(supervisor.node_health("litecoin").unwrap().total_restarts, 0);
    }

    #[tokio::test]
    async fn test_actuator_failure_leaves_state_untouched() {
        let runtime = MockRuntime::failing();
        let alerts = MockAlerts::new();
        let config = MonitorConfig {
            consecutive_failures_before_restart: 1,
            ..quick_config()
        };
        let supervisor = supervisor_with(config, runtime.clone(), alerts.clone());
        supervisor
            .register_node(
                "litecoin",
                "litecoin-node",
                Arc::new(StubProber::named("litecoin").with_connect_error("connection refused")),
            )
            .unwrap();

        supervisor.force_check("litecoin").await.unwrap();
        let health = supervisor.node_health("litecoin").unwrap();
        assert_eq!(health.total_restarts, 0);
        assert_eq!(health.consecutive_fails, 1);
        assert!(health.cooldown_until.is_none());

        // Not in cooldown, so the next probe retries the actuator.
        supervisor.force_check("litecoin").await.unwrap();
        assert_eq!(runtime.attempts(), 2);
        assert!(alerts.titles().contains(&"Node restart failed".to_string()));
    }

    #[tokio::test]
    async fn test_probe_budget_yields_absent_snapshot() {
        let runtime = MockRuntime::new();
        let config = MonitorConfig {
            rpc_timeout: Duration::from_millis(5),
            ..quick_config()
        };
        let supervisor = supervisor_with(config, runtime.clone(), MockAlerts::new());
        supervisor
            .register_node(
                "litecoin",
                "litecoin-node",
                Arc::new(
                    StubProber::named("litecoin").with_op_delay(Duration::from_millis(100)),
                ),
            )
            .unwrap();

        let status = supervisor.force_check("litecoin").await.unwrap();
        assert_eq!(status, NodeStatus::Unhealthy);
        let health = supervisor.node_health("litecoin").unwrap();
        assert_eq!(health.consecutive_fails, 1);
        assert!(health.last_diagnostics.is_none());
    }

    #[tokio::test]
    async fn test_custom_restart_rule() {
        let runtime = MockRuntime::new();
        let supervisor = supervisor_with(quick_config(), runtime.clone(), MockAlerts::new());
        supervisor
            .register_node(
                "blockdag",
                "blockdag-node",
                Arc::new(StubProber::named("blockdag").with_height(10)),
            )
            .unwrap();

        supervisor.add_rule(HealthRule::new(
            "Tip height suspiciously low",
            RuleAction::Restart,
            |diag| matches!(diag, Some(d) if d.rpc_connected && d.block_height < 100),
        ));

        supervisor.force_check("blockdag").await.unwrap();
        assert_eq!(runtime.restarted(), vec!["blockdag-node".to_string()]);
    }

    #[tokio::test]
    async fn test_latency_rule_alerts_without_restart() {
        let runtime = MockRuntime::new();
        let alerts = MockAlerts::new();
        let config = MonitorConfig {
            max_rpc_latency: Duration::from_millis(1),
            ..quick_config()
        };
        let supervisor = supervisor_with(config, runtime.clone(), alerts.clone());
        supervisor
            .register_node(
                "litecoin",
                "litecoin-node",
                Arc::new(StubProber::named("litecoin").with_op_delay(Duration::from_millis(20))),
            )
            .unwrap();

        let status = supervisor.force_check("litecoin").await.unwrap();
        assert_eq!(status, NodeStatus::Healthy);
        assert_eq!(runtime.attempts(), 0);
        assert!(alerts
            .titles()
            .contains(&"Node health warning".to_string()));
        assert_eq!(supervisor.stats().alerts_total, 1);
    }

    #[tokio::test]
    async fn test_register_unregister_round_trip() {
        let supervisor = supervisor_with(quick_config(), MockRuntime::new(), MockAlerts::new());

        assert_eq!(supervisor.stats().nodes_monitored, 0);
        supervisor
            .register_node("litecoin", "litecoin-node", Arc::new(StubProber::named("litecoin")))
            .unwrap();
        assert_eq!(supervisor.stats().nodes_monitored, 1);

        let err = supervisor
            .register_node("litecoin", "other", Arc::new(StubProber::named("litecoin")))
            .unwrap_err();
        assert!(matches!(err, MonitorError::DuplicateNode(_)));

        supervisor.unregister_node("litecoin").unwrap();
        assert_eq!(supervisor.stats().nodes_monitored, 0);
        assert!(supervisor.node_health("litecoin").is_none());

        let err = supervisor.unregister_node("litecoin").unwrap_err();
        assert!(matches!(err, MonitorError::UnknownNode(_)));
    }

    #[tokio::test]
    async fn test_force_check_unknown_node() {
        let supervisor = supervisor_with(quick_config(), MockRuntime::new(), MockAlerts::new());
        let err = supervisor.force_check("ghost").await.unwrap_err();
        assert!(matches!(err, MonitorError::UnknownNode(_)));
    }

    #[tokio::test]
    async fn test_lifecycle_errors() {
        let supervisor = supervisor_with(quick_config(), MockRuntime::new(), MockAlerts::new());

        assert!(!supervisor.is_running());
        supervisor.start().unwrap();
        assert!(supervisor.is_running());
        assert!(matches!(
            supervisor.start().unwrap_err(),
            MonitorError::AlreadyRunning
        ));

        supervisor.stop(Duration::from_secs(1)).await.unwrap();
        assert!(!supervisor.is_running());
        assert!(matches!(
            supervisor.stop(Duration::from_secs(1)).await.unwrap_err(),
            MonitorError::NotRunning
        ));
    }

    #[tokio::test]
    async fn test_driver_probes_periodically() {
        let supervisor = supervisor_with(quick_config(), MockRuntime::new(), MockAlerts::new());
        supervisor
            .register_node("litecoin", "litecoin-node", Arc::new(StubProber::named("litecoin")))
            .unwrap();

        supervisor.start().unwrap();
        tokio::time::sleep(Duration::from_millis(180)).await;
        supervisor.stop(Duration::from_secs(1)).await.unwrap();

        let health = supervisor.node_health("litecoin").unwrap();
        // Immediate tick plus at least two 50ms rounds.
        assert!(health.total_checks >= 3, "got {} checks", health.total_checks);
        assert_eq!(health.status, NodeStatus::Healthy);
        assert!(supervisor.stats().checks_total >= 3);
    }

    #[tokio::test]
    async fn test_stats_snapshot() {
        let supervisor = supervisor_with(quick_config(), MockRuntime::new(), MockAlerts::new());
        supervisor
            .register_node("a", "a-node", Arc::new(StubProber::named("a")))
            .unwrap();
        supervisor
            .register_node(
                "b",
                "b-node",
                Arc::new(StubProber::named("b").with_connect_error("refused")),
            )
            .unwrap();

        supervisor.force_check("a").await.unwrap();
        supervisor.force_check("b").await.unwrap();

        let stats = supervisor.stats();
        assert_eq!(stats.checks_total, 2);
        assert_eq!(stats.nodes_monitored, 2);
        assert_eq!(stats.unhealthy_count(), 1);
        // Sorted by name for stable rendering.
        assert_eq!(stats.nodes[0].name, "a");
        assert_eq!(stats.nodes[1].name, "b");
    }
}
