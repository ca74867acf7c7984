//! Per-node health record and state transitions
//!
//! Owned and mutated exclusively by the supervisor. A node in IBD is
//! degraded but never counts as failing; the restart budget resets
//! lazily once its carrier timestamp is an hour old.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chainwarden_probe::Diagnostics;

/// Classification of a supervised node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// No probe has completed yet.
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
}

impl NodeStatus {
    /// Stable numeric encoding for the metrics surface.
    pub fn as_metric_value(&self) -> u64 {
        match self {
            NodeStatus::Unknown => 0,
            NodeStatus::Healthy => 1,
            NodeStatus::Degraded => 2,
            NodeStatus::Unhealthy => 3,
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Unknown => write!(f, "unknown"),
            NodeStatus::Healthy => write!(f, "healthy"),
            NodeStatus::Degraded => write!(f, "degraded"),
            NodeStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Mutable health record for one supervised node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeHealth {
    pub name: String,
    pub container_name: String,
    pub status: NodeStatus,

    pub total_checks: u64,
    pub total_failures: u64,
    pub total_restarts: u64,
    pub restarts_this_hour: u32,
    pub consecutive_fails: u32,

    pub last_check: Option<DateTime<Utc>>,
    pub last_healthy: Option<DateTime<Utc>>,
    pub last_restart: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,

    /// Carrier for the lazy hourly restart-budget reset.
    pub hourly_window_start: DateTime<Utc>,

    /// Most recent snapshot; absent before the first completed probe.
    pub last_diagnostics: Option<Diagnostics>,
}

impl NodeHealth {
    pub fn new(name: &str, container_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            container_name: container_name.to_string(),
            status: NodeStatus::Unknown,
            total_checks: 0,
            total_failures: 0,
            total_restarts: 0,
            restarts_this_hour: 0,
            consecutive_fails: 0,
            last_check: None,
            last_healthy: None,
            last_restart: None,
            cooldown_until: None,
            hourly_window_start: now,
            last_diagnostics: None,
        }
    }

    /// Reset the hourly restart budget when its window has elapsed.
    pub fn roll_hourly_window(&mut self, now: DateTime<Utc>) {
        if now.signed_duration_since(self.hourly_window_start) >= chrono::Duration::hours(1) {
            self.restarts_this_hour = 0;
            self.hourly_window_start = now;
        }
    }

    /// Apply one probe outcome. Returns whether the probe counted as a
    /// failure.
    ///
    /// An absent snapshot means the probe never completed inside its
    /// budget and is treated like an unreachable node.
    pub fn observe(&mut self, diag: Option<Diagnostics>, now: DateTime<Utc>) -> bool {
        self.total_checks += 1;
        self.last_check = Some(now);

        let failed = match &diag {
            None => {
                self.status = NodeStatus::Unhealthy;
                self.consecutive_fails += 1;
                true
            }
            Some(d) if !d.rpc_connected => {
                self.status = NodeStatus::Unhealthy;
                self.consecutive_fails += 1;
                true
            }
            // IBD wins over a failing template: a syncing node is
            // degraded, never failing.
            Some(d) if d.is_ibd => {
                self.status = NodeStatus::Degraded;
                self.consecutive_fails = 0;
                self.last_healthy = Some(now);
                false
            }
            Some(d) if !d.block_template_ok => {
                self.status = NodeStatus::Degraded;
                self.consecutive_fails += 1;
                true
            }
            Some(_) => {
                self.status = NodeStatus::Healthy;
                self.consecutive_fails = 0;
                self.last_healthy = Some(now);
                false
            }
        };

        if failed {
            self.total_failures += 1;
        }
        if diag.is_some() {
            self.last_diagnostics = diag;
        }
        failed
    }

    /// Bookkeeping after a successful actuator call.
    pub fn record_restart(&mut self, now: DateTime<Utc>, cooldown: Duration) {
        self.total_restarts += 1;
        self.restarts_this_hour += 1;
        self.last_restart = Some(now);
        self.consecutive_fails = 0;

        let delta =
            chrono::Duration::from_std(cooldown).unwrap_or_else(|_| chrono::Duration::hours(1));
        let until = now
            .checked_add_signed(delta)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        // cooldown_until never moves backwards
        self.cooldown_until = Some(match self.cooldown_until {
            Some(previous) if previous > until => previous,
            _ => until,
        });
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.map(|until| now < until).unwrap_or(false)
    }
}
