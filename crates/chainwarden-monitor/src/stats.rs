//! Aggregate monitor statistics for the scrape surface.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::health::{NodeHealth, NodeStatus};

/// Snapshot of the whole supervisor, copied under the read lock for
/// rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStats {
    pub checks_total: u64,
    pub restarts_total: u64,
    pub alerts_total: u64,
    pub nodes_monitored: usize,
    pub started_at: DateTime<Utc>,
    pub uptime: Duration,
    pub nodes: Vec<NodeHealth>,
}

impl MonitorStats {
    pub fn unhealthy_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.status == NodeStatus::Unhealthy)
            .count()
    }
}
