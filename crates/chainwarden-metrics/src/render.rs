//! Prometheus text exposition (format 0.0.4)
//!
//! Every emitted metric name gets exactly one `# HELP` and one
//! `# TYPE` line, with all samples grouped beneath; per-node samples
//! carry a `node` label. Families with no samples are omitted
//! entirely.

use std::fmt::Write as _;

use chainwarden_monitor::{MonitorStats, NodeHealth, NodeStatus};

const NAMESPACE: &str = "chainwarden";

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn write_family(
    out: &mut String,
    name: &str,
    kind: &str,
    help: &str,
    samples: &[(Option<String>, f64)],
) {
    if samples.is_empty() {
        return;
    }
    let _ = writeln!(out, "# HELP {}_{} {}", NAMESPACE, name, help);
    let _ = writeln!(out, "# TYPE {}_{} {}", NAMESPACE, name, kind);
    for (label, value) in samples {
        match label {
            Some(node) => {
                let _ = writeln!(
                    out,
                    "{}_{}{{node=\"{}\"}} {}",
                    NAMESPACE,
                    name,
                    node,
                    format_value(*value)
                );
            }
            None => {
                let _ = writeln!(out, "{}_{} {}", NAMESPACE, name, format_value(*value));
            }
        }
    }
}

fn node_samples<F>(nodes: &[NodeHealth], select: F) -> Vec<(Option<String>, f64)>
where
    F: Fn(&NodeHealth) -> Option<f64>,
{
    nodes
        .iter()
        .filter_map(|node| select(node).map(|value| (Some(node.name.clone()), value)))
        .collect()
}

fn bool_value(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// Render the full supervisor state table. `extra` is appended
/// verbatim for injectable exposition providers.
pub fn render_metrics(stats: &MonitorStats, extra: Option<&str>) -> String {
    let mut out = String::with_capacity(4096);

    write_family(
        &mut out,
        "checks_total",
        "counter",
        "Total node health checks performed",
        &[(None, stats.checks_total as f64)],
    );
    write_family(
        &mut out,
        "restarts_total",
        "counter",
        "Total container restarts issued",
        &[(None, stats.restarts_total as f64)],
    );
    write_family(
        &mut out,
        "alerts_total",
        "counter",
        "Total alerts dispatched",
        &[(None, stats.alerts_total as f64)],
    );
    write_family(
        &mut out,
        "nodes_monitored",
        "gauge",
        "Number of registered nodes",
        &[(None, stats.nodes_monitored as f64)],
    );
    write_family(
        &mut out,
        "uptime_seconds",
        "gauge",
        "Supervisor uptime in seconds",
        &[(None, stats.uptime.as_secs_f64())],
    );

    let nodes = &stats.nodes;
    write_family(
        &mut out,
        "node_healthy",
        "gauge",
        "Whether the node is healthy (1) or not (0)",
        &node_samples(nodes, |n| Some(bool_value(n.status == NodeStatus::Healthy))),
    );
    write_family(
        &mut out,
        "node_status",
        "gauge",
        "Node status (0=unknown, 1=healthy, 2=degraded, 3=unhealthy)",
        &node_samples(nodes, |n| Some(n.status.as_metric_value() as f64)),
    );
    write_family(
        &mut out,
        "node_consecutive_failures",
        "gauge",
        "Consecutive failed checks",
        &node_samples(nodes, |n| Some(n.consecutive_fails as f64)),
    );
    write_family(
        &mut out,
        "node_restarts_this_hour",
        "gauge",
        "Restarts issued in the current hourly window",
        &node_samples(nodes, |n| Some(n.restarts_this_hour as f64)),
    );
    write_family(
        &mut out,
        "node_checks_total",
        "counter",
        "Health checks performed for this node",
        &node_samples(nodes, |n| Some(n.total_checks as f64)),
    );
    write_family(
        &mut out,
        "node_failures_total",
        "counter",
        "Failed health checks for this node",
        &node_samples(nodes, |n| Some(n.total_failures as f64)),
    );
    write_family(
        &mut out,
        "node_restarts_total",
        "counter",
        "Restarts issued for this node",
        &node_samples(nodes, |n| Some(n.total_restarts as f64)),
    );
    write_family(
        &mut out,
        "node_last_check_timestamp",
        "gauge",
        "Unix time of the last check",
        &node_samples(nodes, |n| n.last_check.map(|t| t.timestamp() as f64)),
    );
    write_family(
        &mut out,
        "node_last_healthy_timestamp",
        "gauge",
        "Unix time the node was last healthy",
        &node_samples(nodes, |n| n.last_healthy.map(|t| t.timestamp() as f64)),
    );

    // Snapshot-derived series, present only after a completed probe.
    write_family(
        &mut out,
        "node_rpc_connected",
        "gauge",
        "Whether the node RPC answered the last probe",
        &node_samples(nodes, |n| {
            n.last_diagnostics
                .as_ref()
                .map(|d| bool_value(d.rpc_connected))
        }),
    );
    write_family(
        &mut out,
        "node_rpc_latency_seconds",
        "gauge",
        "RPC round-trip latency",
        &node_samples(nodes, |n| {
            n.last_diagnostics.as_ref().map(|d| d.rpc_latency.as_secs_f64())
        }),
    );
    write_family(
        &mut out,
        "node_sync_progress",
        "gauge",
        "Chain verification progress (0-1)",
        &node_samples(nodes, |n| n.last_diagnostics.as_ref().map(|d| d.sync_progress)),
    );
    write_family(
        &mut out,
        "node_block_height",
        "gauge",
        "Best block height reported by the node",
        &node_samples(nodes, |n| {
            n.last_diagnostics.as_ref().map(|d| d.block_height as f64)
        }),
    );
    write_family(
        &mut out,
        "node_block_template_ok",
        "gauge",
        "Whether block template generation succeeded",
        &node_samples(nodes, |n| {
            n.last_diagnostics
                .as_ref()
                .map(|d| bool_value(d.block_template_ok))
        }),
    );
    write_family(
        &mut out,
        "node_block_template_latency_seconds",
        "gauge",
        "Block template generation latency",
        &node_samples(nodes, |n| {
            n.last_diagnostics
                .as_ref()
                .map(|d| d.block_template_latency.as_secs_f64())
        }),
    );
    write_family(
        &mut out,
        "node_in_ibd",
        "gauge",
        "Whether the node is in initial block download",
        &node_samples(nodes, |n| {
            n.last_diagnostics.as_ref().map(|d| bool_value(d.is_ibd))
        }),
    );
    write_family(
        &mut out,
        "node_mempool_size",
        "gauge",
        "Transactions in the node mempool",
        &node_samples(nodes, |n| {
            n.last_diagnostics
                .as_ref()
                .and_then(|d| d.mempool.as_ref())
                .map(|m| m.size as f64)
        }),
    );
    write_family(
        &mut out,
        "node_mempool_bytes",
        "gauge",
        "Serialized size of the node mempool",
        &node_samples(nodes, |n| {
            n.last_diagnostics
                .as_ref()
                .and_then(|d| d.mempool.as_ref())
                .map(|m| m.bytes as f64)
        }),
    );
    write_family(
        &mut out,
        "node_chain_errors",
        "gauge",
        "Chain-specific error tags in the last probe",
        &node_samples(nodes, |n| {
            n.last_diagnostics
                .as_ref()
                .map(|d| d.chain_specific_errors.len() as f64)
        }),
    );

    if let Some(extra) = extra {
        if !extra.is_empty() {
            out.push_str(extra);
            if !extra.ends_with('\n') {
                out.push('\n');
            }
        }
    }

    out
}
