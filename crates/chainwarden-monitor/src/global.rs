//! Process-wide supervisor handle
//!
//! A thin convenience layer over one explicitly constructed
//! `NodeSupervisor`. Construction stays explicit; this only parks the
//! handle where late consumers can reach it.

use std::sync::OnceLock;

use crate::supervisor::NodeSupervisor;

static SUPERVISOR: OnceLock<NodeSupervisor> = OnceLock::new();

/// Install the process-wide handle. Returns false when one was
/// already installed (the original stays).
pub fn init_global(supervisor: NodeSupervisor) -> bool {
    SUPERVISOR.set(supervisor).is_ok()
}

/// The installed handle, if any.
pub fn global() -> Option<&'static NodeSupervisor> {
    SUPERVISOR.get()
}
