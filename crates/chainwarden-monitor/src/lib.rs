//! Node health supervision
//!
//! The supervisor loop, the per-node state machine, and the rule set
//! that together drive bounded automated recovery.

pub mod error;
pub mod global;
pub mod health;
pub mod rules;
pub mod stats;
pub mod supervisor;

pub use error::{MonitorError, Result};
pub use global::{global, init_global};
pub use health::{NodeHealth, NodeStatus};
pub use rules::{builtin_rules, HealthRule, RuleAction};
pub use stats::MonitorStats;
pub use supervisor::{MonitorConfig, NodeSupervisor};
