//! Health rules
//!
//! A rule is data: a stateless predicate over the latest snapshot, an
//! action kind, and a human-readable description used as the reason
//! string. Built-in rules cover the conditions the supervisor already
//! tracks; operators may register additional ones, evaluated in
//! insertion order.

use std::time::Duration;

use chainwarden_probe::{Diagnostics, CHAIN_ERROR_MWEB};

/// What firing a rule asks the supervisor to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Restart,
    Alert,
}

type RulePredicate = Box<dyn Fn(Option<&Diagnostics>) -> bool + Send + Sync>;

pub struct HealthRule {
    pub description: String,
    pub action: RuleAction,
    predicate: RulePredicate,
}

impl HealthRule {
    pub fn new(
        description: &str,
        action: RuleAction,
        predicate: impl Fn(Option<&Diagnostics>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            description: description.to_string(),
            action,
            predicate: Box::new(predicate),
        }
    }

    pub fn fires(&self, diag: Option<&Diagnostics>) -> bool {
        (self.predicate)(diag)
    }
}

impl std::fmt::Debug for HealthRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthRule")
            .field("description", &self.description)
            .field("action", &self.action)
            .finish()
    }
}

/// The built-in rule set.
pub fn builtin_rules(max_rpc_latency: Duration) -> Vec<HealthRule> {
    vec![
        HealthRule::new("RPC connection down", RuleAction::Restart, |diag| {
            match diag {
                None => true,
                Some(d) => !d.rpc_connected,
            }
        }),
        HealthRule::new(
            "Block template generation failing",
            RuleAction::Restart,
            |diag| matches!(diag, Some(d) if d.rpc_connected && !d.block_template_ok && !d.is_ibd),
        ),
        HealthRule::new(
            "MWEB block validation failure",
            RuleAction::Restart,
            |diag| matches!(diag, Some(d) if d.has_chain_error(CHAIN_ERROR_MWEB)),
        ),
        HealthRule::new("RPC latency above threshold", RuleAction::Alert, move |diag| {
            matches!(diag, Some(d) if d.rpc_latency > max_rpc_latency)
        }),
    ]
}
