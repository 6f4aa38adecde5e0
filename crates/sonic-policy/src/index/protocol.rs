//! Protocol -> statements index.

use std::collections::HashMap;

use tracing::debug;

use crate::registry::update_ref_list;
use crate::types::ConfigOp;

/// Statements whose protocol-match condition selects each protocol.
#[derive(Debug, Clone, Default)]
pub struct ProtocolIndex {
    inner: HashMap<String, Vec<String>>,
}

impl ProtocolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or removes `statement` under `protocol`.
    ///
    /// Returns false when a delete found nothing to remove.
    pub fn update(&mut self, protocol: &str, statement: &str, op: ConfigOp) -> bool {
        debug!(protocol, statement, %op, "update protocol index");
        match op {
            ConfigOp::Add => {
                let list = self.inner.entry(protocol.to_string()).or_default();
                update_ref_list(list, statement, op)
            }
            ConfigOp::Delete => {
                let Some(list) = self.inner.get_mut(protocol) else {
                    debug!(protocol, "no statements indexed for protocol, nothing to delete");
                    return false;
                };
                let removed = update_ref_list(list, statement, op);
                if list.is_empty() {
                    self.inner.remove(protocol);
                }
                removed
            }
        }
    }

    pub fn statements(&self, protocol: &str) -> &[String] {
        self.inner.get(protocol).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, protocol: &str, statement: &str) -> bool {
        self.statements(protocol).iter().any(|s| s == statement)
    }

    pub fn protocol_count(&self) -> usize {
        self.inner.len()
    }
}
