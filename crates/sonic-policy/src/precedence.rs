//! Per-direction precedence guards and the global statement table.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::{PolicyError, PrecedenceScope, Result};
use crate::registry::update_ref_list;
use crate::types::{ConfigOp, PolicyDirection};

/// Unique precedence per direction for import and export policies.
///
/// Global policies are not guarded.
#[derive(Debug, Clone, Default)]
pub struct PrecedenceGuard {
    import: BTreeMap<i32, String>,
    export: BTreeMap<i32, String>,
}

impl PrecedenceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, direction: PolicyDirection) -> Option<&BTreeMap<i32, String>> {
        match direction {
            PolicyDirection::Import => Some(&self.import),
            PolicyDirection::Export => Some(&self.export),
            PolicyDirection::Global => None,
        }
    }

    fn table_mut(&mut self, direction: PolicyDirection) -> Option<&mut BTreeMap<i32, String>> {
        match direction {
            PolicyDirection::Import => Some(&mut self.import),
            PolicyDirection::Export => Some(&mut self.export),
            PolicyDirection::Global => None,
        }
    }

    /// Fails with `DuplicatePrecedence` if `precedence` is taken in `direction`.
    pub fn check(&self, direction: PolicyDirection, precedence: i32) -> Result<()> {
        if let Some(existing) = self.table(direction).and_then(|t| t.get(&precedence)) {
            return Err(PolicyError::DuplicatePrecedence {
                scope: PrecedenceScope::Direction(direction),
                precedence,
                existing: existing.clone(),
            });
        }
        Ok(())
    }

    /// Records `policy` at `precedence`. Call only after [`PrecedenceGuard::check`].
    pub fn insert(&mut self, direction: PolicyDirection, precedence: i32, policy: &str) {
        if let Some(table) = self.table_mut(direction) {
            debug!(%direction, precedence, policy, "claim policy precedence");
            table.insert(precedence, policy.to_string());
        }
    }

    /// Releases `precedence` if it is held by `policy`.
    pub fn remove(&mut self, direction: PolicyDirection, precedence: i32, policy: &str) -> bool {
        let Some(table) = self.table_mut(direction) else {
            return false;
        };
        if table.get(&precedence).map(String::as_str) == Some(policy) {
            table.remove(&precedence);
            true
        } else {
            false
        }
    }

    pub fn policy_at(&self, direction: PolicyDirection, precedence: i32) -> Option<&str> {
        self.table(direction)
            .and_then(|t| t.get(&precedence))
            .map(String::as_str)
    }

    /// Policies of `direction` in ascending precedence order.
    pub fn ordered(&self, direction: PolicyDirection) -> Vec<(i32, &str)> {
        self.table(direction)
            .map(|t| t.iter().map(|(p, n)| (*p, n.as_str())).collect())
            .unwrap_or_default()
    }
}

/// Statement name -> every policy currently depending on it.
#[derive(Debug, Clone, Default)]
pub struct GlobalStatementTable {
    inner: HashMap<String, Vec<String>>,
}

impl GlobalStatementTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or removes `policy` as a dependent of `statement`.
    ///
    /// Returns false when a delete found nothing.
    pub fn update(&mut self, statement: &str, policy: &str, op: ConfigOp) -> bool {
        debug!(statement, policy, %op, "update global statement table");
        match op {
            ConfigOp::Add => {
                let list = self.inner.entry(statement.to_string()).or_default();
                update_ref_list(list, policy, op)
            }
            ConfigOp::Delete => {
                let Some(list) = self.inner.get_mut(statement) else {
                    return false;
                };
                let removed = update_ref_list(list, policy, op);
                if list.is_empty() {
                    self.inner.remove(statement);
                }
                removed
            }
        }
    }

    pub fn policies(&self, statement: &str) -> &[String] {
        self.inner.get(statement).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True if no policy depends on `statement`.
    pub fn is_unbound(&self, statement: &str) -> bool {
        self.policies(statement).is_empty()
    }
}
