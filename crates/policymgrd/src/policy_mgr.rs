//! Policy Manager - applies policy configuration to a [`PolicyEngine`].

use std::sync::Arc;

use serde::Serialize;
use sonic_policy::{
    fetch_all, ActionConfig, ConditionConfig, ConfigOp, PolicyEngine, PolicyEngineConfig,
    PrefixSetConfig, StatementConfig,
};
use tracing::{error, info};

use crate::config::{PolicyConfig, PolicyMgrConfig};
use crate::error::PolicyMgrResult;
use crate::route_table::{PolicyExt, RouteState, RouteTable};

/// One configuration entry, tagged by the table it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyConfigEntry {
    PrefixSet(PrefixSetConfig),
    Condition(ConditionConfig),
    Action(ActionConfig),
    Statement(StatementConfig),
    Policy(PolicyConfig),
}

impl PolicyConfigEntry {
    pub fn table(&self) -> &'static str {
        match self {
            PolicyConfigEntry::PrefixSet(_) => "PREFIX_SET",
            PolicyConfigEntry::Condition(_) => "POLICY_CONDITION",
            PolicyConfigEntry::Action(_) => "POLICY_ACTION",
            PolicyConfigEntry::Statement(_) => "POLICY_STATEMENT",
            PolicyConfigEntry::Policy(_) => "POLICY_DEFINITION",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PolicyConfigEntry::PrefixSet(c) => &c.name,
            PolicyConfigEntry::Condition(c) => &c.name,
            PolicyConfigEntry::Action(c) => &c.name,
            PolicyConfigEntry::Statement(c) => &c.name,
            PolicyConfigEntry::Policy(c) => &c.name,
        }
    }
}

/// Flattens a document into entries in dependency order.
fn ordered_entries(config: &PolicyMgrConfig) -> Vec<PolicyConfigEntry> {
    config
        .prefix_sets
        .iter()
        .cloned()
        .map(PolicyConfigEntry::PrefixSet)
        .chain(config.conditions.iter().cloned().map(PolicyConfigEntry::Condition))
        .chain(config.actions.iter().cloned().map(PolicyConfigEntry::Action))
        .chain(config.statements.iter().cloned().map(PolicyConfigEntry::Statement))
        .chain(config.policies.iter().cloned().map(PolicyConfigEntry::Policy))
        .collect()
}

/// A failed entry in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryFailure {
    pub table: String,
    pub name: String,
    pub op: String,
    pub error: String,
}

/// Outcome of applying a batch of entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub succeeded: usize,
    pub failures: Vec<EntryFailure>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Snapshot of engine and route state, as printed by `--dump`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDump {
    pub statements: Vec<String>,
    pub policies: Vec<String>,
    pub import_policies: Vec<(i32, String)>,
    pub export_policies: Vec<(i32, String)>,
    pub routes: Vec<RouteState>,
}

/// Policy Manager
///
/// Owns the policy engine and the route table the engine evaluates
/// policies against. All operations run on the caller's thread.
pub struct PolicyMgr {
    engine: PolicyEngine<PolicyExt>,
    routes: Arc<RouteTable>,
}

impl PolicyMgr {
    pub fn new(config: PolicyEngineConfig, routes: Arc<RouteTable>) -> Self {
        info!(engine = %config.name, routes = routes.len(), "PolicyMgr initialized");
        let mut engine = PolicyEngine::new(config);
        engine.set_callbacks(routes.clone());
        Self { engine, routes }
    }

    /// Builds a manager from a full document and applies it.
    pub fn from_config(config: &PolicyMgrConfig) -> (Self, ApplyReport) {
        let routes = Arc::new(RouteTable::new(config.routes.iter().cloned()));
        let mut mgr = Self::new(config.engine.clone(), routes);
        let report = mgr.apply_config(config);
        (mgr, report)
    }

    pub fn engine(&self) -> &PolicyEngine<PolicyExt> {
        &self.engine
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Applies one entry.
    pub fn process(&mut self, op: ConfigOp, entry: &PolicyConfigEntry) -> PolicyMgrResult<()> {
        let name = entry.name();
        match (op, entry) {
            (ConfigOp::Add, PolicyConfigEntry::PrefixSet(c)) => self.engine.create_prefix_set(c)?,
            (ConfigOp::Add, PolicyConfigEntry::Condition(c)) => self.engine.create_condition(c)?,
            (ConfigOp::Add, PolicyConfigEntry::Action(c)) => self.engine.create_action(c)?,
            (ConfigOp::Add, PolicyConfigEntry::Statement(c)) => {
                self.engine.create_policy_statement(c)?
            }
            (ConfigOp::Add, PolicyConfigEntry::Policy(c)) => {
                self.engine.create_policy_definition(c)?
            }
            (ConfigOp::Delete, PolicyConfigEntry::PrefixSet(_)) => {
                self.engine.delete_prefix_set(name)?
            }
            (ConfigOp::Delete, PolicyConfigEntry::Condition(_)) => {
                self.engine.delete_condition(name)?
            }
            (ConfigOp::Delete, PolicyConfigEntry::Action(_)) => self.engine.delete_action(name)?,
            (ConfigOp::Delete, PolicyConfigEntry::Statement(_)) => {
                self.engine.delete_policy_statement(name)?
            }
            (ConfigOp::Delete, PolicyConfigEntry::Policy(_)) => {
                self.engine.delete_policy_definition(name)?
            }
        }
        Ok(())
    }

    /// Applies a batch, continuing past failed entries.
    pub fn process_batch<'a, I>(&mut self, op: ConfigOp, entries: I) -> ApplyReport
    where
        I: IntoIterator<Item = &'a PolicyConfigEntry>,
    {
        let mut report = ApplyReport::default();
        for entry in entries {
            match self.process(op, entry) {
                Ok(()) => report.succeeded += 1,
                Err(e) => {
                    error!(
                        table = entry.table(),
                        name = entry.name(),
                        %op,
                        error = %e,
                        "failed to process entry"
                    );
                    report.failures.push(EntryFailure {
                        table: entry.table().to_string(),
                        name: entry.name().to_string(),
                        op: op.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Creates every definition in a document, dependencies first.
    pub fn apply_config(&mut self, config: &PolicyMgrConfig) -> ApplyReport {
        let entries = ordered_entries(config);
        let report = self.process_batch(ConfigOp::Add, &entries);
        info!(
            succeeded = report.succeeded,
            failed = report.failures.len(),
            "applied policy config"
        );
        report
    }

    /// Deletes every definition in a document, dependents first.
    pub fn remove_config(&mut self, config: &PolicyMgrConfig) -> ApplyReport {
        let entries = ordered_entries(config);
        let report = self.process_batch(ConfigOp::Delete, entries.iter().rev());
        info!(
            succeeded = report.succeeded,
            failed = report.failures.len(),
            "removed policy config"
        );
        report
    }

    /// Walks both local views with the bulk cursor.
    pub fn dump(&self) -> PolicyDump {
        let batch = self.engine.config().candidate_batch_size;
        let statements = fetch_all(batch, |mark, count| {
            Ok::<_, String>(self.engine.get_bulk_statements(mark, count))
        })
        .unwrap_or_default();
        let policies = fetch_all(batch, |mark, count| {
            Ok::<_, String>(self.engine.get_bulk_policies(mark, count))
        })
        .unwrap_or_default();
        let owned = |list: Vec<(i32, &str)>| -> Vec<(i32, String)> {
            list.into_iter().map(|(p, n)| (p, n.to_string())).collect()
        };

        PolicyDump {
            statements,
            policies,
            import_policies: owned(self.engine.import_policies()),
            export_policies: owned(self.engine.export_policies()),
            routes: self.routes.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sonic_policy::{ActionKind, PolicyDefinitionConfig, RouteDisposition};

    use crate::route_table::RouteEntry;

    fn mgr() -> PolicyMgr {
        let routes = Arc::new(RouteTable::new([RouteEntry::new(
            "10.1.2.0/24".parse().unwrap(),
            "BGP",
        )]));
        PolicyMgr::new(PolicyEngineConfig::default(), routes)
    }

    #[test]
    fn test_process_add_and_delete() {
        let mut mgr = mgr();
        let action = PolicyConfigEntry::Action(ActionConfig::new(
            "deny",
            ActionKind::RouteDisposition(RouteDisposition::Deny),
        ));
        mgr.process(ConfigOp::Add, &action).unwrap();
        assert!(mgr.engine().action("deny").is_some());

        mgr.process(ConfigOp::Delete, &action).unwrap();
        assert!(mgr.engine().action("deny").is_none());
        assert!(mgr.process(ConfigOp::Delete, &action).is_err());
    }

    #[test]
    fn test_batch_continues_after_failure() {
        let mut mgr = mgr();
        let entries = vec![
            PolicyConfigEntry::Statement(
                StatementConfig::new("s1", "any").with_actions(["missing"]),
            ),
            PolicyConfigEntry::Statement(StatementConfig::new("s2", "all")),
            PolicyConfigEntry::Policy(PolicyDefinitionConfig::new("p1", 10).export().with_statement(1, "s2")),
        ];

        let report = mgr.process_batch(ConfigOp::Add, &entries);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "s1");
        assert_eq!(report.failures[0].table, "POLICY_STATEMENT");
        assert!(!report.is_clean());
    }

    #[test]
    fn test_dump_lists_live_objects() {
        let mut mgr = mgr();
        for name in ["s1", "s2", "s3"] {
            mgr.process(
                ConfigOp::Add,
                &PolicyConfigEntry::Statement(StatementConfig::new(name, "any")),
            )
            .unwrap();
        }
        mgr.process(
            ConfigOp::Delete,
            &PolicyConfigEntry::Statement(StatementConfig::new("s2", "any")),
        )
        .unwrap();

        let dump = mgr.dump();
        assert_eq!(dump.statements, vec!["s1", "s3"]);
        assert!(dump.policies.is_empty());
        assert_eq!(dump.routes.len(), 1);
    }
}
