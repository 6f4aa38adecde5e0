//! PolicyEngine: registries, indices and the definition lifecycle.
//!
//! Every create validates all of its inputs before touching any registry,
//! back-reference or index, so a failed create leaves no residue. Deletes
//! refuse to remove anything another definition still references.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use sonic_types::IpPrefix;
use tracing::{debug, info, info_span, warn, Span};

use crate::action::{ActionConfig, PolicyAction};
use crate::bulk::BulkPage;
use crate::condition::{ConditionConfig, ConditionMatcher, PolicyCondition, PrefixSet, PrefixSetConfig};
use crate::error::{ObjectKind, PolicyError, PrecedenceScope, Result};
use crate::eval::{AppliedEffect, EvaluationSummary, PolicyEngineCallbacks};
use crate::index::{PrefixIndex, PrefixMatchEntry, ProtocolIndex};
use crate::local_view::LocalView;
use crate::policy::{Policy, PolicyDefinitionConfig};
use crate::precedence::{GlobalStatementTable, PrecedenceGuard};
use crate::registry::Registry;
use crate::statement::{PolicyStatement, StatementConfig};
use crate::types::{ConfigOp, MatchMode, PolicyDirection};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PolicyEngineConfig {
    /// Instance name, recorded on the engine's tracing span.
    pub name: String,
    /// Page size used when fetching candidates.
    pub candidate_batch_size: usize,
}

impl Default for PolicyEngineConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            candidate_batch_size: 128,
        }
    }
}

/// Engine statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyEngineStats {
    /// Definitions of any kind created.
    pub objects_created: u64,
    /// Definitions of any kind deleted.
    pub objects_deleted: u64,
    /// Apply runs.
    pub evaluations: u64,
    pub actions_applied: u64,
    pub actions_withdrawn: u64,
    pub actions_failed: u64,
}

/// Route-policy engine.
///
/// `X` is the policy extension payload handed back to the callbacks with
/// every action.
pub struct PolicyEngine<X = ()> {
    pub(crate) config: PolicyEngineConfig,
    span: Span,
    prefix_sets: Registry<PrefixSet>,
    pub(crate) conditions: Registry<PolicyCondition>,
    pub(crate) actions: Registry<PolicyAction>,
    pub(crate) statements: Registry<PolicyStatement>,
    pub(crate) policies: Registry<Policy<X>>,
    pub(crate) protocol_index: ProtocolIndex,
    pub(crate) prefix_index: PrefixIndex,
    precedence: PrecedenceGuard,
    statement_policies: GlobalStatementTable,
    statement_view: LocalView,
    policy_view: LocalView,
    pub(crate) callbacks: Option<Arc<dyn PolicyEngineCallbacks<X>>>,
    /// Policy name -> effects applied by its last apply run.
    pub(crate) ledger: HashMap<String, Vec<AppliedEffect>>,
    pub(crate) stats: PolicyEngineStats,
}

impl<X> fmt::Debug for PolicyEngine<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("config", &self.config)
            .field("prefix_set_count", &self.prefix_sets.len())
            .field("condition_count", &self.conditions.len())
            .field("action_count", &self.actions.len())
            .field("statement_count", &self.statements.len())
            .field("policy_count", &self.policies.len())
            .field("prefix_index", &self.prefix_index)
            .field("has_callbacks", &self.callbacks.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

impl<X> PolicyEngine<X> {
    /// Creates an engine logging under a `policy_engine` span.
    pub fn new(config: PolicyEngineConfig) -> Self {
        let span = info_span!("policy_engine", engine = %config.name);
        Self::with_span(config, span)
    }

    /// Creates an engine whose events are all emitted inside `span`.
    pub fn with_span(config: PolicyEngineConfig, span: Span) -> Self {
        Self {
            config,
            span,
            prefix_sets: Registry::new(ObjectKind::PrefixSet),
            conditions: Registry::new(ObjectKind::Condition),
            actions: Registry::new(ObjectKind::Action),
            statements: Registry::new(ObjectKind::Statement),
            policies: Registry::new(ObjectKind::Policy),
            protocol_index: ProtocolIndex::new(),
            prefix_index: PrefixIndex::new(),
            precedence: PrecedenceGuard::new(),
            statement_policies: GlobalStatementTable::new(),
            statement_view: LocalView::new(),
            policy_view: LocalView::new(),
            callbacks: None,
            ledger: HashMap::new(),
            stats: PolicyEngineStats::default(),
        }
    }

    /// Sets the callbacks used by the evaluation controller.
    pub fn set_callbacks(&mut self, callbacks: Arc<dyn PolicyEngineCallbacks<X>>) {
        self.callbacks = Some(callbacks);
    }

    pub fn config(&self) -> &PolicyEngineConfig {
        &self.config
    }

    pub fn stats(&self) -> &PolicyEngineStats {
        &self.stats
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    // ---- prefix sets ----

    pub fn create_prefix_set(&mut self, config: &PrefixSetConfig) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.prefix_sets.ensure_absent(&config.name)?;
        let set = PrefixSet::from_config(config)?;
        let members = set.members.len();
        self.prefix_sets.insert(config.name.clone(), set)?;

        self.stats.objects_created += 1;
        info!(prefix_set = %config.name, members, "created prefix set");
        Ok(())
    }

    pub fn delete_prefix_set(&mut self, name: &str) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.prefix_sets.ensure_unreferenced(name)?;
        self.prefix_sets.remove(name)?;

        self.stats.objects_deleted += 1;
        info!(prefix_set = name, "deleted prefix set");
        Ok(())
    }

    // ---- conditions ----

    pub fn create_condition(&mut self, config: &ConditionConfig) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.conditions.ensure_absent(&config.name)?;
        let matcher = ConditionMatcher::from_config(config)?;
        if let ConditionMatcher::PrefixSet(set) = &matcher {
            if !self.prefix_sets.contains(set) {
                return Err(PolicyError::undefined(ObjectKind::PrefixSet, set, &config.name));
            }
        }

        if let ConditionMatcher::PrefixSet(set) = &matcher {
            self.prefix_sets
                .update_back_ref(set, &config.name, ConfigOp::Add)?;
        }
        self.conditions.insert(
            config.name.clone(),
            PolicyCondition {
                name: config.name.clone(),
                kind: config.condition.clone(),
                matcher,
                statements: Vec::new(),
            },
        )?;

        self.stats.objects_created += 1;
        info!(
            condition = %config.name,
            kind = config.condition.type_name(),
            "created condition"
        );
        Ok(())
    }

    pub fn delete_condition(&mut self, name: &str) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.conditions.ensure_unreferenced(name)?;
        let condition = self.conditions.remove(name)?;
        if let ConditionMatcher::PrefixSet(set) = &condition.matcher {
            match self.prefix_sets.update_back_ref(set, name, ConfigOp::Delete) {
                Ok(true) => {}
                Ok(false) => warn!(condition = name, prefix_set = %set, "condition missing from prefix set users"),
                Err(e) => warn!(condition = name, error = %e, "failed to unbind prefix set"),
            }
        }

        self.stats.objects_deleted += 1;
        info!(condition = name, "deleted condition");
        Ok(())
    }

    // ---- actions ----

    pub fn create_action(&mut self, config: &ActionConfig) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.actions
            .insert(config.name.clone(), PolicyAction::from_config(config))?;

        self.stats.objects_created += 1;
        info!(action = %config.name, kind = config.action.type_name(), "created action");
        Ok(())
    }

    pub fn delete_action(&mut self, name: &str) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.actions.ensure_unreferenced(name)?;
        self.actions.remove(name)?;

        self.stats.objects_deleted += 1;
        info!(action = name, "deleted action");
        Ok(())
    }

    // ---- statements ----

    /// Registers a statement and binds it to its conditions and actions.
    pub fn create_policy_statement(&mut self, config: &StatementConfig) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.statements.ensure_absent(&config.name)?;
        let match_mode: MatchMode = config.match_conditions.parse()?;
        if let Some(missing) = config.conditions.iter().find(|c| !self.conditions.contains(c)) {
            return Err(PolicyError::undefined(ObjectKind::Condition, missing, &config.name));
        }
        if let Some(missing) = config.actions.iter().find(|a| !self.actions.contains(a)) {
            return Err(PolicyError::undefined(ObjectKind::Action, missing, &config.name));
        }
        if let Some(repeated) = first_repeat(&config.conditions) {
            return Err(PolicyError::duplicate_reference(
                ObjectKind::Condition,
                repeated,
                &config.name,
            ));
        }
        if let Some(repeated) = first_repeat(&config.actions) {
            return Err(PolicyError::duplicate_reference(
                ObjectKind::Action,
                repeated,
                &config.name,
            ));
        }

        for condition in &config.conditions {
            self.bind_condition(&config.name, condition, ConfigOp::Add);
        }
        for action in &config.actions {
            self.bind_action(&config.name, action, ConfigOp::Add);
        }

        let local_view_idx = self.statement_view.append(&config.name);
        self.statements.insert(
            config.name.clone(),
            PolicyStatement {
                name: config.name.clone(),
                precedence: config.precedence,
                match_mode,
                conditions: config.conditions.clone(),
                actions: config.actions.clone(),
                policies: Vec::new(),
                local_view_idx,
            },
        )?;

        self.stats.objects_created += 1;
        info!(
            statement = %config.name,
            match_mode = %match_mode,
            conditions = config.conditions.len(),
            actions = config.actions.len(),
            slot = local_view_idx,
            "created policy statement"
        );
        Ok(())
    }

    /// Removes a statement that no policy uses any more.
    pub fn delete_policy_statement(&mut self, name: &str) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.statements.ensure_unreferenced(name)?;
        let users = self.statement_policies.policies(name);
        if !users.is_empty() {
            return Err(PolicyError::in_use(ObjectKind::Statement, name, users));
        }

        let local_view_idx = self.statements.lookup(name)?.local_view_idx;
        self.statement_view.invalidate(local_view_idx);
        let statement = self.statements.remove(name)?;

        for condition in &statement.conditions {
            self.bind_condition(name, condition, ConfigOp::Delete);
        }
        for action in &statement.actions {
            self.bind_action(name, action, ConfigOp::Delete);
        }

        self.stats.objects_deleted += 1;
        info!(statement = name, "deleted policy statement");
        Ok(())
    }

    /// Updates a condition's back-references and match indices for `statement`.
    ///
    /// Callers validate existence first; anything unexpected is logged.
    fn bind_condition(&mut self, statement: &str, condition: &str, op: ConfigOp) {
        match self.conditions.update_back_ref(condition, statement, op) {
            Ok(true) => {}
            Ok(false) => warn!(statement, condition, "statement missing from condition users"),
            Err(e) => {
                warn!(statement, condition, error = %e, "failed to update condition users");
                return;
            }
        }

        let Some(cond) = self.conditions.get(condition) else {
            return;
        };
        match &cond.matcher {
            ConditionMatcher::Protocol(protocol) => {
                if !self.protocol_index.update(protocol, statement, op) {
                    warn!(statement, protocol = %protocol, "protocol index entry missing");
                }
            }
            ConditionMatcher::Prefix { prefix, range } => {
                if !self.prefix_index.update(prefix, *range, statement, condition, op) {
                    warn!(statement, prefix = %prefix, "prefix index entry missing");
                }
            }
            ConditionMatcher::PrefixSet(set_name) => {
                let Some(set) = self.prefix_sets.get(set_name) else {
                    warn!(statement, prefix_set = %set_name, "prefix set missing");
                    return;
                };
                for (prefix, range) in &set.members {
                    if !self.prefix_index.update(prefix, *range, statement, condition, op) {
                        warn!(statement, prefix = %prefix, "prefix index entry missing");
                    }
                }
            }
        }
    }

    fn bind_action(&mut self, statement: &str, action: &str, op: ConfigOp) {
        match self.actions.update_back_ref(action, statement, op) {
            Ok(true) => {}
            Ok(false) => warn!(statement, action, "statement missing from action users"),
            Err(e) => warn!(statement, action, error = %e, "failed to update action users"),
        }
    }

    // ---- policies ----

    /// Registers a policy and applies it to the current candidates.
    ///
    /// A failure to fetch candidates is logged; the policy stays registered
    /// and can be applied later with [`PolicyEngine::reevaluate_policy`].
    pub fn create_policy_definition(&mut self, config: &PolicyDefinitionConfig<X>) -> Result<()>
    where
        X: Clone,
    {
        let span = self.span.clone();
        let _enter = span.enter();

        let direction =
            PolicyDirection::from_flags(&config.name, config.import, config.export, config.global)?;
        self.precedence.check(direction, config.precedence)?;
        self.policies.ensure_absent(&config.name)?;
        let match_type: MatchMode = config.match_type.parse()?;

        let mut statements = BTreeMap::new();
        for entry in &config.statements {
            if !self.statements.contains(&entry.statement) {
                return Err(PolicyError::undefined(
                    ObjectKind::Statement,
                    &entry.statement,
                    &config.name,
                ));
            }
            if statements.values().any(|s| *s == entry.statement) {
                return Err(PolicyError::duplicate_reference(
                    ObjectKind::Statement,
                    &entry.statement,
                    &config.name,
                ));
            }
            if let Some(existing) = statements.insert(entry.precedence, entry.statement.clone()) {
                return Err(PolicyError::DuplicatePrecedence {
                    scope: PrecedenceScope::Policy(config.name.clone()),
                    precedence: entry.precedence,
                    existing,
                });
            }
        }

        let local_view_idx = self.policy_view.append(&config.name);
        for statement in statements.values() {
            self.statement_policies
                .update(statement, &config.name, ConfigOp::Add);
            if let Err(e) = self
                .statements
                .update_back_ref(statement, &config.name, ConfigOp::Add)
            {
                warn!(policy = %config.name, statement = %statement, error = %e, "failed to bind statement");
            }
        }
        self.precedence
            .insert(direction, config.precedence, &config.name);
        self.policies.insert(
            config.name.clone(),
            Policy {
                name: config.name.clone(),
                precedence: config.precedence,
                match_type,
                statements,
                direction,
                local_view_idx,
                extensions: config.extensions.clone(),
            },
        )?;

        self.stats.objects_created += 1;
        info!(
            policy = %config.name,
            precedence = config.precedence,
            direction = %direction,
            slot = local_view_idx,
            "created policy definition"
        );

        if let Err(e) = self.apply_policy(&config.name) {
            warn!(policy = %config.name, error = %e, "failed to apply policy");
        }
        Ok(())
    }

    /// Withdraws a policy's effects, then removes it.
    pub fn delete_policy_definition(&mut self, name: &str) -> Result<()> {
        let span = self.span.clone();
        let _enter = span.enter();

        let local_view_idx = self.policies.lookup(name)?.local_view_idx;
        self.policy_view.invalidate(local_view_idx);
        self.withdraw_policy(name);

        let policy = self.policies.remove(name)?;
        for statement in policy.statements.values() {
            if !self.statement_policies.update(statement, name, ConfigOp::Delete) {
                warn!(policy = name, statement = %statement, "policy missing from statement table");
            }
            match self.statements.update_back_ref(statement, name, ConfigOp::Delete) {
                Ok(true) => {}
                Ok(false) => warn!(policy = name, statement = %statement, "policy missing from statement users"),
                Err(e) => warn!(policy = name, error = %e, "failed to unbind statement"),
            }
        }
        if !self
            .precedence
            .remove(policy.direction, policy.precedence, name)
            && policy.direction != PolicyDirection::Global
        {
            warn!(policy = name, precedence = policy.precedence, "precedence entry missing");
        }

        self.stats.objects_deleted += 1;
        info!(policy = name, direction = %policy.direction, "deleted policy definition");
        Ok(())
    }

    /// Withdraws and re-applies one policy against the current candidates.
    ///
    /// Candidates are fetched first; if that fails the policy's current
    /// effects are left in place.
    pub fn reevaluate_policy(&mut self, name: &str) -> Result<EvaluationSummary> {
        let span = self.span.clone();
        let _enter = span.enter();

        self.policies.lookup(name)?;
        let candidates = self.fetch_candidates()?;
        let withdrawn = self.withdraw_policy(name);
        let mut summary = self.apply_policy_to(name, &candidates)?;
        summary.actions_withdrawn = withdrawn.actions_withdrawn;
        summary.actions_failed += withdrawn.actions_failed;
        debug!(policy = name, ?summary, "re-evaluated policy");
        Ok(summary)
    }

    // ---- lookups ----

    pub fn prefix_set(&self, name: &str) -> Option<&PrefixSet> {
        self.prefix_sets.get(name)
    }

    pub fn condition(&self, name: &str) -> Option<&PolicyCondition> {
        self.conditions.get(name)
    }

    pub fn action(&self, name: &str) -> Option<&PolicyAction> {
        self.actions.get(name)
    }

    pub fn statement(&self, name: &str) -> Option<&PolicyStatement> {
        self.statements.get(name)
    }

    pub fn policy(&self, name: &str) -> Option<&Policy<X>> {
        self.policies.get(name)
    }

    pub fn statements_using_condition(&self, name: &str) -> Option<&[String]> {
        self.conditions.back_refs(name)
    }

    pub fn statements_using_action(&self, name: &str) -> Option<&[String]> {
        self.actions.back_refs(name)
    }

    /// Policies depending on `statement`, from the global statement table.
    pub fn policies_using_statement(&self, statement: &str) -> &[String] {
        self.statement_policies.policies(statement)
    }

    /// Import policies in ascending precedence order.
    pub fn import_policies(&self) -> Vec<(i32, &str)> {
        self.precedence.ordered(PolicyDirection::Import)
    }

    /// Export policies in ascending precedence order.
    pub fn export_policies(&self) -> Vec<(i32, &str)> {
        self.precedence.ordered(PolicyDirection::Export)
    }

    pub fn policy_at(&self, direction: PolicyDirection, precedence: i32) -> Option<&str> {
        self.precedence.policy_at(direction, precedence)
    }

    pub fn statements_for_protocol(&self, protocol: &str) -> &[String] {
        self.protocol_index.statements(protocol)
    }

    /// Prefix index entries whose range admits `dest`.
    pub fn prefix_lookup(&self, dest: &IpPrefix) -> Vec<&PrefixMatchEntry> {
        self.prefix_index.lookup(dest)
    }

    /// Longest keyed prefix covering `dest`.
    pub fn prefix_longest_match(&self, dest: &IpPrefix) -> Option<(IpPrefix, &[PrefixMatchEntry])> {
        self.prefix_index.longest_match(dest)
    }

    /// Effects currently recorded for `policy`.
    pub fn applied_effects(&self, policy: &str) -> &[AppliedEffect] {
        self.ledger.get(policy).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    // ---- bulk enumeration ----

    /// Up to `count` live statement names from slot `cur_mark` on.
    pub fn get_bulk_statements(&self, cur_mark: usize, count: usize) -> BulkPage<String> {
        self.statement_view.get_bulk(cur_mark, count)
    }

    /// Up to `count` live policy names from slot `cur_mark` on.
    pub fn get_bulk_policies(&self, cur_mark: usize, count: usize) -> BulkPage<String> {
        self.policy_view.get_bulk(cur_mark, count)
    }
}

/// First name that appears more than once in `names`.
fn first_repeat(names: &[String]) -> Option<&String> {
    names
        .iter()
        .enumerate()
        .find(|(idx, name)| names[..*idx].contains(name))
        .map(|(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, RouteDisposition};
    use pretty_assertions::assert_eq;

    fn pfx(s: &str) -> IpPrefix {
        s.parse().unwrap()
    }

    fn engine() -> PolicyEngine {
        let mut engine: PolicyEngine = PolicyEngine::new(PolicyEngineConfig::default());
        engine
            .create_condition(&ConditionConfig::prefix("cond-v4", pfx("10.0.0.0/8"), "16..24"))
            .unwrap();
        engine
            .create_condition(&ConditionConfig::protocol("cond-bgp", "BGP"))
            .unwrap();
        engine
            .create_action(&ActionConfig::new(
                "permit",
                ActionKind::RouteDisposition(RouteDisposition::Permit),
            ))
            .unwrap();
        engine
    }

    #[test]
    fn test_failed_statement_create_leaves_no_residue() {
        let mut engine = engine();
        let cfg = StatementConfig::new("stmt1", "any")
            .with_conditions(["cond-v4", "missing"])
            .with_actions(["permit"]);

        assert_eq!(
            engine.create_policy_statement(&cfg),
            Err(PolicyError::undefined(ObjectKind::Condition, "missing", "stmt1"))
        );
        assert!(engine.statements_using_condition("cond-v4").unwrap().is_empty());
        assert!(engine.statements_using_action("permit").unwrap().is_empty());
        assert!(engine.prefix_lookup(&pfx("10.1.2.0/24")).is_empty());
        assert!(engine.get_bulk_statements(0, 10).is_empty());
    }

    #[test]
    fn test_invalid_match_mode() {
        let mut engine = engine();
        let cfg = StatementConfig::new("stmt1", "some");
        assert_eq!(
            engine.create_policy_statement(&cfg),
            Err(PolicyError::InvalidMatchMode("some".to_string()))
        );
    }

    #[test]
    fn test_protocol_index_follows_statement() {
        let mut engine = engine();
        let cfg = StatementConfig::new("stmt-bgp", "all").with_conditions(["cond-bgp"]);
        engine.create_policy_statement(&cfg).unwrap();
        assert_eq!(engine.statements_for_protocol("BGP"), &["stmt-bgp"]);

        engine.delete_policy_statement("stmt-bgp").unwrap();
        assert!(engine.statements_for_protocol("BGP").is_empty());
    }

    #[test]
    fn test_in_use_definitions_cannot_be_deleted() {
        let mut engine = engine();
        let cfg = StatementConfig::new("stmt1", "any")
            .with_conditions(["cond-v4"])
            .with_actions(["permit"]);
        engine.create_policy_statement(&cfg).unwrap();

        assert!(matches!(
            engine.delete_condition("cond-v4"),
            Err(PolicyError::InUse { kind: ObjectKind::Condition, .. })
        ));
        assert!(matches!(
            engine.delete_action("permit"),
            Err(PolicyError::InUse { kind: ObjectKind::Action, .. })
        ));

        engine
            .create_policy_definition(
                &PolicyDefinitionConfig::new("pol1", 100)
                    .import()
                    .with_statement(1, "stmt1"),
            )
            .unwrap();
        assert!(matches!(
            engine.delete_policy_statement("stmt1"),
            Err(PolicyError::InUse { kind: ObjectKind::Statement, .. })
        ));
    }

    #[test]
    fn test_prefix_set_condition_expands_members() {
        let mut engine: PolicyEngine = PolicyEngine::new(PolicyEngineConfig::default());
        engine
            .create_prefix_set(&PrefixSetConfig {
                name: "private".to_string(),
                prefixes: vec![
                    crate::condition::PrefixSpec::new(pfx("10.0.0.0/8"), "8..32"),
                    crate::condition::PrefixSpec::new(pfx("192.168.0.0/16"), "exact"),
                ],
            })
            .unwrap();
        engine
            .create_condition(&ConditionConfig::prefix_set("cond-private", "private"))
            .unwrap();
        engine
            .create_policy_statement(
                &StatementConfig::new("stmt1", "any").with_conditions(["cond-private"]),
            )
            .unwrap();

        assert_eq!(engine.prefix_lookup(&pfx("10.9.0.0/16")).len(), 1);
        assert_eq!(engine.prefix_lookup(&pfx("192.168.0.0/16")).len(), 1);
        assert!(engine.prefix_lookup(&pfx("192.168.1.0/24")).is_empty());

        assert!(matches!(
            engine.delete_prefix_set("private"),
            Err(PolicyError::InUse { kind: ObjectKind::PrefixSet, .. })
        ));

        engine.delete_policy_statement("stmt1").unwrap();
        assert!(engine.prefix_lookup(&pfx("10.9.0.0/16")).is_empty());
        engine.delete_condition("cond-private").unwrap();
        engine.delete_prefix_set("private").unwrap();
        assert!(engine.prefix_set("private").is_none());
    }

    #[test]
    fn test_condition_with_unknown_prefix_set() {
        let mut engine: PolicyEngine = PolicyEngine::new(PolicyEngineConfig::default());
        assert_eq!(
            engine.create_condition(&ConditionConfig::prefix_set("c", "nope")),
            Err(PolicyError::undefined(ObjectKind::PrefixSet, "nope", "c"))
        );
        assert!(engine.condition("c").is_none());
    }

    #[test]
    fn test_policy_direction_flags() {
        let mut engine = engine();
        assert_eq!(
            engine.create_policy_definition(&PolicyDefinitionConfig::new("p", 1)),
            Err(PolicyError::MissingDirection("p".to_string()))
        );
        assert_eq!(
            engine.create_policy_definition(&PolicyDefinitionConfig::new("p", 1).import().export()),
            Err(PolicyError::AmbiguousDirection("p".to_string()))
        );
        assert_eq!(engine.policy_count(), 0);
        assert!(engine.get_bulk_policies(0, 10).is_empty());
    }

    #[test]
    fn test_duplicate_statement_precedence_within_policy() {
        let mut engine = engine();
        engine
            .create_policy_statement(&StatementConfig::new("s1", "any"))
            .unwrap();
        engine
            .create_policy_statement(&StatementConfig::new("s2", "any"))
            .unwrap();

        let cfg = PolicyDefinitionConfig::new("pol1", 10)
            .export()
            .with_statement(5, "s1")
            .with_statement(5, "s2");
        assert_eq!(
            engine.create_policy_definition(&cfg),
            Err(PolicyError::DuplicatePrecedence {
                scope: PrecedenceScope::Policy("pol1".to_string()),
                precedence: 5,
                existing: "s1".to_string(),
            })
        );
        assert!(engine.policies_using_statement("s1").is_empty());
        assert!(engine.export_policies().is_empty());
    }

    #[test]
    fn test_global_policies_share_precedence() {
        let mut engine = engine();
        engine
            .create_policy_definition(&PolicyDefinitionConfig::new("g1", 1).global())
            .unwrap();
        engine
            .create_policy_definition(&PolicyDefinitionConfig::new("g2", 1).global())
            .unwrap();
        assert!(engine.policy("g1").unwrap().is_global());

        engine.delete_policy_definition("g1").unwrap();
        engine.delete_policy_definition("g2").unwrap();
        assert_eq!(engine.stats().objects_deleted, 2);
    }

    #[test]
    fn test_delete_missing_definitions() {
        let mut engine = engine();
        assert_eq!(
            engine.delete_policy_definition("nope"),
            Err(PolicyError::not_found(ObjectKind::Policy, "nope"))
        );
        assert_eq!(
            engine.delete_policy_statement("nope"),
            Err(PolicyError::not_found(ObjectKind::Statement, "nope"))
        );
        assert_eq!(
            engine.reevaluate_policy("nope"),
            Err(PolicyError::not_found(ObjectKind::Policy, "nope"))
        );
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: PolicyEngineConfig = serde_json::from_str(r#"{"name": "rib"}"#).unwrap();
        assert_eq!(config.name, "rib");
        assert_eq!(config.candidate_batch_size, 128);
    }
}
