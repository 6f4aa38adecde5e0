//! Evaluation controller.
//!
//! Applies a policy's statements to the candidate objects supplied by the
//! embedding application, and withdraws exactly what was applied when the
//! policy goes away. The engine only orchestrates ordering and matching;
//! what an action means for a candidate is up to [`PolicyEngineCallbacks`].

use serde::{Deserialize, Serialize};
use sonic_types::IpPrefix;
use tracing::{debug, info, warn};

use crate::action::PolicyAction;
use crate::bulk::{fetch_all, BulkPage};
use crate::condition::ConditionMatcher;
use crate::engine::PolicyEngine;
use crate::error::{PolicyError, Result};
use crate::statement::PolicyStatement;
use crate::types::MatchMode;

/// An object a policy can be evaluated against (typically a route).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCandidate {
    /// Application key, unique per candidate.
    pub key: String,
    #[serde(default)]
    pub destination: Option<IpPrefix>,
    /// Source protocol, e.g. `"BGP"` or `"STATIC"`.
    #[serde(default)]
    pub protocol: Option<String>,
}

impl PolicyCandidate {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            destination: None,
            protocol: None,
        }
    }

    pub fn with_destination(mut self, destination: IpPrefix) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }
}

/// What is being applied: one action of one statement of one policy.
#[derive(Debug)]
pub struct ActionContext<'a, X> {
    pub policy: &'a str,
    pub statement: &'a str,
    pub action: &'a PolicyAction,
    /// The policy's extension payload.
    pub extensions: &'a X,
}

/// Callbacks implemented by the application embedding the engine.
pub trait PolicyEngineCallbacks<X>: Send + Sync {
    /// Fetches up to `count` candidates starting at `cur_mark`.
    fn get_bulk_candidates(
        &self,
        cur_mark: usize,
        count: usize,
    ) -> std::result::Result<BulkPage<PolicyCandidate>, String>;

    /// Executes an action against a candidate.
    fn apply_action(
        &self,
        ctx: &ActionContext<'_, X>,
        candidate: &PolicyCandidate,
    ) -> std::result::Result<(), String>;

    /// Undoes a previously applied action.
    fn withdraw_action(
        &self,
        ctx: &ActionContext<'_, X>,
        candidate: &PolicyCandidate,
    ) -> std::result::Result<(), String>;
}

/// One successfully applied action, kept so withdraw can undo it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEffect {
    pub candidate: PolicyCandidate,
    pub statement: String,
    pub action: String,
}

/// Outcome of one apply or withdraw run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub policy: String,
    pub candidates: usize,
    pub statements_matched: usize,
    pub actions_applied: usize,
    pub actions_withdrawn: usize,
    pub actions_failed: usize,
}

impl EvaluationSummary {
    fn new(policy: &str) -> Self {
        Self {
            policy: policy.to_string(),
            ..Default::default()
        }
    }
}

impl<X> PolicyEngine<X> {
    /// Pages through every candidate the callbacks report. Without
    /// callbacks there are no candidates.
    pub(crate) fn fetch_candidates(&self) -> Result<Vec<PolicyCandidate>> {
        let Some(callbacks) = self.callbacks.as_ref() else {
            return Ok(Vec::new());
        };
        fetch_all(self.config.candidate_batch_size, |cur_mark, count| {
            callbacks.get_bulk_candidates(cur_mark, count)
        })
        .map_err(PolicyError::Candidate)
    }

    /// Applies `name` to every candidate the callbacks report.
    pub(crate) fn apply_policy(&mut self, name: &str) -> Result<EvaluationSummary> {
        let candidates = self.fetch_candidates()?;
        self.apply_policy_to(name, &candidates)
    }

    /// Applies `name` to `candidates`.
    ///
    /// Statements run in ascending precedence order; with policy match type
    /// `any` the first matching statement ends evaluation of a candidate.
    pub(crate) fn apply_policy_to(
        &mut self,
        name: &str,
        candidates: &[PolicyCandidate],
    ) -> Result<EvaluationSummary> {
        let mut summary = EvaluationSummary::new(name);
        let Some(callbacks) = self.callbacks.clone() else {
            debug!(policy = name, "no callbacks set, skipping apply");
            return Ok(summary);
        };

        let mut effects = Vec::new();
        {
            let policy = self.policies.lookup(name)?;
            for candidate in candidates {
                summary.candidates += 1;
                for stmt_name in policy.ordered_statements() {
                    let Some(stmt) = self.statements.get(stmt_name) else {
                        warn!(policy = name, statement = %stmt_name, "statement missing during apply");
                        continue;
                    };
                    if !self.statement_matches(stmt, candidate) {
                        continue;
                    }
                    summary.statements_matched += 1;

                    for action_name in &stmt.actions {
                        let Some(action) = self.actions.get(action_name) else {
                            warn!(statement = %stmt.name, action = %action_name, "action missing during apply");
                            continue;
                        };
                        let ctx = ActionContext {
                            policy: &policy.name,
                            statement: &stmt.name,
                            action,
                            extensions: &policy.extensions,
                        };
                        match callbacks.apply_action(&ctx, candidate) {
                            Ok(()) => {
                                summary.actions_applied += 1;
                                effects.push(AppliedEffect {
                                    candidate: candidate.clone(),
                                    statement: stmt.name.clone(),
                                    action: action.name.clone(),
                                });
                            }
                            Err(e) => {
                                summary.actions_failed += 1;
                                warn!(
                                    policy = name,
                                    statement = %stmt.name,
                                    action = %action.name,
                                    candidate = %candidate.key,
                                    error = %e,
                                    "failed to apply action"
                                );
                            }
                        }
                    }

                    if policy.match_type == MatchMode::Any {
                        break;
                    }
                }
            }
        }

        self.ledger.entry(name.to_string()).or_default().extend(effects);
        self.stats.evaluations += 1;
        self.stats.actions_applied += summary.actions_applied as u64;
        self.stats.actions_failed += summary.actions_failed as u64;
        info!(
            policy = name,
            candidates = summary.candidates,
            matched = summary.statements_matched,
            applied = summary.actions_applied,
            failed = summary.actions_failed,
            "applied policy"
        );
        Ok(summary)
    }

    /// Undoes every effect recorded for `name`, most recent first.
    ///
    /// Must run while the policy is still registered.
    pub(crate) fn withdraw_policy(&mut self, name: &str) -> EvaluationSummary {
        let mut summary = EvaluationSummary::new(name);
        let effects = self.ledger.remove(name).unwrap_or_default();
        if effects.is_empty() {
            return summary;
        }
        let Some(callbacks) = self.callbacks.clone() else {
            debug!(policy = name, "no callbacks set, dropping recorded effects");
            return summary;
        };
        let Some(policy) = self.policies.get(name) else {
            warn!(policy = name, "policy missing during withdraw");
            return summary;
        };

        for effect in effects.iter().rev() {
            let Some(action) = self.actions.get(&effect.action) else {
                warn!(action = %effect.action, "action missing during withdraw");
                summary.actions_failed += 1;
                continue;
            };
            let ctx = ActionContext {
                policy: &policy.name,
                statement: &effect.statement,
                action,
                extensions: &policy.extensions,
            };
            match callbacks.withdraw_action(&ctx, &effect.candidate) {
                Ok(()) => summary.actions_withdrawn += 1,
                Err(e) => {
                    summary.actions_failed += 1;
                    warn!(
                        policy = name,
                        action = %effect.action,
                        candidate = %effect.candidate.key,
                        error = %e,
                        "failed to withdraw action"
                    );
                }
            }
        }

        self.stats.actions_withdrawn += summary.actions_withdrawn as u64;
        self.stats.actions_failed += summary.actions_failed as u64;
        info!(
            policy = name,
            withdrawn = summary.actions_withdrawn,
            failed = summary.actions_failed,
            "withdrew policy"
        );
        summary
    }

    /// A statement without conditions matches everything.
    pub(crate) fn statement_matches(
        &self,
        stmt: &PolicyStatement,
        candidate: &PolicyCandidate,
    ) -> bool {
        if stmt.conditions.is_empty() {
            return true;
        }
        let mut results = stmt
            .conditions
            .iter()
            .map(|cond| self.condition_matches(&stmt.name, cond, candidate));
        match stmt.match_mode {
            MatchMode::Any => results.any(|m| m),
            MatchMode::All => results.all(|m| m),
        }
    }

    fn condition_matches(&self, statement: &str, condition: &str, candidate: &PolicyCandidate) -> bool {
        let Some(cond) = self.conditions.get(condition) else {
            return false;
        };
        match &cond.matcher {
            ConditionMatcher::Protocol(protocol) => {
                candidate.protocol.as_deref() == Some(protocol.as_str())
                    && self.protocol_index.contains(protocol, statement)
            }
            ConditionMatcher::Prefix { .. } | ConditionMatcher::PrefixSet(_) => candidate
                .destination
                .as_ref()
                .is_some_and(|dest| self.prefix_index.matches_owner(dest, statement, condition)),
        }
    }
}
