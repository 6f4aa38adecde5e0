//! Policy statements: condition + action bundles.

use serde::{Deserialize, Serialize};

use crate::registry::HasBackRefs;
use crate::types::MatchMode;

/// Statement definition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementConfig {
    pub name: String,
    /// Ordering hint local to the statement; policies order statements by
    /// their own precedence map.
    #[serde(default)]
    pub precedence: i32,
    /// `"any"` or `"all"`.
    pub match_conditions: String,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
}

impl StatementConfig {
    pub fn new(name: impl Into<String>, match_conditions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            precedence: 0,
            match_conditions: match_conditions.into(),
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_conditions<I, S>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions = conditions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }
}

/// A registered statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStatement {
    pub name: String,
    pub precedence: i32,
    pub match_mode: MatchMode,
    pub conditions: Vec<String>,
    pub actions: Vec<String>,
    /// Policies using this statement.
    pub policies: Vec<String>,
    /// Slot in the statement local view.
    pub local_view_idx: usize,
}

impl HasBackRefs for PolicyStatement {
    fn back_refs(&self) -> &[String] {
        &self.policies
    }

    fn back_refs_mut(&mut self) -> &mut Vec<String> {
        &mut self.policies
    }
}
