//! Policy definitions: precedence-ordered statement collections.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{MatchMode, PolicyDirection};

/// A statement reference inside a policy definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementPrecedence {
    pub precedence: i32,
    pub statement: String,
}

impl StatementPrecedence {
    pub fn new(precedence: i32, statement: impl Into<String>) -> Self {
        Self {
            precedence,
            statement: statement.into(),
        }
    }
}

/// Policy definition request.
///
/// `X` is the protocol-specific extension payload, resolved by the
/// embedding application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDefinitionConfig<X = ()> {
    pub name: String,
    pub precedence: i32,
    /// `"any"` or `"all"`.
    #[serde(default = "default_match_type")]
    pub match_type: String,
    #[serde(default)]
    pub statements: Vec<StatementPrecedence>,
    #[serde(default)]
    pub import: bool,
    #[serde(default)]
    pub export: bool,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub extensions: X,
}

fn default_match_type() -> String {
    MatchMode::All.as_str().to_string()
}

impl<X: Default> PolicyDefinitionConfig<X> {
    pub fn new(name: impl Into<String>, precedence: i32) -> Self {
        Self {
            name: name.into(),
            precedence,
            match_type: default_match_type(),
            statements: Vec::new(),
            import: false,
            export: false,
            global: false,
            extensions: X::default(),
        }
    }
}

impl<X> PolicyDefinitionConfig<X> {
    pub fn import(mut self) -> Self {
        self.import = true;
        self
    }

    pub fn export(mut self) -> Self {
        self.export = true;
        self
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn with_match_type(mut self, match_type: impl Into<String>) -> Self {
        self.match_type = match_type.into();
        self
    }

    pub fn with_statement(mut self, precedence: i32, statement: impl Into<String>) -> Self {
        self.statements
            .push(StatementPrecedence::new(precedence, statement));
        self
    }

    pub fn with_extensions(mut self, extensions: X) -> Self {
        self.extensions = extensions;
        self
    }
}

/// A registered policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy<X = ()> {
    pub name: String,
    pub precedence: i32,
    pub match_type: MatchMode,
    /// Statement precedence -> statement name, evaluated ascending.
    pub statements: BTreeMap<i32, String>,
    pub direction: PolicyDirection,
    /// Slot in the policy local view.
    pub local_view_idx: usize,
    pub extensions: X,
}

impl<X> Policy<X> {
    /// Statement names in evaluation order.
    pub fn ordered_statements(&self) -> impl Iterator<Item = &String> {
        self.statements.values()
    }

    pub fn is_import(&self) -> bool {
        self.direction == PolicyDirection::Import
    }

    pub fn is_export(&self) -> bool {
        self.direction == PolicyDirection::Export
    }

    pub fn is_global(&self) -> bool {
        self.direction == PolicyDirection::Global
    }
}
