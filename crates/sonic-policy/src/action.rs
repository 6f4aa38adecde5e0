//! Policy actions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::registry::HasBackRefs;

/// Accept or reject the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDisposition {
    Permit,
    Deny,
}

impl fmt::Display for RouteDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteDisposition::Permit => f.write_str("permit"),
            RouteDisposition::Deny => f.write_str("deny"),
        }
    }
}

/// Action-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    RouteDisposition(RouteDisposition),
    /// Redistribute the candidate into another protocol.
    Redistribution { target_protocol: String },
    SetAdminDistance { value: u32 },
}

impl ActionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ActionKind::RouteDisposition(_) => "route_disposition",
            ActionKind::Redistribution { .. } => "redistribution",
            ActionKind::SetAdminDistance { .. } => "set_admin_distance",
        }
    }
}

/// Action definition request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub name: String,
    pub action: ActionKind,
}

impl ActionConfig {
    pub fn new(name: impl Into<String>, action: ActionKind) -> Self {
        Self {
            name: name.into(),
            action,
        }
    }
}

/// A registered action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyAction {
    pub name: String,
    pub kind: ActionKind,
    /// Statements using this action.
    pub statements: Vec<String>,
}

impl PolicyAction {
    pub fn from_config(config: &ActionConfig) -> Self {
        Self {
            name: config.name.clone(),
            kind: config.action.clone(),
            statements: Vec::new(),
        }
    }
}

impl HasBackRefs for PolicyAction {
    fn back_refs(&self) -> &[String] {
        &self.statements
    }

    fn back_refs_mut(&mut self) -> &mut Vec<String> {
        &mut self.statements
    }
}
