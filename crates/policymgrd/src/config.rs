//! Policy configuration documents.
//!
//! One document describes a complete policy configuration:
//!
//! ```yaml
//! engine:
//!   name: rib
//!   candidate_batch_size: 256
//! prefix_sets:
//!   - name: private
//!     prefixes:
//!       - ip_prefix: 10.0.0.0/8
//!         masklength_range: "8..32"
//! conditions: []
//! actions: []
//! statements: []
//! policies: []
//! routes:
//!   - prefix: 10.1.0.0/16
//!     protocol: BGP
//! ```
//!
//! The format is picked from the file extension (`.json`, `.yaml`, `.yml`).

use std::fs;
use std::path::Path;

use serde::Deserialize;
use sonic_policy::{
    ActionConfig, ConditionConfig, PolicyDefinitionConfig, PolicyEngineConfig, PrefixSetConfig,
    StatementConfig,
};
use tracing::info;

use crate::error::{PolicyMgrError, PolicyMgrResult};
use crate::route_table::{PolicyExt, RouteEntry};

/// Policy definition as used by the daemon.
pub type PolicyConfig = PolicyDefinitionConfig<PolicyExt>;

/// A complete policymgrd configuration document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PolicyMgrConfig {
    pub engine: PolicyEngineConfig,
    pub prefix_sets: Vec<PrefixSetConfig>,
    pub conditions: Vec<ConditionConfig>,
    pub actions: Vec<ActionConfig>,
    pub statements: Vec<StatementConfig>,
    pub policies: Vec<PolicyConfig>,
    /// Initial route table.
    pub routes: Vec<RouteEntry>,
}

impl PolicyMgrConfig {
    /// Loads a document from `path`, choosing JSON or YAML by extension.
    pub fn load(path: impl AsRef<Path>) -> PolicyMgrResult<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let config = match extension.as_deref() {
            Some("json") => {
                let text = fs::read_to_string(path).map_err(|e| PolicyMgrError::io(&path_str, e))?;
                Self::from_json(&text).map_err(|source| PolicyMgrError::Json {
                    path: path_str.clone(),
                    source,
                })?
            }
            Some("yaml") | Some("yml") => {
                let text = fs::read_to_string(path).map_err(|e| PolicyMgrError::io(&path_str, e))?;
                Self::from_yaml(&text).map_err(|source| PolicyMgrError::Yaml {
                    path: path_str.clone(),
                    source,
                })?
            }
            _ => return Err(PolicyMgrError::unsupported_format(path_str)),
        };

        info!(
            path = %path_str,
            prefix_sets = config.prefix_sets.len(),
            conditions = config.conditions.len(),
            actions = config.actions.len(),
            statements = config.statements.len(),
            policies = config.policies.len(),
            routes = config.routes.len(),
            "loaded policy config"
        );
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Total number of policy definitions of every kind.
    pub fn definition_count(&self) -> usize {
        self.prefix_sets.len()
            + self.conditions.len()
            + self.actions.len()
            + self.statements.len()
            + self.policies.len()
    }
}
