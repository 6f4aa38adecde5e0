//! Policy Manager Daemon - route-policy configuration manager
//!
//! policymgrd loads route-policy definitions (prefix sets, conditions,
//! actions, statements and policies) and applies them through a
//! [`sonic_policy::PolicyEngine`] to an in-memory route table.
//!
//! Key features:
//! - Load JSON or YAML policy configuration documents
//! - Apply definitions in dependency order, reporting per-entry failures
//! - Evaluate policies against routes and withdraw them on delete
//! - Dump live statements/policies through the bulk cursor

pub mod config;
pub mod error;
pub mod policy_mgr;
pub mod route_table;

pub use config::{PolicyConfig, PolicyMgrConfig};
pub use error::{PolicyMgrError, PolicyMgrResult};
pub use policy_mgr::{ApplyReport, EntryFailure, PolicyConfigEntry, PolicyDump, PolicyMgr};
pub use route_table::{PolicyExt, PolicyExtension, RouteEntry, RouteState, RouteTable};
