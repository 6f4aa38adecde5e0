//! Route-policy engine for SONiC.
//!
//! Operators define named match conditions, actions, statements (condition
//! and action bundles with a match mode) and policies (precedence-ordered
//! statement collections) attached as import, export or global filters.
//!
//! # Structure
//!
//! - [`registry`]: name-keyed stores with back-references
//! - [`index`]: protocol and prefix match indices
//! - [`precedence`]: per-direction precedence guards and the statement table
//! - [`local_view`]: tombstoned slots for stable bulk enumeration
//! - [`eval`]: the apply/withdraw evaluation controller
//! - [`engine`]: [`PolicyEngine`], tying all of the above together
//!
//! The engine is single-threaded; callers serialise every operation.

pub mod action;
pub mod bulk;
pub mod condition;
pub mod engine;
pub mod error;
pub mod eval;
pub mod index;
pub mod local_view;
pub mod policy;
pub mod precedence;
pub mod registry;
pub mod statement;
pub mod types;

pub use action::{ActionConfig, ActionKind, PolicyAction, RouteDisposition};
pub use bulk::{fetch_all, BulkPage};
pub use condition::{
    ConditionConfig, ConditionKind, ConditionMatcher, PolicyCondition, PrefixMatchInfo, PrefixSet,
    PrefixSetConfig, PrefixSpec,
};
pub use engine::{PolicyEngine, PolicyEngineConfig, PolicyEngineStats};
pub use error::{ObjectKind, PolicyError, PrecedenceScope, Result};
pub use eval::{ActionContext, AppliedEffect, EvaluationSummary, PolicyCandidate, PolicyEngineCallbacks};
pub use index::{PrefixIndex, PrefixMatchEntry, ProtocolIndex};
pub use local_view::{LocalView, LocalViewSlot};
pub use policy::{Policy, PolicyDefinitionConfig, StatementPrecedence};
pub use statement::{PolicyStatement, StatementConfig};
pub use types::{ConfigOp, MaskRange, MatchMode, PolicyDirection};
