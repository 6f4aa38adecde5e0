//! Error types for policy engine operations.
//!
//! Every public engine operation returns [`Result`]; invalid input is never
//! a panic. Variants that name an object carry its [`ObjectKind`] so callers
//! can tell a missing condition from a missing statement.

use std::fmt;
use thiserror::Error;

use crate::types::PolicyDirection;

/// Result type alias for policy engine operations.
pub type Result<T> = std::result::Result<T, PolicyError>;

/// The kind of named object an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Condition,
    Action,
    Statement,
    Policy,
    PrefixSet,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Condition => "condition",
            ObjectKind::Action => "action",
            ObjectKind::Statement => "policy statement",
            ObjectKind::Policy => "policy",
            ObjectKind::PrefixSet => "prefix set",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a precedence value must be unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrecedenceScope {
    /// Across all policies of one direction.
    Direction(PolicyDirection),
    /// Across the statements of one policy.
    Policy(String),
}

impl fmt::Display for PrecedenceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrecedenceScope::Direction(direction) => write!(f, "{} policies", direction),
            PrecedenceScope::Policy(name) => write!(f, "statements of policy {}", name),
        }
    }
}

/// Errors that can occur during policy engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// Referenced name is absent.
    #[error("{kind} not found: {name}")]
    NotFound { kind: ObjectKind, name: String },

    /// Create on an existing key.
    #[error("duplicate {kind} definition: {name}")]
    DuplicateName { kind: ObjectKind, name: String },

    /// Precedence collision within a scope.
    #[error("precedence {precedence} already used by {existing} among {scope}")]
    DuplicatePrecedence {
        scope: PrecedenceScope,
        precedence: i32,
        existing: String,
    },

    /// A definition references a name that is not registered.
    #[error("{kind} {name} referenced by {referrer} is not defined")]
    UndefinedReference {
        kind: ObjectKind,
        name: String,
        referrer: String,
    },

    /// The same name listed twice in one definition.
    #[error("{kind} {name} is listed more than once by {referrer}")]
    DuplicateReference {
        kind: ObjectKind,
        name: String,
        referrer: String,
    },

    /// Match mode other than "any" / "all".
    #[error("invalid match mode '{0}' - try any/all")]
    InvalidMatchMode(String),

    /// Malformed mask-length range.
    #[error("invalid mask length range '{0}'")]
    InvalidRange(String),

    /// None of import/export/global was set.
    #[error("policy {0} must set one of import, export or global")]
    MissingDirection(String),

    /// More than one of import/export/global was set.
    #[error("policy {0} sets more than one of import, export and global")]
    AmbiguousDirection(String),

    /// Delete of an object that others still reference.
    #[error("{kind} {name} is still used by {users:?}")]
    InUse {
        kind: ObjectKind,
        name: String,
        users: Vec<String>,
    },

    /// Condition payload is inconsistent.
    #[error("invalid condition {name}: {message}")]
    InvalidCondition { name: String, message: String },

    /// Candidate collaborator failure.
    #[error("candidate source error: {0}")]
    Candidate(String),
}

impl PolicyError {
    pub fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        PolicyError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn duplicate(kind: ObjectKind, name: impl Into<String>) -> Self {
        PolicyError::DuplicateName {
            kind,
            name: name.into(),
        }
    }

    pub fn undefined(kind: ObjectKind, name: impl Into<String>, referrer: impl Into<String>) -> Self {
        PolicyError::UndefinedReference {
            kind,
            name: name.into(),
            referrer: referrer.into(),
        }
    }

    pub fn duplicate_reference(
        kind: ObjectKind,
        name: impl Into<String>,
        referrer: impl Into<String>,
    ) -> Self {
        PolicyError::DuplicateReference {
            kind,
            name: name.into(),
            referrer: referrer.into(),
        }
    }

    pub fn in_use(kind: ObjectKind, name: impl Into<String>, users: &[String]) -> Self {
        PolicyError::InUse {
            kind,
            name: name.into(),
            users: users.to_vec(),
        }
    }

    pub fn invalid_condition(name: impl Into<String>, message: impl Into<String>) -> Self {
        PolicyError::InvalidCondition {
            name: name.into(),
            message: message.into(),
        }
    }
}
