//! Domain-specific error types for the reconciliation engine.
//!
//! This module provides a structured error hierarchy using [`thiserror`].
//! Internal modules return typed errors (e.g., [`EngineError`], [`ConfigError`])
//! while command handlers at the CLI boundary convert them to [`anyhow::Error`]
//! via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! WinstateError
//! ├── Config(ConfigError)     — manifest I/O, syntax, duplicate identities
//! ├── Engine(EngineError)     — one object's reconciliation pass
//! │   ├── Validation(ValidationError)  — before any mutation
//! │   ├── Policy(PolicyViolation)      — before any mutation
//! │   ├── NotFound
//! │   ├── Query(SurfaceError)          — initial fetch failed
//! │   └── ConvergenceFailed(ConvergenceFailure)
//! └── Surface(SurfaceError)   — collaborator failures
//! ```

use thiserror::Error;

use crate::engine::{Operation, OperationKind};
use crate::model::{CurrentState, ObjectKind};
use crate::surface::SurfaceError;

/// Top-level error type for the engine.
///
/// Aggregates domain-specific sub-errors and is convertible to
/// [`anyhow::Error`] for use at CLI command boundaries.
#[derive(Error, Debug)]
pub enum WinstateError {
    /// Manifest loading error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reconciliation error for one object.
    #[error("Reconciliation error: {0}")]
    Engine(#[from] EngineError),

    /// Collaborator error outside a reconciliation pass.
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
}

/// Errors that arise from loading the desired-state manifest.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An I/O error occurred while reading a manifest or state file.
    #[error("IO error reading {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file contains a syntax or schema error that prevents parsing.
    #[error("Invalid syntax in {file}: {message}")]
    InvalidSyntax {
        /// File name.
        file: String,
        /// Parser message.
        message: String,
    },

    /// Two manifest entries address the same object.
    #[error("Duplicate entry for {identity}")]
    DuplicateIdentity {
        /// Display form of the identity.
        identity: String,
    },

    /// An entry failed semantic validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// A kind name that no schema recognises.
    #[error("Unknown object kind '{0}'")]
    UnknownKind(String),
}

/// Malformed or contradictory desired state, detected before any mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} '{identity}': {}{message}", attribute_prefix(.attribute.as_deref()))]
pub struct ValidationError {
    /// Kind of the object being validated.
    pub kind: ObjectKind,
    /// Display form of the identity (may be partial if the identity itself is invalid).
    pub identity: String,
    /// Offending attribute, if the problem is attribute-scoped.
    pub attribute: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl ValidationError {
    /// Attribute-scoped validation error.
    #[must_use]
    pub fn attribute(
        kind: ObjectKind,
        identity: impl Into<String>,
        attribute: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            identity: identity.into(),
            attribute: Some(attribute.into()),
            message: message.into(),
        }
    }

    /// Object-scoped validation error.
    #[must_use]
    pub fn object(kind: ObjectKind, identity: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            identity: identity.into(),
            attribute: None,
            message: message.into(),
        }
    }
}

fn attribute_prefix(attribute: Option<&str>) -> String {
    attribute.map_or_else(String::new, |a| format!("attribute '{a}': "))
}

/// Illegal type transition or forbidden attribute combination.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} '{identity}': {message}")]
pub struct PolicyViolation {
    /// Kind of the object.
    pub kind: ObjectKind,
    /// Display form of the identity.
    pub identity: String,
    /// Current type, when a transition was evaluated.
    pub from_type: Option<String>,
    /// Requested type.
    pub to_type: Option<String>,
    /// Attributes that triggered the violation.
    pub attributes: Vec<String>,
    /// Human-readable description.
    pub message: String,
}

/// State observed after a failed convergence attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartialState {
    /// Re-query succeeded; `None` means the object does not exist.
    Observed(Option<CurrentState>),
    /// Re-query itself failed.
    Unavailable(String),
}

/// Details of a mid-sequence collaborator failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceFailure {
    /// Display form of the identity.
    pub identity: String,
    /// Zero-based index of the failed operation in planner order.
    pub step: usize,
    /// Kind of the failed operation.
    pub operation: OperationKind,
    /// Collaborator's reason.
    pub reason: String,
    /// Operations that completed before the failure.
    pub operations_applied: Vec<Operation>,
    /// Best-effort re-queried state.
    pub state: PartialState,
}

impl std::fmt::Display for ConvergenceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: step {} ({}) failed after {} completed operation(s): {}",
            self.identity,
            self.step,
            self.operation,
            self.operations_applied.len(),
            self.reason
        )
    }
}

/// Errors from a single reconciliation pass.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Desired state is malformed; nothing was mutated.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Transition or attribute combination is not allowed; nothing was mutated.
    #[error("policy violation: {0}")]
    Policy(#[from] PolicyViolation),

    /// An operation presumed an object that does not exist.
    #[error("not found: {identity}: {reason}")]
    NotFound {
        /// Display form of the identity.
        identity: String,
        /// Why the object was required.
        reason: String,
    },

    /// Fetching the current state failed; nothing was mutated.
    #[error("query failed for {identity}: {source}")]
    Query {
        /// Display form of the identity.
        identity: String,
        /// Underlying collaborator error.
        source: SurfaceError,
    },

    /// A collaborator-side operation failed mid-sequence.
    #[error("convergence failed: {0}")]
    ConvergenceFailed(Box<ConvergenceFailure>),
}

impl EngineError {
    /// `true` for errors raised before any mutation was attempted.
    #[must_use]
    pub const fn is_side_effect_free(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Policy(_) | Self::Query { .. }
        )
    }
}
